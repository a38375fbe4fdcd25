pub mod assembler;
pub mod compositor;
pub mod image_xobject;
pub mod import;
pub mod optimizer;
pub mod reader;
pub mod writer;
