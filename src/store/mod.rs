pub mod letterhead;
pub mod version;

pub use letterhead::{Letterhead, LetterheadInfo, LetterheadStore, Precondition};
