pub mod image_optimizer;
