#[cfg(feature = "accelerate")]
extern crate accelerate_src;

mod traits;

pub mod blip;
pub mod device;

pub use tokenizers;
pub use traits::*;
