mod download;
mod source;

pub use download::*;
pub use source::*;
