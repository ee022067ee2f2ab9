mod bitmap;
mod error;

pub use bitmap::{parallel_or, Bitmap};
pub use error::{err, is_end_of_stream, Error, Result};
