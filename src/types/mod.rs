mod file;
mod requests;

pub use file::detect_mime_type;
pub use requests::*;
