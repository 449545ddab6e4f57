pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod state;
pub mod upload;

mod types;

pub use config::UploadConfig;
pub use error::{ErrorKind, Result, UploadError};
pub use types::*;
pub use upload::Coordinator;
