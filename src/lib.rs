pub mod config;
pub mod db;
pub mod error;
pub mod image;
pub mod server;
pub mod upstream;
pub mod utils;

pub use error::{UploadError, WaltError};
