mod upload;
mod walt;

pub use upload::UploadError;
pub use walt::{ApiErrorBody, ApiErrorObject, WaltError};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
