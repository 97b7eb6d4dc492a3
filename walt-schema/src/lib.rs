pub mod analysis;
pub mod feedback;
pub mod upload;

pub use analysis::AnalysisResult;
pub use feedback::FeedbackRequest;
pub use upload::{ClientUploadBody, MobileUploadRequest};
