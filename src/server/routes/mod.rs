pub mod analyses;
pub mod feedback;
pub mod health;
pub mod upload;
