//! Master server (`mobile-upload`) client and the demo fallback payload.

pub mod api;
pub mod client;
pub mod mock;

pub use api::{MasterApi, OutboundPayload, X_API_KEY};
pub use client::{MasterClient, UpstreamReply};
pub use mock::{X_WALT_MOCK, mock_analysis};

pub const WALT_USER_AGENT: &str = concat!("walt/", env!("CARGO_PKG_VERSION"));
