//! StudyMate HTTP backend
//!
//! Accepts chat, quiz and summary requests, screens them, builds provider
//! prompts (with extracted file text and stored session history) and routes
//! them through the provider gateway. Profile images and contact mail are
//! handled by pluggable backends.

pub mod coordinator;
pub mod error;
pub mod extraction;
pub mod gateway;
pub mod http_server;
pub mod images;
pub mod mailer;
pub mod moderation;
pub mod prompt;
pub mod quiz;
pub mod session;
pub mod summary;

pub use error::ApiError;
pub use gateway::{GatewayError, ProviderGateway};
pub use http_server::{build_router, run_server, AppState};
