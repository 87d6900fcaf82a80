// Shared building blocks for the StudyMate backend:
// - Conversation and prompt-settings types
// - Configuration loading
// - Provider error type and failure classification
// - Clients for the hosted completion providers

pub mod types;
pub use types::*;

pub mod config;
pub use config::*;

pub mod errors;
pub use errors::*;

pub mod classify;
pub use classify::{classify, ErrorCategory};

pub mod client;
pub use client::{create_provider, CompletionProvider, ProviderRef};

pub mod gemini;
pub mod openai_compat;
