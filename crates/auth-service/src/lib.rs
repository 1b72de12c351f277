//! Phone number authentication with one-time codes.
//!
//! Users register a phone number, confirm it with a code, and later log in
//! with a fresh code. Every confirmation returns a signed access/refresh
//! token pair and records the refresh token as a session.

pub mod api;
pub mod clock;
pub mod code;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod notify;
pub mod reaper;
pub mod token;
pub mod workflow;

pub use config::Config;
pub use error::{ApiError, AuthError};
pub use models::{Session, TokenPair, UserRecord, UserUpdate};
pub use workflow::AuthWorkflow;
