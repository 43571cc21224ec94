//! Authentication types and session management.
//!
//! This module owns the OAuth 2.0 MAC credential lifecycle: what a login
//! stores, how expiry is tracked and when a refresh is due.

mod credentials;
mod oauth;
mod session;
mod tokens;

pub use credentials::{Login, SchemaInfo};
pub use oauth::{Credentials, SessionState, TokenResponse};
pub use session::SessionManager;
pub use tokens::{AccessToken, MacKey, RefreshToken};
