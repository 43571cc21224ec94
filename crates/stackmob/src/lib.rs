//! stackmob - client data-access layer for the StackMob REST API
//!
//! This library turns schema-level CRUD and query calls into signed REST
//! requests. All calls flow through a [`Client`], which owns the session
//! state (OAuth 2.0 MAC credentials), the transport and the configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stackmob::{Client, Config, Login, MemoryStore, Query};
//!
//! # async fn example() -> Result<(), stackmob::Error> {
//! let config = Config::new("my-public-key");
//! let client = Client::with_http(config, Arc::new(MemoryStore::new()))?;
//!
//! client.login(&Login::new("alice", "secret"), true).await?;
//!
//! let query = Query::new().lt("age", 25).order_asc("age").set_range(0, 9);
//! let todos = client.schema("todo").query(&query).await?;
//!
//! for todo in todos {
//!     println!("{}", todo);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod operation;
pub mod query;
pub mod request;
pub mod retry;
pub mod schema;
pub mod signer;
pub mod store;
pub mod transport;

// Re-export primary types at crate root for convenience
pub use auth::{Credentials, Login, SchemaInfo, SessionManager, SessionState};
pub use client::Client;
pub use config::{Config, SecurityMode};
pub use dispatcher::{Call, Dispatcher};
pub use error::Error;
pub use operation::Operation;
pub use query::{GeoPoint, Query};
pub use request::{ApiResponse, RawResponse, RequestDescriptor};
pub use retry::RetryPolicy;
pub use schema::Schema;
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use transport::{HttpTransport, Transport};

// HTTP verbs, for custom code calls and verb overrides
pub use reqwest::Method;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
