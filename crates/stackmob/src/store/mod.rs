//! Key/value persistence for session artifacts.
//!
//! Stores are dumb: they hold strings under keys and know nothing about
//! tokens or expiry. The [`SessionManager`](crate::SessionManager) decides
//! what goes in and what it means.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::Result;

/// Prefix applied to every key so the store can be shared with other data.
pub const STORAGE_PREFIX: &str = "stackmob.";

/// Keys used for the persisted session, without [`STORAGE_PREFIX`].
pub mod keys {
    pub const ACCESS_TOKEN: &str = "oauth2.accessToken";
    pub const REFRESH_TOKEN: &str = "oauth2.refreshToken";
    pub const MAC_KEY: &str = "oauth2.macKey";
    pub const EXPIRES: &str = "oauth2.expires";
    pub const USER: &str = "oauth2.user";
    pub const SCHEMA_INFO: &str = "oauth2.userSchemaInfo";
    pub const KEEP_LOGGED_IN: &str = "oauth2.shouldKeepLoggedIn";

    /// Everything cleared on logout. The keep-logged-in preference survives.
    pub const CREDENTIALS: [&str; 6] = [
        ACCESS_TOKEN,
        REFRESH_TOKEN,
        MAC_KEY,
        EXPIRES,
        USER,
        SCHEMA_INFO,
    ];
}

/// Apply the storage namespace to a key.
pub fn namespaced(key: &str) -> String {
    format!("{}{}", STORAGE_PREFIX, key)
}

/// Persistent string storage.
///
/// Implementations must be safe to share; the client only ever touches the
/// store from one request flow at a time, so no cross-key atomicity is
/// expected.
pub trait CredentialStore: Send + Sync {
    /// Save `value` under `key`, replacing any previous value.
    fn persist(&self, key: &str, value: &str) -> Result<()>;

    /// Read the value under `key`.
    fn retrieve(&self, key: &str) -> Option<String>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
