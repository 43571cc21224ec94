//! Building a client from the command line and the credential file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use stackmob::{Client, Config, FileStore};

use crate::cli::ConnectionArgs;

/// Path of the credential file, creating its directory if needed.
pub fn credentials_path(args: &ConnectionArgs) -> Result<PathBuf> {
    let path = match &args.credentials {
        Some(path) => path.clone(),
        None => {
            let dirs = ProjectDirs::from("", "", "stackmob")
                .context("Could not determine data directory")?;
            dirs.data_dir().join("credentials.json")
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    Ok(path)
}

pub fn config(args: &ConnectionArgs) -> Result<Config> {
    let mut config = match &args.public_key {
        Some(key) => Config::new(key),
        None => Config::proxy(),
    };
    config = config
        .with_api_version(args.api_version)
        .with_security(args.security);
    if let Some(domain) = &args.domain {
        config = config.with_api_domain(domain).context("Invalid API domain")?;
    }
    Ok(config)
}

/// A client whose session lives in the credential file.
pub fn client(args: &ConnectionArgs) -> Result<Client> {
    let path = credentials_path(args)?;
    let store = FileStore::open(&path)
        .with_context(|| format!("Failed to open credential file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Using credential file");

    Client::with_http(config(args)?, Arc::new(store)).context("Failed to set up HTTP client")
}
