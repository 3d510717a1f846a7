//! Org credentials (spec.md §6's "org-credentials layer that yields an
//! authenticated `Connection`", an external collaborator the core never
//! touches). Loaded from `~/.config/seedbuddy/orgs.toml`:
//!
//! ```toml
//! [orgs.dev]
//! instance_url = "https://dev.my.salesforce.com"
//! access_token = "00D..."
//! api_version = "61.0"
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OrgCredentials {
    pub instance_url: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    "61.0".to_string()
}

#[derive(Debug, Deserialize)]
struct OrgsFile {
    #[serde(default)]
    orgs: HashMap<String, OrgCredentials>,
}

pub fn config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".config/seedbuddy/orgs.toml"))
}

pub fn load_org(name: &str) -> Result<OrgCredentials> {
    let path = config_path()?;
    let contents = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let parsed: OrgsFile = toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    parsed
        .orgs
        .get(name)
        .cloned()
        .with_context(|| format!("org \"{name}\" not found in {}", path.display()))
}
