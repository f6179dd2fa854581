//! Saved API keys and the last-selected provider.
//!
//! Backed by a line-oriented `KEY=value` file. Process environment values
//! overlay the file at load time; later updates only touch the file and the
//! in-memory [`Credentials`], never the process environment.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::llm::ProviderKind;
use crate::store::{StorageError, atomic_write_file};

/// Key holding the last provider the user picked.
pub const SELECTED_MODEL: &str = "SELECTED_MODEL";

const MANAGED_KEYS: [&str; 3] = ["OPENAI_API_KEY", "GEMINI_API_KEY", SELECTED_MODEL];

/// Resolved credentials handed to the router.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    openai_api_key: Option<String>,
    gemini_api_key: Option<String>,
    selected: Option<ProviderKind>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| if key.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("selected", &self.selected)
            .finish()
    }
}

impl Credentials {
    pub fn api_key(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::OpenAI => self.openai_api_key.as_deref(),
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
        }
    }

    pub fn has_key(&self, provider: ProviderKind) -> bool {
        self.api_key(provider).is_some()
    }

    /// The saved provider preference, if any.
    pub fn selected(&self) -> Option<ProviderKind> {
        self.selected
    }

    #[must_use]
    pub fn with_api_key(mut self, provider: ProviderKind, key: impl Into<String>) -> Self {
        self.apply(provider.credential_key(), &key.into());
        self
    }

    #[must_use]
    pub fn with_selected(mut self, provider: ProviderKind) -> Self {
        self.selected = Some(provider);
        self
    }

    /// Provider to preselect: the saved choice, else the only configured
    /// Gemini key, else a configured OpenAI key.
    pub fn default_provider(&self) -> Option<ProviderKind> {
        if let Some(selected) = self.selected {
            return Some(selected);
        }
        match (
            self.has_key(ProviderKind::OpenAI),
            self.has_key(ProviderKind::Gemini),
        ) {
            (false, true) => Some(ProviderKind::Gemini),
            (true, _) => Some(ProviderKind::OpenAI),
            (false, false) => None,
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        let value = value.trim();
        let owned = (!value.is_empty()).then(|| value.to_string());
        match key {
            "OPENAI_API_KEY" => self.openai_api_key = owned,
            "GEMINI_API_KEY" => self.gemini_api_key = owned,
            SELECTED_MODEL => {
                self.selected = owned.and_then(|v| match v.parse() {
                    Ok(kind) => Some(kind),
                    Err(e) => {
                        warn!(error = %e, "Ignoring saved provider selection");
                        None
                    }
                });
            }
            _ => {}
        }
    }
}

/// The credential file plus its resolved view.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    credentials: Credentials,
}

impl CredentialStore {
    /// Load the file (creating it empty if missing) and overlay the process
    /// environment.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        Self::load_with(path, |key| std::env::var(key).ok()).await
    }

    /// Like [`CredentialStore::load`] with an explicit environment lookup.
    pub async fn load_with(
        path: impl Into<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CredentialError> {
        let path = path.into();
        let contents = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                atomic_write_file(&path, b"").await?;
                String::new()
            }
            Err(e) => return Err(StorageError::file_io(&path, e).into()),
        };

        let mut credentials = Credentials::default();
        for (key, value) in contents.lines().filter_map(parse_line) {
            credentials.apply(key, value);
        }
        for key in MANAGED_KEYS {
            if let Some(value) = env(key).filter(|v| !v.trim().is_empty()) {
                credentials.apply(key, &value);
            }
        }

        debug!(path = %path.display(), ?credentials, "Loaded credentials");
        Ok(Self { path, credentials })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Save a new API key for `provider`.
    pub async fn set_api_key(
        &mut self,
        provider: ProviderKind,
        key: &str,
    ) -> Result<(), CredentialError> {
        self.update(provider.credential_key(), key).await?;
        info!(provider = %provider, "Updated API key");
        Ok(())
    }

    /// Persist the provider preference. No write happens when it is unchanged.
    pub async fn set_selected(&mut self, provider: ProviderKind) -> Result<(), CredentialError> {
        if self.credentials.selected == Some(provider) {
            return Ok(());
        }
        self.update(SELECTED_MODEL, provider.label()).await
    }

    /// Remove both API keys and the saved selection, keeping unrelated lines.
    pub async fn reset(&mut self) -> Result<(), CredentialError> {
        let contents = self.read_contents().await?;
        let kept = remove_keys(&contents, &MANAGED_KEYS);
        atomic_write_file(&self.path, kept.as_bytes()).await?;
        self.credentials = Credentials::default();
        info!(path = %self.path.display(), "Cleared saved credentials");
        Ok(())
    }

    async fn update(&mut self, key: &'static str, value: &str) -> Result<(), CredentialError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CredentialError::EmptyValue { key });
        }
        if value.contains(['\n', '\r']) {
            return Err(CredentialError::MultiLineValue { key });
        }

        let contents = self.read_contents().await?;
        let updated = upsert_line(&contents, key, value);
        atomic_write_file(&self.path, updated.as_bytes()).await?;
        self.credentials.apply(key, value);
        Ok(())
    }

    async fn read_contents(&self) -> Result<String, CredentialError> {
        match fs::read_to_string(&self.path).await {
            Ok(c) => Ok(c),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StorageError::file_io(&self.path, e).into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{key} cannot be empty")]
    EmptyValue { key: &'static str },

    #[error("{key} must be a single line")]
    MultiLineValue { key: &'static str },
}

/// Parse one `KEY=value` line. Blank lines and `#` comments yield `None`.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    Some((key.trim(), value))
}

fn upsert_line(contents: &str, key: &str, value: &str) -> String {
    let mut out = String::with_capacity(contents.len() + key.len() + value.len() + 2);
    let mut written = false;
    for line in contents.lines() {
        if parse_line(line).is_some_and(|(k, _)| k == key) {
            if !written {
                out.push_str(&format!("{key}={value}\n"));
                written = true;
            }
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    if !written {
        out.push_str(&format!("{key}={value}\n"));
    }
    out
}

fn remove_keys(contents: &str, keys: &[&str]) -> String {
    let mut out = String::with_capacity(contents.len());
    for line in contents.lines() {
        if parse_line(line).is_some_and(|(k, _)| keys.contains(&k)) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
