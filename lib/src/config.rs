//! Repository and server configuration (C13).
//!
//! The repository config is the flat `key=value` grammar of spec §6.4: one
//! binding per line, at least `remote=`. The server's configuration is a
//! small struct built from CLI flags rather than a file, since there is
//! only ever one server process per invocation.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

/// The `<repo>/.minigit/config` file: flat `key=value` bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoConfig {
    entries: BTreeMap<String, String>,
}

impl RepoConfig {
    /// The default config written by `init`: a single empty `remote=`
    /// binding.
    pub fn default_for_init() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("remote".to_owned(), String::new());
        Self { entries }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err),
        };
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_owned(), value.trim().to_owned());
            }
        }
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut text = String::new();
        for (key, value) in &self.entries {
            text.push_str(key);
            text.push('=');
            text.push_str(value);
            text.push('\n');
        }
        fs::write(path, text)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// The `remote=` binding, as written by `set-remote` or `clone`.
    pub fn remote(&self) -> Option<&str> {
        self.get("remote").filter(|s| !s.is_empty())
    }
}

/// Server process configuration, assembled from `minigit server` flags.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub root_path: PathBuf,
    pub password: Option<String>,
    pub cert_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(port: u16, root_path: impl Into<PathBuf>) -> Self {
        Self {
            port,
            root_path: root_path.into(),
            password: None,
            cert_path: None,
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_cert_path(mut self, cert_path: Option<PathBuf>) -> Self {
        self.cert_path = cert_path;
        self
    }

    pub fn certs_enabled(&self) -> bool {
        self.cert_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn default_for_init_has_empty_remote() {
        let config = RepoConfig::default_for_init();
        assert_eq!(config.get("remote"), Some(""));
        assert_eq!(config.remote(), None);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        let mut config = RepoConfig::default_for_init();
        config.set("remote", "server://localhost:9418/demo");
        config.save(&path).unwrap();

        let loaded = RepoConfig::load(&path).unwrap();
        assert_eq!(loaded.remote(), Some("server://localhost:9418/demo"));
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let loaded = RepoConfig::load(&dir.path().join("no-config")).unwrap();
        assert_eq!(loaded, RepoConfig::default());
    }
}
