//! CLI-level conveniences that sit above the library: locating the
//! enclosing repository from the current directory, and parsing the
//! `server://host:port/repo` remote URL form of spec §6.5.

use std::env;
use std::path::Path;
use std::path::PathBuf;

use minigit_lib::repo::Repository;

/// The port `minigit server` listens on when `--port` is omitted.
pub const DEFAULT_PORT: u16 = 9418;

/// Walks from `start` upward looking for a `.minigit` directory, the way
/// a VCS client locates its repository root from any subdirectory.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(Repository::minigit_dir_name()).is_dir() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

pub fn open_repo_here() -> Result<Repository, String> {
    let cwd = env::current_dir().map_err(|err| err.to_string())?;
    let root = find_repo_root(&cwd).ok_or_else(|| {
        format!(
            "'{}' (or any parent) is not a minigit repository",
            cwd.display()
        )
    })?;
    Repository::open(&root).map_err(|err| err.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub host: String,
    pub port: u16,
    pub repo: String,
}

/// Parses `server://host:port/repo`, the only remote form this client
/// understands (§6.5).
pub fn parse_remote_url(url: &str) -> Result<RemoteUrl, String> {
    let rest = url
        .strip_prefix("server://")
        .ok_or_else(|| format!("'{url}' is not a server:// remote URL"))?;
    let (authority, repo) = rest
        .split_once('/')
        .ok_or_else(|| format!("'{url}' is missing a repository name"))?;
    let (host, port) = authority
        .split_once(':')
        .ok_or_else(|| format!("'{url}' is missing a port"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| format!("'{port}' is not a valid port number"))?;
    if host.is_empty() || repo.is_empty() {
        return Err(format!("'{url}' is not a well-formed server:// remote URL"));
    }
    Ok(RemoteUrl {
        host: host.to_owned(),
        port,
        repo: repo.to_owned(),
    })
}

/// Parses the bare `host:port/repo` form `clone` takes (no `server://`
/// scheme, since the scheme is only meaningful once written into a
/// repository's `remote=` config entry).
pub fn parse_host_port_repo(target: &str) -> Result<RemoteUrl, String> {
    parse_remote_url(&format!("server://{target}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_remote_url() {
        let parsed = parse_remote_url("server://example.com:9418/demo").unwrap();
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.port, 9418);
        assert_eq!(parsed.repo, "demo");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(parse_remote_url("example.com:9418/demo").is_err());
    }

    #[test]
    fn rejects_missing_repo_name() {
        assert!(parse_remote_url("server://example.com:9418").is_err());
    }

    #[test]
    fn parses_bare_host_port_repo() {
        let parsed = parse_host_port_repo("example.com:9418/demo").unwrap();
        assert_eq!(parsed.repo, "demo");
    }
}
