//! `ServerEngine` (C12): accept loop, per-connection worker, and message
//! dispatch. One worker task per accepted connection; a separate sweep
//! task evicts idle sessions (§5, §8.8).

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OwnedMutexGuard;

use crate::config::ServerConfig;
use crate::hash::ObjectId;
use crate::protocol::AuthType;
use crate::protocol::Message;
use crate::protocol::RepoListing;
use crate::protocol::SessionKey;
use crate::protocol::StatusCode;
use crate::protocol::crc32;
use crate::protocol::crc32_verify;
use crate::server::repo_manager::RepoManager;
use crate::server::session::SessionRegistry;
use crate::server::session::IDLE_TIMEOUT;
use crate::transport::TransportLink;

/// How often the sweeper scans for idle sessions (a fraction of the idle
/// timeout, so evictions aren't delayed by more than one sweep interval).
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Held across `PUSH_CHECK_REQUEST` .. `PUSH_REQUEST` so two clients racing
/// a push to the same repository serialize (§5's recommended fine-grained
/// lock), rather than racing the HEAD compare-and-set.
struct PushState {
    _repo_lock: OwnedMutexGuard<()>,
}

/// Shared, cloneable server state handed to every connection worker.
#[derive(Clone)]
pub struct ServerEngine {
    config: Arc<ServerConfig>,
    repos: Arc<RepoManager>,
    sessions: Arc<SessionRegistry>,
    repo_locks: Arc<StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ServerEngine {
    pub fn new(config: ServerConfig) -> Self {
        let repos = RepoManager::new(config.root_path.clone());
        Self {
            config: Arc::new(config),
            repos: Arc::new(repos),
            sessions: SessionRegistry::new(),
            repo_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn repo_lock(&self, name: &str) -> Arc<AsyncMutex<()>> {
        self.repo_locks
            .lock()
            .expect("repo lock map poisoned")
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Binds the listening socket and runs the accept loop plus the idle-
    /// session sweeper until the process is killed.
    pub async fn run(self) -> io::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        tracing::info!(port = self.config.port, root = %self.config.root_path.display(), "server listening");
        self.serve(listener).await
    }

    /// Runs the accept loop plus the idle-session sweeper over an
    /// already-bound listener — split out from [`Self::run`] so tests can
    /// bind an ephemeral port and learn its address before connecting.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let sweeper_sessions = self.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                sweeper_sessions.sweep(IDLE_TIMEOUT);
            }
        });

        loop {
            let (stream, addr) = listener.accept().await?;
            let engine = self.clone();
            tokio::spawn(async move {
                if let Err(err) = engine.handle_connection(stream, addr.to_string()).await {
                    tracing::warn!(peer = %addr, error = %err, "connection worker exited with error");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer_addr: String) -> io::Result<()> {
        let handle = self.sessions.register(&peer_addr);
        let mut link = TransportLink::new(stream);
        let mut key: Option<SessionKey> = None;
        let mut push_state: Option<PushState> = None;

        loop {
            let msg = tokio::select! {
                result = link.recv_message(key.as_ref()) => match result {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
                _ = handle.evict.notified() => break,
            };
            self.sessions.touch(handle.conn_id);

            let keep_going = self
                .dispatch(handle.conn_id, msg, &mut link, &mut key, &mut push_state)
                .await;
            if !keep_going {
                break;
            }
        }

        self.sessions.remove(handle.conn_id);
        Ok(())
    }

    /// Returns `false` when the connection should be closed.
    async fn dispatch(
        &self,
        conn_id: u64,
        msg: Message,
        link: &mut TransportLink,
        key: &mut Option<SessionKey>,
        push_state: &mut Option<PushState>,
    ) -> bool {
        macro_rules! reply {
            ($response:expr) => {{
                match link.send_message(&$response, key.as_ref()).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to send response");
                        false
                    }
                }
            }};
        }
        macro_rules! error_reply {
            ($status:expr, $message:expr) => {
                reply!(Message::Error {
                    status: $status,
                    message: $message.to_owned(),
                })
            };
        }
        macro_rules! require_authenticated {
            () => {
                if !self.sessions.is_authenticated(conn_id) {
                    return error_reply!(StatusCode::AuthRequired, "authentication required");
                }
            };
        }
        macro_rules! require_repo {
            () => {{
                require_authenticated!();
                match self.sessions.current_repo(conn_id) {
                    Some(name) => name,
                    None => return error_reply!(StatusCode::InvalidRepo, "no repository selected"),
                }
            }};
        }

        match msg {
            Message::AuthRequest { auth_type, data } => {
                let ok = match auth_type {
                    AuthType::Password => self
                        .config
                        .password
                        .as_deref()
                        .is_some_and(|expected| expected.as_bytes() == data.as_slice()),
                    AuthType::Cert => self.config.certs_enabled() && !data.is_empty(),
                };
                if !ok {
                    return reply!(Message::AuthResponse {
                        status: StatusCode::AuthFailed,
                        session_id: [0u8; 32],
                        session_timeout: 0,
                    });
                }
                let session_id = self.sessions.authenticate(conn_id);
                let material = String::from_utf8_lossy(&data).into_owned();
                *key = Some(SessionKey::derive(&material));
                reply!(Message::AuthResponse {
                    status: StatusCode::Success,
                    session_id,
                    session_timeout: IDLE_TIMEOUT.as_secs() as u32,
                })
            }
            Message::LoginRequest(username) => {
                require_authenticated!();
                reply!(Message::LoginResponse(format!("welcome, {username}")))
            }
            Message::ListReposRequest => {
                require_authenticated!();
                let names = match self.repos.list() {
                    Ok(names) => names,
                    Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                };
                let mut repos = Vec::with_capacity(names.len());
                for name in names {
                    let (last_modified, commit_count) = self.repos.stats_for(&name).unwrap_or((0, 0));
                    repos.push(RepoListing {
                        name,
                        last_modified,
                        commit_count,
                    });
                }
                reply!(Message::ListReposResponse(repos))
            }
            Message::UseRepoRequest(name) => {
                require_authenticated!();
                if !self.repos.exists(&name) {
                    return error_reply!(StatusCode::RepoNotFound, format!("no such repository '{name}'"));
                }
                self.sessions.set_current_repo(conn_id, Some(name.clone()));
                reply!(Message::UseRepoResponse(name))
            }
            Message::CreateRepoRequest(name) => {
                require_authenticated!();
                match self.repos.create(&name) {
                    Ok(()) => reply!(Message::CreateRepoResponse(name)),
                    Err(err) => error_reply!(StatusCode::RepoExists, err.to_string()),
                }
            }
            Message::RemoveRepoRequest(name) => {
                require_authenticated!();
                match self.repos.remove(&name) {
                    Ok(()) => reply!(Message::RemoveRepoResponse(name)),
                    Err(err) => error_reply!(StatusCode::RepoNotFound, err.to_string()),
                }
            }
            Message::LogRequest { max_count, line: _ } => {
                let repo_name = require_repo!();
                let graph = match self.repos.graph_for(&repo_name) {
                    Ok(graph) => graph,
                    Err(err) => return error_reply!(StatusCode::RepoNotFound, err.to_string()),
                };
                let head = match graph.head() {
                    Ok(head) => head,
                    Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                };
                let mut entries = Vec::new();
                for commit in graph.walk(head, None) {
                    let commit = match commit {
                        Ok(commit) => commit,
                        Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                    };
                    entries.push((commit.id.as_str().to_owned(), commit.message));
                    if entries.len() as u32 >= max_count {
                        break;
                    }
                }
                reply!(Message::LogResponse(entries))
            }
            Message::PushCheckRequest { local_head, .. } => {
                let repo_name = require_repo!();
                let graph = match self.repos.graph_for(&repo_name) {
                    Ok(graph) => graph,
                    Err(err) => return error_reply!(StatusCode::RepoNotFound, err.to_string()),
                };
                let remote_head = match graph.head() {
                    Ok(head) => head,
                    Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                };
                let needs_update = remote_head.as_str() != local_head;
                *push_state = Some(PushState {
                    _repo_lock: self.repo_lock(&repo_name).lock_owned().await,
                });
                reply!(Message::PushCheckResponse {
                    remote_head: remote_head.as_str().to_owned(),
                    needs_update,
                })
            }
            Message::PushCommitData { commit_id, commit_data } => {
                let repo_name = require_repo!();
                let graph = match self.repos.graph_for(&repo_name) {
                    Ok(graph) => graph,
                    Err(err) => return error_reply!(StatusCode::RepoNotFound, err.to_string()),
                };
                let id = ObjectId::from_hex(commit_id);
                if let Err(err) = graph.store().put_with_id(&id, &commit_data) {
                    return error_reply!(StatusCode::ServerError, err.to_string());
                }
                true
            }
            Message::PushObjectData { id, data, crc32: expected } => {
                let repo_name = require_repo!();
                if !crc32_verify(&data, expected) {
                    tracing::error!("CRC mismatch receiving push object; ignoring");
                    return true;
                }
                let graph = match self.repos.graph_for(&repo_name) {
                    Ok(graph) => graph,
                    Err(err) => return error_reply!(StatusCode::RepoNotFound, err.to_string()),
                };
                if let Err(err) = graph.store().put_with_id(&ObjectId::from_hex(id), &data) {
                    return error_reply!(StatusCode::ServerError, err.to_string());
                }
                true
            }
            Message::PushRequest { remote_head } => {
                let repo_name = require_repo!();
                let graph = match self.repos.graph_for(&repo_name) {
                    Ok(graph) => graph,
                    Err(err) => return error_reply!(StatusCode::RepoNotFound, err.to_string()),
                };
                let new_head = ObjectId::from_hex(remote_head);
                let new_commit = match graph.load_commit(&new_head) {
                    Ok(commit) => commit,
                    Err(err) => return error_reply!(StatusCode::InvalidRequest, err.to_string()),
                };
                let current_head = match graph.head() {
                    Ok(head) => head,
                    Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                };
                let fast_forward = current_head.is_empty() || new_commit.parent == current_head;
                *push_state = None;
                if !fast_forward {
                    return error_reply!(
                        StatusCode::InvalidRequest,
                        "non-fast-forward: pull the latest changes before pushing"
                    );
                }
                if let Err(err) = graph.set_head(&new_head) {
                    return error_reply!(StatusCode::ServerError, err.to_string());
                }
                tracing::info!(repo = %repo_name, head = %new_head, "push accepted");
                reply!(Message::PushResponse("push accepted".to_owned()))
            }
            Message::PullCheckRequest { local_head } => {
                let repo_name = require_repo!();
                let graph = match self.repos.graph_for(&repo_name) {
                    Ok(graph) => graph,
                    Err(err) => return error_reply!(StatusCode::RepoNotFound, err.to_string()),
                };
                let remote_head = match graph.head() {
                    Ok(head) => head,
                    Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                };
                let has_updates = remote_head.as_str() != local_head && !remote_head.is_empty();
                if !has_updates {
                    return reply!(Message::PullCheckResponse {
                        remote_head: remote_head.as_str().to_owned(),
                        has_updates: false,
                        commits_count: 0,
                    });
                }
                if !reply!(Message::PullCheckResponse {
                    remote_head: remote_head.as_str().to_owned(),
                    has_updates: true,
                    commits_count: 1,
                }) {
                    return false;
                }
                let commit = match graph.load_commit(&remote_head) {
                    Ok(commit) => commit,
                    Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                };
                if !reply!(Message::PullCommitData {
                    commit_id: commit.id.as_str().to_owned(),
                    commit_data: commit.encode(),
                }) {
                    return false;
                }
                for (path, id) in &commit.tree {
                    let _ = path;
                    let bytes = match graph.store().get(id) {
                        Ok(bytes) => bytes,
                        Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                    };
                    if !reply!(Message::PullObjectData {
                        id: id.as_str().to_owned(),
                        crc32: crc32(&bytes),
                        data: bytes,
                    }) {
                        return false;
                    }
                }
                reply!(Message::PullResponse("up to date".to_owned()))
            }
            Message::CloneRequest(name) => {
                require_authenticated!();
                let path = match self.repos.path(&name) {
                    Ok(path) if self.repos.exists(&name) => path,
                    _ => return error_reply!(StatusCode::RepoNotFound, format!("no such repository '{name}'")),
                };
                let files = match list_files_recursively(&path) {
                    Ok(files) => files,
                    Err(err) => return error_reply!(StatusCode::ServerError, err.to_string()),
                };
                let total_size: u64 = files.iter().map(|(_, bytes)| bytes.len() as u64).sum();
                if !reply!(Message::CloneDataStart {
                    total_files: files.len() as u32,
                    total_size,
                    repo_name: name,
                }) {
                    return false;
                }
                for (rel_path, bytes) in files {
                    if !reply!(Message::CloneFile {
                        path: rel_path,
                        file_size: bytes.len() as u64,
                        crc32: crc32(&bytes),
                        file_type: 0,
                        data: bytes,
                    }) {
                        return false;
                    }
                }
                if !reply!(Message::CloneDataEnd) {
                    return false;
                }
                reply!(Message::CloneResponse("clone complete".to_owned()))
            }
            Message::Heartbeat => true,
            other => error_reply!(
                StatusCode::ProtocolError,
                format!("unexpected message type {:?} for the current state", other.message_type())
            ),
        }
    }
}

/// Every regular file under `root`, recursively, as `(repo-relative path,
/// bytes)` pairs — used by the clone handler (§4.12.3).
fn list_files_recursively(root: &std::path::Path) -> io::Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
            } else {
                let bytes = std::fs::read(&path)?;
                let rel = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                out.push((rel, bytes));
            }
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
