//! `ClientEngine` (C9): drives push/pull/clone/log as a client state
//! machine over the codec (C7) and transport (C8).

use std::path::Path;
use std::path::PathBuf;

use crate::hash::ObjectId;
use crate::protocol::AuthType;
use crate::protocol::Message;
use crate::protocol::MessageType;
use crate::protocol::ProtocolError;
use crate::protocol::RepoListing;
use crate::protocol::SessionKey;
use crate::protocol::StatusCode as WireStatus;
use crate::protocol::crc32;
use crate::protocol::crc32_verify;
use crate::repo::RepoError;
use crate::repo::Repository;
use crate::transport::TransportError;
use crate::transport::TransportLink;

/// Reconnect budget of §5: up to 3 attempts, 1 s backoff, never an
/// automatic replay of the interrupted logical operation.
const RECONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_BACKOFF_SECS: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected to a server")]
    NotConnected,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("no repository selected")]
    NoRepositorySelected,
    #[error("authentication failed")]
    AuthFailed,
    #[error("CRC mismatch receiving object data; aborting")]
    CrcMismatch,
    #[error("unexpected message type {0:?} for the current operation")]
    UnexpectedMessage(MessageType),
    #[error("server error ({status:?}): {message}")]
    Server { status: WireStatus, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    ObjectStore(#[from] crate::object_store::ObjectStoreError),
    #[error(transparent)]
    CommitGraph(#[from] crate::commit::CommitGraphError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

pub enum AuthCredential {
    Password(String),
    Cert(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    pub up_to_date: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    pub up_to_date: bool,
    pub new_head: Option<ObjectId>,
}

/// Connection state: `{socket, authenticated, session_key?, current_repo?}`
/// per spec §4.9, plus the remote address (needed to build the
/// `server://host:port/repo` URL `clone` writes into the local config).
pub struct ClientEngine {
    link: Option<TransportLink>,
    remote_addr: String,
    authenticated: bool,
    /// Flips to true only after a successful `AUTH_RESPONSE` — the
    /// explicit per-session gate for the encryption envelope (spec §9's
    /// required fix; never inferred from "is there a key").
    encrypted: bool,
    session_key: Option<SessionKey>,
    current_repo: Option<String>,
}

impl ClientEngine {
    pub fn new() -> Self {
        Self {
            link: None,
            remote_addr: String::new(),
            authenticated: false,
            encrypted: false,
            session_key: None,
            current_repo: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn current_repo(&self) -> Option<&str> {
        self.current_repo.as_deref()
    }

    fn key(&self) -> Option<&SessionKey> {
        self.encrypted.then_some(self.session_key.as_ref()).flatten()
    }

    fn link_mut(&mut self) -> ClientResult<&mut TransportLink> {
        self.link.as_mut().ok_or(ClientError::NotConnected)
    }

    pub async fn connect(&mut self, addr: &str) -> ClientResult<()> {
        self.link = Some(TransportLink::connect(addr).await?);
        self.remote_addr = addr.to_owned();
        self.authenticated = false;
        self.encrypted = false;
        self.session_key = None;
        Ok(())
    }

    /// Reconnects and re-authenticates with the last-used credential, up
    /// to [`RECONNECT_ATTEMPTS`] times. Does NOT replay whatever logical
    /// operation (push/pull/clone) was interrupted.
    pub async fn reconnect(&mut self, credential: &AuthCredential) -> ClientResult<()> {
        let addr = self.remote_addr.clone();
        let mut last_err = None;
        for _ in 0..RECONNECT_ATTEMPTS {
            match self.connect(&addr).await {
                Ok(()) => match self.authenticate(clone_credential(credential)).await {
                    Ok(()) => return Ok(()),
                    Err(err) => last_err = Some(err),
                },
                Err(err) => last_err = Some(err),
            }
            tokio::time::sleep(std::time::Duration::from_secs(RECONNECT_BACKOFF_SECS)).await;
        }
        Err(last_err.unwrap_or(ClientError::NotConnected))
    }

    /// Authenticates with the shared secret (password) or a non-empty
    /// credential file (cert). On success, flips `authenticated` and
    /// `encrypted`, so every subsequent frame is sent through the AES-CBC
    /// envelope.
    pub async fn authenticate(&mut self, credential: AuthCredential) -> ClientResult<()> {
        let (auth_type, data, key_material) = match &credential {
            AuthCredential::Password(password) => {
                (AuthType::Password, password.clone().into_bytes(), password.clone())
            }
            AuthCredential::Cert(bytes) => (
                AuthType::Cert,
                bytes.clone(),
                String::from_utf8_lossy(bytes).into_owned(),
            ),
        };
        let link = self.link_mut()?;
        link.send_message(&Message::AuthRequest { auth_type, data }, None).await?;
        let response = link.recv_message(None).await?;
        match response {
            Message::AuthResponse {
                status: WireStatus::Success,
                ..
            } => {
                self.session_key = Some(SessionKey::derive(&key_material));
                self.authenticated = true;
                self.encrypted = true;
                Ok(())
            }
            Message::AuthResponse { .. } => Err(ClientError::AuthFailed),
            Message::Error { status, message } => Err(ClientError::Server { status, message }),
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    fn require_authenticated(&self) -> ClientResult<()> {
        if !self.authenticated {
            return Err(ClientError::NotAuthenticated);
        }
        Ok(())
    }

    async fn request(&mut self, msg: Message) -> ClientResult<Message> {
        let key = self.key();
        let key = key.cloned();
        let link = self.link_mut()?;
        link.send_message(&msg, key.as_ref()).await?;
        let response = link.recv_message(key.as_ref()).await?;
        if let Message::Error { status, message } = response {
            return Err(ClientError::Server { status, message });
        }
        Ok(response)
    }

    pub async fn login(&mut self, username: &str) -> ClientResult<String> {
        self.require_authenticated()?;
        match self.request(Message::LoginRequest(username.to_owned())).await? {
            Message::LoginResponse(ack) => Ok(ack),
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    pub async fn list_repositories(&mut self) -> ClientResult<Vec<RepoListing>> {
        self.require_authenticated()?;
        match self.request(Message::ListReposRequest).await? {
            Message::ListReposResponse(repos) => Ok(repos),
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    pub async fn use_repository(&mut self, name: &str) -> ClientResult<()> {
        self.require_authenticated()?;
        match self.request(Message::UseRepoRequest(name.to_owned())).await? {
            Message::UseRepoResponse(_) => {
                self.current_repo = Some(name.to_owned());
                Ok(())
            }
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    pub async fn create_repository(&mut self, name: &str) -> ClientResult<()> {
        self.require_authenticated()?;
        match self.request(Message::CreateRepoRequest(name.to_owned())).await? {
            Message::CreateRepoResponse(_) => Ok(()),
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    pub async fn remove_repository(&mut self, name: &str) -> ClientResult<()> {
        self.require_authenticated()?;
        match self.request(Message::RemoveRepoRequest(name.to_owned())).await? {
            Message::RemoveRepoResponse(_) => Ok(()),
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    pub async fn log(&mut self, max_count: u32, line: bool) -> ClientResult<Vec<(String, String)>> {
        self.require_authenticated()?;
        if self.current_repo.is_none() {
            return Err(ClientError::NoRepositorySelected);
        }
        match self.request(Message::LogRequest { max_count, line }).await? {
            Message::LogResponse(entries) => Ok(entries),
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    /// Push protocol (§4.9.1): check, upload missing commits oldest-first
    /// with their tree objects, then request the fast-forward.
    pub async fn push(&mut self, repo: &Repository) -> ClientResult<PushOutcome> {
        self.require_authenticated()?;
        if self.current_repo.is_none() {
            return Err(ClientError::NoRepositorySelected);
        }

        let local_head = repo.head()?;
        let parent = if local_head.is_empty() {
            ObjectId::empty()
        } else {
            repo.graph().load_commit(&local_head)?.parent
        };

        let check_response = self
            .request(Message::PushCheckRequest {
                local_head: local_head.as_str().to_owned(),
                new_commit: local_head.as_str().to_owned(),
                parent: parent.as_str().to_owned(),
            })
            .await?;
        let (remote_head, needs_update) = match check_response {
            Message::PushCheckResponse {
                remote_head,
                needs_update,
            } => (ObjectId::from_hex(remote_head), needs_update),
            other => return Err(ClientError::UnexpectedMessage(other.message_type())),
        };
        if !needs_update {
            return Ok(PushOutcome { up_to_date: true });
        }

        let stop_at = (!remote_head.is_empty()).then_some(&remote_head);
        let mut to_upload = Vec::new();
        for commit in repo.graph().walk(local_head.clone(), stop_at) {
            to_upload.push(commit?);
        }
        to_upload.reverse();

        let converged = to_upload
            .first()
            .map(|oldest| oldest.parent == remote_head)
            .unwrap_or(remote_head.is_empty());
        if !converged {
            tracing::warn!("local history diverged from remote HEAD; uploading entire local history");
        }

        for commit in &to_upload {
            self.request(Message::PushCommitData {
                commit_id: commit.id.as_str().to_owned(),
                commit_data: commit.encode(),
            })
            .await?;
            for (path, id) in &commit.tree {
                let _ = path;
                let bytes = repo.store().get(id)?;
                self.request(Message::PushObjectData {
                    id: id.as_str().to_owned(),
                    crc32: crc32(&bytes),
                    data: bytes,
                })
                .await?;
            }
        }

        match self
            .request(Message::PushRequest {
                remote_head: local_head.as_str().to_owned(),
            })
            .await?
        {
            Message::PushResponse(_) => Ok(PushOutcome { up_to_date: false }),
            other => Err(ClientError::UnexpectedMessage(other.message_type())),
        }
    }

    /// Pull protocol (§4.9.2): the server sends only the head commit and
    /// its tree (the simplified, documented policy), so `commits_count`
    /// observed here is always 1 — the loop still honors whatever count
    /// is reported, in case a future server sends more.
    pub async fn pull(&mut self, repo: &mut Repository) -> ClientResult<PullOutcome> {
        self.require_authenticated()?;
        if self.current_repo.is_none() {
            return Err(ClientError::NoRepositorySelected);
        }

        let local_head = repo.head()?;
        let check_response = self
            .request(Message::PullCheckRequest {
                local_head: local_head.as_str().to_owned(),
            })
            .await?;
        let (remote_head, has_updates) = match check_response {
            Message::PullCheckResponse {
                remote_head,
                has_updates,
                ..
            } => (ObjectId::from_hex(remote_head), has_updates),
            other => return Err(ClientError::UnexpectedMessage(other.message_type())),
        };
        if !has_updates {
            return Ok(PullOutcome {
                up_to_date: true,
                new_head: None,
            });
        }

        let key = self.key().cloned();
        loop {
            let msg = self.link_mut()?.recv_message(key.as_ref()).await?;
            match msg {
                Message::PullCommitData {
                    commit_id,
                    commit_data,
                } => {
                    repo.store().put_with_id(&ObjectId::from_hex(commit_id), &commit_data)?;
                }
                Message::PullObjectData { id, data, crc32: expected } => {
                    if !crc32_verify(&data, expected) {
                        tracing::error!("CRC mismatch receiving pull object; aborting");
                        return Err(ClientError::CrcMismatch);
                    }
                    repo.store().put_with_id(&ObjectId::from_hex(id), &data)?;
                }
                Message::PullResponse(_) => break,
                Message::Error { status, message } => return Err(ClientError::Server { status, message }),
                other => return Err(ClientError::UnexpectedMessage(other.message_type())),
            }
        }

        repo.graph().set_head(&remote_head)?;
        repo.checkout()?;
        Ok(PullOutcome {
            up_to_date: false,
            new_head: Some(remote_head),
        })
    }

    /// Clone protocol (§4.9.3): receive the repository's files verbatim
    /// and write a `remote=` config entry pointing back at the server.
    /// `on_progress(done, total)` is called after each file is written,
    /// for a caller-supplied progress display.
    pub async fn clone_repo(
        &mut self,
        name: &str,
        target_root: &Path,
        mut on_progress: Option<&mut dyn FnMut(u64, u64)>,
    ) -> ClientResult<PathBuf> {
        self.require_authenticated()?;
        let key = self.key().cloned();
        {
            let link = self.link_mut()?;
            link.send_message(&Message::CloneRequest(name.to_owned()), key.as_ref())
                .await?;
        }

        let (repo_name, total_files) = loop {
            let msg = self.link_mut()?.recv_message(key.as_ref()).await?;
            match msg {
                Message::CloneDataStart { repo_name, total_files, .. } => {
                    std::fs::create_dir_all(target_root)?;
                    break (repo_name, total_files);
                }
                Message::Error { status, message } => return Err(ClientError::Server { status, message }),
                other => return Err(ClientError::UnexpectedMessage(other.message_type())),
            }
        };

        let mut files_written = 0u64;
        loop {
            let msg = self.link_mut()?.recv_message(key.as_ref()).await?;
            match msg {
                Message::CloneFile { path, crc32: expected, data, .. } => {
                    if !crc32_verify(&data, expected) {
                        return Err(ClientError::CrcMismatch);
                    }
                    let dest = target_root.join(&path);
                    if let Some(parent) = dest.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(dest, data)?;
                    files_written += 1;
                    if let Some(callback) = on_progress.as_deref_mut() {
                        callback(files_written, total_files as u64);
                    }
                }
                Message::CloneDataEnd => continue,
                Message::CloneResponse(_) => break,
                Message::Error { status, message } => return Err(ClientError::Server { status, message }),
                other => return Err(ClientError::UnexpectedMessage(other.message_type())),
            }
        }

        let repo = Repository::open(target_root)?;
        let mut config = repo.load_config()?;
        config.set("remote", format!("server://{}/{}", self.remote_addr, repo_name));
        repo.save_config(&config)?;
        Ok(target_root.to_path_buf())
    }
}

impl Default for ClientEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn clone_credential(credential: &AuthCredential) -> AuthCredential {
    match credential {
        AuthCredential::Password(password) => AuthCredential::Password(password.clone()),
        AuthCredential::Cert(bytes) => AuthCredential::Cert(bytes.clone()),
    }
}
