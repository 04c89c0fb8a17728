//! The message catalog (C7/§6.2): one tagged enum shared by client and
//! server, with a decode function per type that returns a failure on a
//! short buffer rather than walking off the end of it.

use std::io;

use crate::byte_cursor::ByteReader;
use crate::byte_cursor::ByteWriter;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown message type: {0}")]
    UnknownType(u8),
    #[error("malformed message body: {0}")]
    Malformed(#[from] io::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    AuthRequest = 1,
    AuthResponse = 2,
    LoginRequest = 3,
    LoginResponse = 4,
    UseRepoRequest = 5,
    UseRepoResponse = 6,
    CreateRepoRequest = 7,
    CreateRepoResponse = 8,
    RemoveRepoRequest = 9,
    RemoveRepoResponse = 10,
    ListReposRequest = 11,
    ListReposResponse = 12,
    PushCheckRequest = 13,
    PushCheckResponse = 14,
    PushCommitData = 15,
    PushObjectData = 16,
    PushRequest = 17,
    PushResponse = 18,
    PullCheckRequest = 19,
    PullCheckResponse = 20,
    PullCommitData = 21,
    PullObjectData = 22,
    PullResponse = 23,
    CloneRequest = 24,
    CloneDataStart = 25,
    CloneFile = 26,
    CloneDataEnd = 27,
    CloneResponse = 28,
    LogRequest = 29,
    LogResponse = 30,
    Heartbeat = 31,
    ErrorMsg = 32,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match v {
            1 => AuthRequest,
            2 => AuthResponse,
            3 => LoginRequest,
            4 => LoginResponse,
            5 => UseRepoRequest,
            6 => UseRepoResponse,
            7 => CreateRepoRequest,
            8 => CreateRepoResponse,
            9 => RemoveRepoRequest,
            10 => RemoveRepoResponse,
            11 => ListReposRequest,
            12 => ListReposResponse,
            13 => PushCheckRequest,
            14 => PushCheckResponse,
            15 => PushCommitData,
            16 => PushObjectData,
            17 => PushRequest,
            18 => PushResponse,
            19 => PullCheckRequest,
            20 => PullCheckResponse,
            21 => PullCommitData,
            22 => PullObjectData,
            23 => PullResponse,
            24 => CloneRequest,
            25 => CloneDataStart,
            26 => CloneFile,
            27 => CloneDataEnd,
            28 => CloneResponse,
            29 => LogRequest,
            30 => LogResponse,
            31 => Heartbeat,
            32 => ErrorMsg,
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

/// Authentication mode carried by `AUTH_REQUEST`. `Cert` is implemented
/// honestly (§9, Open Questions): a non-empty credential is accepted when
/// certs are enabled, without pretending to be real public-key
/// cryptography.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthType {
    Password = 0,
    Cert = 1,
}

impl TryFrom<u8> for AuthType {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Password),
            1 => Ok(Self::Cert),
            other => Err(ProtocolError::Malformed(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown auth type {other}"),
            ))),
        }
    }
}

/// Status codes of §6.3, carried in `AUTH_RESPONSE` and `ERROR_MSG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    AuthRequired = 1,
    AuthFailed = 2,
    InvalidRepo = 3,
    RepoExists = 4,
    RepoNotFound = 5,
    PermissionDenied = 6,
    InvalidRequest = 7,
    ServerError = 8,
    ProtocolError = 9,
    ConnectionLost = 10,
}

impl TryFrom<u8> for StatusCode {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use StatusCode::*;
        Ok(match v {
            0 => Success,
            1 => AuthRequired,
            2 => AuthFailed,
            3 => InvalidRepo,
            4 => RepoExists,
            5 => RepoNotFound,
            6 => PermissionDenied,
            7 => InvalidRequest,
            8 => ServerError,
            9 => ProtocolError,
            10 => ConnectionLost,
            other => {
                return Err(ProtocolError::Malformed(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown status code {other}"),
                )));
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoListing {
    pub name: String,
    pub last_modified: u64,
    pub commit_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    AuthRequest {
        auth_type: AuthType,
        data: Vec<u8>,
    },
    AuthResponse {
        status: StatusCode,
        session_id: [u8; 32],
        session_timeout: u32,
    },
    LoginRequest(String),
    LoginResponse(String),
    UseRepoRequest(String),
    UseRepoResponse(String),
    CreateRepoRequest(String),
    CreateRepoResponse(String),
    RemoveRepoRequest(String),
    RemoveRepoResponse(String),
    ListReposRequest,
    ListReposResponse(Vec<RepoListing>),
    PushCheckRequest {
        local_head: String,
        new_commit: String,
        parent: String,
    },
    PushCheckResponse {
        remote_head: String,
        needs_update: bool,
    },
    PushCommitData {
        commit_id: String,
        commit_data: Vec<u8>,
    },
    PushObjectData {
        id: String,
        data: Vec<u8>,
        crc32: u32,
    },
    PushRequest {
        remote_head: String,
    },
    PushResponse(String),
    PullCheckRequest {
        local_head: String,
    },
    PullCheckResponse {
        remote_head: String,
        has_updates: bool,
        commits_count: u32,
    },
    PullCommitData {
        commit_id: String,
        commit_data: Vec<u8>,
    },
    PullObjectData {
        id: String,
        data: Vec<u8>,
        crc32: u32,
    },
    PullResponse(String),
    CloneRequest(String),
    CloneDataStart {
        total_files: u32,
        total_size: u64,
        repo_name: String,
    },
    CloneFile {
        path: String,
        file_size: u64,
        crc32: u32,
        file_type: u8,
        data: Vec<u8>,
    },
    CloneDataEnd,
    CloneResponse(String),
    LogRequest {
        max_count: u32,
        line: bool,
    },
    LogResponse(Vec<(String, String)>),
    Heartbeat,
    Error {
        status: StatusCode,
        message: String,
    },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        use MessageType as T;
        match self {
            Self::AuthRequest { .. } => T::AuthRequest,
            Self::AuthResponse { .. } => T::AuthResponse,
            Self::LoginRequest(_) => T::LoginRequest,
            Self::LoginResponse(_) => T::LoginResponse,
            Self::UseRepoRequest(_) => T::UseRepoRequest,
            Self::UseRepoResponse(_) => T::UseRepoResponse,
            Self::CreateRepoRequest(_) => T::CreateRepoRequest,
            Self::CreateRepoResponse(_) => T::CreateRepoResponse,
            Self::RemoveRepoRequest(_) => T::RemoveRepoRequest,
            Self::RemoveRepoResponse(_) => T::RemoveRepoResponse,
            Self::ListReposRequest => T::ListReposRequest,
            Self::ListReposResponse(_) => T::ListReposResponse,
            Self::PushCheckRequest { .. } => T::PushCheckRequest,
            Self::PushCheckResponse { .. } => T::PushCheckResponse,
            Self::PushCommitData { .. } => T::PushCommitData,
            Self::PushObjectData { .. } => T::PushObjectData,
            Self::PushRequest { .. } => T::PushRequest,
            Self::PushResponse(_) => T::PushResponse,
            Self::PullCheckRequest { .. } => T::PullCheckRequest,
            Self::PullCheckResponse { .. } => T::PullCheckResponse,
            Self::PullCommitData { .. } => T::PullCommitData,
            Self::PullObjectData { .. } => T::PullObjectData,
            Self::PullResponse(_) => T::PullResponse,
            Self::CloneRequest(_) => T::CloneRequest,
            Self::CloneDataStart { .. } => T::CloneDataStart,
            Self::CloneFile { .. } => T::CloneFile,
            Self::CloneDataEnd => T::CloneDataEnd,
            Self::CloneResponse(_) => T::CloneResponse,
            Self::LogRequest { .. } => T::LogRequest,
            Self::LogResponse(_) => T::LogResponse,
            Self::Heartbeat => T::Heartbeat,
            Self::Error { .. } => T::ErrorMsg,
        }
    }

    /// Encodes this message's plaintext body (everything after the 16-byte
    /// frame header, before any encryption envelope is applied).
    pub fn encode_body(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        match self {
            Self::AuthRequest { auth_type, data } => {
                w.write_u8(*auth_type as u8);
                w.write_len_prefixed(data);
            }
            Self::AuthResponse {
                status,
                session_id,
                session_timeout,
            } => {
                w.write_u8(*status as u8);
                w.write_bytes(session_id);
                w.write_u32(*session_timeout);
            }
            Self::LoginRequest(s)
            | Self::LoginResponse(s)
            | Self::UseRepoRequest(s)
            | Self::UseRepoResponse(s)
            | Self::CreateRepoRequest(s)
            | Self::CreateRepoResponse(s)
            | Self::RemoveRepoRequest(s)
            | Self::RemoveRepoResponse(s)
            | Self::CloneRequest(s)
            | Self::CloneResponse(s)
            | Self::PushResponse(s)
            | Self::PullResponse(s) => {
                w.write_str(s);
            }
            Self::ListReposRequest => {}
            Self::ListReposResponse(repos) => {
                w.write_u32(repos.len() as u32);
                for repo in repos {
                    w.write_u32(repo.name.len() as u32);
                    w.write_u64(repo.last_modified);
                    w.write_u32(repo.commit_count);
                    w.write_bytes(repo.name.as_bytes());
                }
            }
            Self::PushCheckRequest {
                local_head,
                new_commit,
                parent,
            } => {
                w.write_u32(local_head.len() as u32);
                w.write_u32(new_commit.len() as u32);
                w.write_u32(parent.len() as u32);
                w.write_bytes(local_head.as_bytes());
                w.write_bytes(new_commit.as_bytes());
                w.write_bytes(parent.as_bytes());
            }
            Self::PushCheckResponse {
                remote_head,
                needs_update,
            } => {
                w.write_u32(remote_head.len() as u32);
                w.write_u8(*needs_update as u8);
                w.write_bytes(remote_head.as_bytes());
            }
            Self::PushCommitData {
                commit_id,
                commit_data,
            }
            | Self::PullCommitData {
                commit_id,
                commit_data,
            } => {
                w.write_u32(commit_id.len() as u32);
                w.write_u32(commit_data.len() as u32);
                w.write_bytes(commit_id.as_bytes());
                w.write_bytes(commit_data);
            }
            Self::PushObjectData { id, data, crc32 } | Self::PullObjectData { id, data, crc32 } => {
                w.write_u32(id.len() as u32);
                w.write_u32(data.len() as u32);
                w.write_u32(*crc32);
                w.write_bytes(id.as_bytes());
                w.write_bytes(data);
            }
            Self::PushRequest { remote_head } => {
                w.write_str(remote_head);
            }
            Self::PullCheckRequest { local_head } => {
                w.write_str(local_head);
            }
            Self::PullCheckResponse {
                remote_head,
                has_updates,
                commits_count,
            } => {
                w.write_u32(remote_head.len() as u32);
                w.write_u8(*has_updates as u8);
                w.write_u32(*commits_count);
                w.write_bytes(remote_head.as_bytes());
            }
            Self::CloneDataStart {
                total_files,
                total_size,
                repo_name,
            } => {
                w.write_u32(*total_files);
                w.write_u64(*total_size);
                w.write_str(repo_name);
            }
            Self::CloneFile {
                path,
                file_size,
                crc32,
                file_type,
                data,
            } => {
                w.write_u32(path.len() as u32);
                w.write_u64(*file_size);
                w.write_u32(*crc32);
                w.write_u8(*file_type);
                w.write_bytes(path.as_bytes());
                w.write_bytes(data);
            }
            Self::CloneDataEnd | Self::Heartbeat => {}
            Self::LogRequest { max_count, line } => {
                w.write_u32(*max_count);
                w.write_u8(*line as u8);
            }
            Self::LogResponse(commits) => {
                w.write_u32(commits.len() as u32);
                for (id, message) in commits {
                    w.write_str(id);
                    w.write_str(message);
                }
            }
            Self::Error { status, message } => {
                w.write_u8(*status as u8);
                w.write_bytes(message.as_bytes());
            }
        }
        w.into_bytes()
    }

    /// Decodes a message body given its wire `msg_type`.
    pub fn decode(msg_type: u8, body: &[u8]) -> ProtocolResult<Self> {
        let ty = MessageType::try_from(msg_type)?;
        let mut r = ByteReader::new(body);
        Ok(match ty {
            MessageType::AuthRequest => {
                let auth_type = AuthType::try_from(r.read_u8()?)?;
                let data = r.read_len_prefixed()?.to_vec();
                Self::AuthRequest { auth_type, data }
            }
            MessageType::AuthResponse => {
                let status = StatusCode::try_from(r.read_u8()?)?;
                let mut session_id = [0u8; 32];
                session_id.copy_from_slice(r.read_bytes(32)?);
                let session_timeout = r.read_u32()?;
                Self::AuthResponse {
                    status,
                    session_id,
                    session_timeout,
                }
            }
            MessageType::LoginRequest => Self::LoginRequest(r.read_string()?),
            MessageType::LoginResponse => Self::LoginResponse(r.read_string()?),
            MessageType::UseRepoRequest => Self::UseRepoRequest(r.read_string()?),
            MessageType::UseRepoResponse => Self::UseRepoResponse(r.read_string()?),
            MessageType::CreateRepoRequest => Self::CreateRepoRequest(r.read_string()?),
            MessageType::CreateRepoResponse => Self::CreateRepoResponse(r.read_string()?),
            MessageType::RemoveRepoRequest => Self::RemoveRepoRequest(r.read_string()?),
            MessageType::RemoveRepoResponse => Self::RemoveRepoResponse(r.read_string()?),
            MessageType::ListReposRequest => Self::ListReposRequest,
            MessageType::ListReposResponse => {
                let count = r.read_u32()? as usize;
                let mut repos = Vec::with_capacity(count);
                for _ in 0..count {
                    let name_len = r.read_u32()? as usize;
                    let last_modified = r.read_u64()?;
                    let commit_count = r.read_u32()?;
                    let name = string_from(r.read_bytes(name_len)?)?;
                    repos.push(RepoListing {
                        name,
                        last_modified,
                        commit_count,
                    });
                }
                Self::ListReposResponse(repos)
            }
            MessageType::PushCheckRequest => {
                let local_head_len = r.read_u32()? as usize;
                let new_commit_len = r.read_u32()? as usize;
                let parent_len = r.read_u32()? as usize;
                let local_head = string_from(r.read_bytes(local_head_len)?)?;
                let new_commit = string_from(r.read_bytes(new_commit_len)?)?;
                let parent = string_from(r.read_bytes(parent_len)?)?;
                Self::PushCheckRequest {
                    local_head,
                    new_commit,
                    parent,
                }
            }
            MessageType::PushCheckResponse => {
                let remote_head_len = r.read_u32()? as usize;
                let needs_update = r.read_u8()? != 0;
                let remote_head = string_from(r.read_bytes(remote_head_len)?)?;
                Self::PushCheckResponse {
                    remote_head,
                    needs_update,
                }
            }
            MessageType::PushCommitData | MessageType::PullCommitData => {
                let commit_id_len = r.read_u32()? as usize;
                let commit_data_len = r.read_u32()? as usize;
                let commit_id = string_from(r.read_bytes(commit_id_len)?)?;
                let commit_data = r.read_bytes(commit_data_len)?.to_vec();
                if ty == MessageType::PushCommitData {
                    Self::PushCommitData {
                        commit_id,
                        commit_data,
                    }
                } else {
                    Self::PullCommitData {
                        commit_id,
                        commit_data,
                    }
                }
            }
            MessageType::PushObjectData | MessageType::PullObjectData => {
                let id_len = r.read_u32()? as usize;
                let data_len = r.read_u32()? as usize;
                let crc32 = r.read_u32()?;
                let id = string_from(r.read_bytes(id_len)?)?;
                let data = r.read_bytes(data_len)?.to_vec();
                if ty == MessageType::PushObjectData {
                    Self::PushObjectData { id, data, crc32 }
                } else {
                    Self::PullObjectData { id, data, crc32 }
                }
            }
            MessageType::PushRequest => Self::PushRequest {
                remote_head: r.read_string()?,
            },
            MessageType::PushResponse => Self::PushResponse(r.read_string()?),
            MessageType::PullCheckRequest => Self::PullCheckRequest {
                local_head: r.read_string()?,
            },
            MessageType::PullCheckResponse => {
                let remote_head_len = r.read_u32()? as usize;
                let has_updates = r.read_u8()? != 0;
                let commits_count = r.read_u32()?;
                let remote_head = string_from(r.read_bytes(remote_head_len)?)?;
                Self::PullCheckResponse {
                    remote_head,
                    has_updates,
                    commits_count,
                }
            }
            MessageType::PullResponse => Self::PullResponse(r.read_string()?),
            MessageType::CloneRequest => Self::CloneRequest(r.read_string()?),
            MessageType::CloneDataStart => {
                let total_files = r.read_u32()?;
                let total_size = r.read_u64()?;
                let repo_name = r.read_string()?;
                Self::CloneDataStart {
                    total_files,
                    total_size,
                    repo_name,
                }
            }
            MessageType::CloneFile => {
                let path_len = r.read_u32()? as usize;
                let file_size = r.read_u64()?;
                let crc32 = r.read_u32()?;
                let file_type = r.read_u8()?;
                let path = string_from(r.read_bytes(path_len)?)?;
                let data = r.read_bytes(file_size as usize)?.to_vec();
                Self::CloneFile {
                    path,
                    file_size,
                    crc32,
                    file_type,
                    data,
                }
            }
            MessageType::CloneDataEnd => Self::CloneDataEnd,
            MessageType::CloneResponse => Self::CloneResponse(r.read_string()?),
            MessageType::LogRequest => {
                let max_count = r.read_u32()?;
                let line = r.read_u8()? != 0;
                Self::LogRequest { max_count, line }
            }
            MessageType::LogResponse => {
                let count = r.read_u32()? as usize;
                let mut commits = Vec::with_capacity(count);
                for _ in 0..count {
                    let id = r.read_string()?;
                    let message = r.read_string()?;
                    commits.push((id, message));
                }
                Self::LogResponse(commits)
            }
            MessageType::Heartbeat => Self::Heartbeat,
            MessageType::ErrorMsg => {
                let status = StatusCode::try_from(r.read_u8()?)?;
                let message = String::from_utf8_lossy(r.remaining()).into_owned();
                Self::Error { status, message }
            }
        })
    }
}

fn string_from(bytes: &[u8]) -> ProtocolResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|err| ProtocolError::Malformed(io::Error::new(io::ErrorKind::InvalidData, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: Message) {
        let msg_type = msg.message_type();
        let body = msg.encode_body();
        let decoded = Message::decode(msg_type as u8, &body).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_auth_request() {
        round_trip(Message::AuthRequest {
            auth_type: AuthType::Password,
            data: b"pw".to_vec(),
        });
    }

    #[test]
    fn round_trips_auth_response() {
        round_trip(Message::AuthResponse {
            status: StatusCode::Success,
            session_id: [7u8; 32],
            session_timeout: 300,
        });
    }

    #[test]
    fn round_trips_generic_string_messages() {
        round_trip(Message::LoginRequest("alice".to_owned()));
        round_trip(Message::PushResponse("ok".to_owned()));
        round_trip(Message::CloneRequest("demo".to_owned()));
    }

    #[test]
    fn round_trips_list_repos_response() {
        round_trip(Message::ListReposResponse(vec![RepoListing {
            name: "demo".to_owned(),
            last_modified: 12345,
            commit_count: 3,
        }]));
    }

    #[test]
    fn round_trips_push_check_request_and_response() {
        round_trip(Message::PushCheckRequest {
            local_head: "a".repeat(40),
            new_commit: "a".repeat(40),
            parent: String::new(),
        });
        round_trip(Message::PushCheckResponse {
            remote_head: String::new(),
            needs_update: true,
        });
    }

    #[test]
    fn round_trips_commit_and_object_data() {
        round_trip(Message::PushCommitData {
            commit_id: "c".repeat(40),
            commit_data: vec![1, 2, 3],
        });
        round_trip(Message::PullObjectData {
            id: "d".repeat(40),
            data: vec![9, 9, 9],
            crc32: 0xdead_beef,
        });
    }

    #[test]
    fn round_trips_clone_messages() {
        round_trip(Message::CloneDataStart {
            total_files: 2,
            total_size: 100,
            repo_name: "demo".to_owned(),
        });
        round_trip(Message::CloneFile {
            path: "a.txt".to_owned(),
            file_size: 3,
            crc32: 0,
            file_type: 0,
            data: vec![b'h', b'i', b'!'],
        });
        round_trip(Message::CloneDataEnd);
    }

    #[test]
    fn round_trips_log_and_heartbeat_and_error() {
        round_trip(Message::LogRequest {
            max_count: 10,
            line: true,
        });
        round_trip(Message::LogResponse(vec![("a".repeat(40), "msg".to_owned())]));
        round_trip(Message::Heartbeat);
        round_trip(Message::Error {
            status: StatusCode::InvalidRequest,
            message: "non-fast-forward: pull latest first".to_owned(),
        });
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert_matches::assert_matches!(Message::decode(200, &[]), Err(ProtocolError::UnknownType(200)));
    }
}
