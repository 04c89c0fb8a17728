//! The CLI's error taxonomy: every subcommand returns `CommandResult<()>`,
//! and `main` turns the `Err` into a short message on stderr plus an exit
//! code, per spec §7's "short English messages, non-zero exit code."

use std::process::ExitCode;

use minigit_lib::client::ClientError;
use minigit_lib::repo::RepoError;
use minigit_lib::server::RepoManagerError;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    RepoManager(#[from] RepoManagerError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

impl CommandError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}
