//! One module per subcommand, each a thin wrapper over `minigit-lib`'s
//! `Repository`/`ClientEngine`/`ServerEngine`, reporting through `Ui`.

pub mod add;
pub mod checkout;
pub mod clone;
pub mod commit;
pub mod connect;
pub mod diff;
pub mod init;
pub mod log;
pub mod pull;
pub mod push;
pub mod reset;
pub mod server;
pub mod set_remote;
pub mod status;

/// Reads a password from `--password`, or interactively if omitted —
/// the one auth flow the CLI's `push`/`pull`/`connect`/`clone`/`server`
/// subcommands share.
pub fn resolve_password(given: Option<String>) -> std::io::Result<String> {
    match given {
        Some(password) => Ok(password),
        None => rpassword::prompt_password("server password: "),
    }
}

pub fn resolve_credential(
    password: Option<String>,
    cert: Option<std::path::PathBuf>,
) -> std::io::Result<minigit_lib::client::AuthCredential> {
    if let Some(cert_path) = cert {
        let bytes = std::fs::read(cert_path)?;
        return Ok(minigit_lib::client::AuthCredential::Cert(bytes));
    }
    Ok(minigit_lib::client::AuthCredential::Password(resolve_password(password)?))
}
