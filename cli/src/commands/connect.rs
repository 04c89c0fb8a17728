use std::path::PathBuf;

use minigit_lib::client::ClientEngine;

use crate::command_error::CommandResult;
use crate::config::DEFAULT_PORT;
use crate::ui::Ui;

/// Connects, authenticates, and lists the server's repositories — the
/// CLI's only reachable path to `listRepositories`/`createRepository`/
/// `removeRepository`, which otherwise have no dedicated subcommand.
pub async fn run(
    ui: &Ui,
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    cert: Option<PathBuf>,
) -> CommandResult<()> {
    let host = host.unwrap_or_else(|| "localhost".to_owned());
    let port = port.unwrap_or(DEFAULT_PORT);

    let mut client = ClientEngine::new();
    client.connect(&format!("{host}:{port}")).await?;
    let credential = super::resolve_credential(password, cert)?;
    client.authenticate(credential).await?;

    let repos = client.list_repositories().await?;
    if repos.is_empty() {
        ui.println("no repositories on server");
        return Ok(());
    }
    for repo in repos {
        ui.println(&format!("{} ({} commits)", repo.name, repo.commit_count));
    }
    Ok(())
}
