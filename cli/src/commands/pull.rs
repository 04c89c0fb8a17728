use minigit_lib::client::AuthCredential;
use minigit_lib::client::ClientEngine;

use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::config::parse_remote_url;
use crate::ui::Ui;

pub async fn run(ui: &Ui, password: Option<String>) -> CommandResult<()> {
    let mut repo = open_repo_here().map_err(CommandError::Usage)?;
    let config = repo.load_config()?;
    let remote = config
        .remote()
        .ok_or_else(|| CommandError::Usage("no remote configured; run set-remote first".to_owned()))?;
    let parsed = parse_remote_url(remote).map_err(CommandError::Usage)?;

    let mut client = ClientEngine::new();
    client.connect(&format!("{}:{}", parsed.host, parsed.port)).await?;
    let password = super::resolve_password(password)?;
    client.authenticate(AuthCredential::Password(password)).await?;
    client.use_repository(&parsed.repo).await?;

    let outcome = client.pull(&mut repo).await?;
    if outcome.up_to_date {
        ui.println("already up to date");
    } else {
        ui.success(&format!("updated to {}", outcome.new_head.expect("pull reported an update")));
    }
    Ok(())
}
