use std::env;

use minigit_lib::client::AuthCredential;
use minigit_lib::client::ClientEngine;

use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::parse_host_port_repo;
use crate::progress::Progress;
use crate::ui::Ui;

pub async fn run(ui: &Ui, target: String, password: Option<String>) -> CommandResult<()> {
    let parsed = parse_host_port_repo(&target).map_err(CommandError::Usage)?;

    let mut client = ClientEngine::new();
    client.connect(&format!("{}:{}", parsed.host, parsed.port)).await?;
    let password = super::resolve_password(password)?;
    client.authenticate(AuthCredential::Password(password)).await?;

    let dest = env::current_dir()?.join(&parsed.repo);
    let progress = Progress::new("cloning");
    let mut report = |done: u64, total: u64| progress.retarget_and_update(done, total);
    client.clone_repo(&parsed.repo, &dest, Some(&mut report)).await?;
    progress.finish();
    ui.success(&format!("cloned into {}", dest.display()));
    Ok(())
}
