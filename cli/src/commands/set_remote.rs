use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::config::parse_remote_url;
use crate::ui::Ui;

pub fn run(ui: &Ui, url: String) -> CommandResult<()> {
    parse_remote_url(&url).map_err(CommandError::Usage)?;
    let repo = open_repo_here().map_err(CommandError::Usage)?;
    let mut config = repo.load_config()?;
    config.set("remote", url.clone());
    repo.save_config(&config)?;
    ui.success(&format!("remote set to {url}"));
    Ok(())
}
