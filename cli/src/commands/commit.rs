use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::ui::Ui;

pub fn run(ui: &Ui, message: String) -> CommandResult<()> {
    let mut repo = open_repo_here().map_err(CommandError::Usage)?;
    let commit = repo.commit(message)?;
    ui.success(&format!("[{}] {}", commit.id.short(10), commit.message));
    Ok(())
}
