use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::ui::Ui;

pub fn run(ui: &Ui) -> CommandResult<()> {
    let repo = open_repo_here().map_err(CommandError::Usage)?;
    repo.checkout()?;
    ui.success("checked out HEAD");
    Ok(())
}
