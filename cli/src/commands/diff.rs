use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::ui::Ui;

pub fn run(ui: &Ui, cached: bool, name_only: bool) -> CommandResult<()> {
    let repo = open_repo_here().map_err(CommandError::Usage)?;
    let statuses = repo.diff(cached)?;
    for entry in statuses {
        if name_only {
            ui.println(&entry.path);
        } else {
            ui.println(&format!("{} {}", entry.status, entry.path));
        }
    }
    Ok(())
}
