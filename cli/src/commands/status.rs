use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::ui::Ui;

pub fn run(ui: &Ui) -> CommandResult<()> {
    let repo = open_repo_here().map_err(CommandError::Usage)?;
    let statuses = repo.status()?;
    if statuses.is_empty() {
        ui.println("nothing to commit, working tree clean");
        return Ok(());
    }
    for entry in statuses {
        match &entry.old_path {
            Some(old) => ui.println(&format!("{} {} -> {}", entry.status, old, entry.path)),
            None => ui.println(&format!("{} {}", entry.status, entry.path)),
        }
    }
    Ok(())
}
