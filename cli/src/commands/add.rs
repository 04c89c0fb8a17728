use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::ui::Ui;

pub fn run(ui: &Ui, paths: Vec<String>) -> CommandResult<()> {
    if paths.is_empty() {
        return Err(CommandError::Usage("add requires at least one path".to_owned()));
    }
    let mut repo = open_repo_here().map_err(CommandError::Usage)?;
    let report = repo.add(&paths)?;
    if report.is_empty() {
        ui.hint("nothing to add");
        return Ok(());
    }
    for path in &report.staged {
        ui.println(&format!("staged: {path}"));
    }
    for path in &report.removed {
        ui.println(&format!("removed: {path}"));
    }
    Ok(())
}
