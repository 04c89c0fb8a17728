use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::ui::Ui;

pub fn run(ui: &Ui, line: bool, count: Option<usize>) -> CommandResult<()> {
    let repo = open_repo_here().map_err(CommandError::Usage)?;
    let commits = repo.log(count)?;
    if commits.is_empty() {
        ui.println("no commits yet");
        return Ok(());
    }
    for commit in &commits {
        if line {
            ui.println(&format!("{} {}", commit.id.short(12), commit.message));
        } else {
            ui.println(&format!("commit {}", commit.id));
            ui.println(&format!("Date: {}", commit.timestamp));
            ui.println("");
            ui.println(&format!("    {}", commit.message));
            let diff = repo.commit_diff(commit)?;
            for path in &diff.added {
                ui.println(&format!("    A {path}"));
            }
            for path in &diff.modified {
                ui.println(&format!("    M {path}"));
            }
            for path in &diff.removed {
                ui.println(&format!("    D {path}"));
            }
            ui.println("");
        }
    }
    Ok(())
}
