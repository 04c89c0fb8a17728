use minigit_lib::ObjectId;
use minigit_lib::repo::ResetMode;

use crate::command_error::CommandError;
use crate::command_error::CommandResult;
use crate::config::open_repo_here;
use crate::ui::Ui;

pub fn run(ui: &Ui, soft: bool, mixed: bool, hard: bool, id: Option<String>) -> CommandResult<()> {
    let mode = match (soft, mixed, hard) {
        (true, false, false) => ResetMode::Soft,
        (false, true, false) => ResetMode::Mixed,
        (false, false, true) => ResetMode::Hard,
        (false, false, false) => ResetMode::Mixed,
        _ => return Err(CommandError::Usage("pass at most one of --soft/--mixed/--hard".to_owned())),
    };
    let mut repo = open_repo_here().map_err(CommandError::Usage)?;
    repo.reset(mode, id.map(ObjectId::from_hex))?;
    ui.success("reset complete");
    Ok(())
}
