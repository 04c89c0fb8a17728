use std::env;

use minigit_lib::repo::Repository;

use crate::command_error::CommandResult;
use crate::ui::Ui;

pub fn run(ui: &Ui) -> CommandResult<()> {
    let cwd = env::current_dir()?;
    Repository::init(&cwd)?;
    ui.success(&format!("initialized empty repository in {}", cwd.display()));
    Ok(())
}
