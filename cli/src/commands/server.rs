use std::path::PathBuf;

use minigit_lib::config::ServerConfig;
use minigit_lib::server::ServerEngine;

use crate::command_error::CommandResult;
use crate::ui::Ui;

pub async fn run(
    ui: &Ui,
    port: u16,
    root: PathBuf,
    password: Option<String>,
    cert: Option<PathBuf>,
) -> CommandResult<()> {
    std::fs::create_dir_all(&root)?;
    let config = ServerConfig::new(port, root.clone())
        .with_password(password)
        .with_cert_path(cert);
    ui.println(&format!("listening on 0.0.0.0:{port}, serving {}", root.display()));
    ServerEngine::new(config).run().await?;
    Ok(())
}
