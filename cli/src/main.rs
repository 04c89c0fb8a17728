//! `minigit`: the command-line front end over `minigit-lib`.
//!
//! Argument parsing (`clap`), terminal output (`Ui`), and process exit
//! codes live here; everything else is delegated straight through to the
//! library's `Repository`/`ClientEngine`/`ServerEngine`.

mod command_error;
mod commands;
mod config;
mod progress;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use tracing_subscriber::EnvFilter;

use command_error::CommandResult;
use config::DEFAULT_PORT;
use ui::Ui;

#[derive(Parser)]
#[command(name = "minigit", about = "A miniature distributed version control system")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new repository in the current directory.
    Init,
    /// Stage paths for the next commit.
    Add { paths: Vec<String> },
    /// Record a commit of the currently staged paths.
    Commit {
        #[arg(short = 'm', long = "message")]
        message: String,
    },
    /// Show working-tree status relative to HEAD and the index.
    Status,
    /// Write the HEAD commit's tree into the working directory.
    Checkout,
    /// Move HEAD (and optionally the index and working tree) to a commit.
    Reset {
        #[arg(long)]
        soft: bool,
        #[arg(long)]
        mixed: bool,
        #[arg(long)]
        hard: bool,
        id: Option<String>,
    },
    /// Show commit history, most recent first.
    Log {
        #[arg(long)]
        line: bool,
        #[arg(short = 'n')]
        count: Option<usize>,
    },
    /// Show pending changes.
    Diff {
        #[arg(long)]
        cached: bool,
        #[arg(long = "name-only")]
        name_only: bool,
    },
    /// Record the server this repository synchronizes with.
    SetRemote { url: String },
    /// Upload local commits to the configured remote.
    Push {
        #[arg(long)]
        password: Option<String>,
    },
    /// Download the remote's HEAD commit and check it out.
    Pull {
        #[arg(long)]
        password: Option<String>,
    },
    /// Run the synchronization server.
    Server {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        cert: Option<PathBuf>,
    },
    /// Connect to a server and list its repositories.
    Connect {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        cert: Option<PathBuf>,
    },
    /// Copy a repository from a server into a new local directory.
    Clone {
        target: String,
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ui = Ui::new();
    match dispatch(&ui, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui.error(&err.to_string());
            err.exit_code()
        }
    }
}

async fn dispatch(ui: &Ui, command: Command) -> CommandResult<()> {
    match command {
        Command::Init => commands::init::run(ui),
        Command::Add { paths } => commands::add::run(ui, paths),
        Command::Commit { message } => commands::commit::run(ui, message),
        Command::Status => commands::status::run(ui),
        Command::Checkout => commands::checkout::run(ui),
        Command::Reset { soft, mixed, hard, id } => commands::reset::run(ui, soft, mixed, hard, id),
        Command::Log { line, count } => commands::log::run(ui, line, count),
        Command::Diff { cached, name_only } => commands::diff::run(ui, cached, name_only),
        Command::SetRemote { url } => commands::set_remote::run(ui, url),
        Command::Push { password } => commands::push::run(ui, password).await,
        Command::Pull { password } => commands::pull::run(ui, password).await,
        Command::Server {
            port,
            root,
            password,
            cert,
        } => commands::server::run(ui, port, root, password, cert).await,
        Command::Connect {
            host,
            port,
            password,
            cert,
        } => commands::connect::run(ui, host, port, password, cert).await,
        Command::Clone { target, password } => commands::clone::run(ui, target, password).await,
    }
}
