use std::path::PathBuf;

use clap::Parser;
use log::{LevelFilter, error};
use subiquity_tui::{errors::init_panic_hook, logging::init_logging, tui::start_tui_app};

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "sha-unknown",
};

fn version() -> String {
    let author = clap::crate_authors!();
    format!("{PKG_VERSION}-{GIT_SHA}\nAuthors: {author}")
}

/// spec.md §6 "Client (`subiquity.cmd.tui`)".
#[derive(Parser, Debug)]
#[command(author, version = version(), about = "Installer text UI client")]
struct Cli {
    /// Server's Unix-domain socket.
    #[arg(long, default_value = "/run/subiquity/socket")]
    socket: PathBuf,

    /// Where `last-screen` and other client state is persisted.
    #[arg(long, default_value = "/run/subiquity")]
    state_dir: PathBuf,

    #[arg(long, value_enum, global = true)]
    log_level: Option<LevelFilter>,

    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_file);
    init_panic_hook();

    if let Err(e) = start_tui_app(cli.socket.display().to_string(), cli.state_dir).await {
        error!("{e}");
        std::process::exit(1);
    }
}
