use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::{error, info};
use subiquity_server::core::{Server, ServerOptions, default_socket_path, default_state_dir};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BootloaderArg {
    None,
    Bios,
    Prep,
    Uefi,
}

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "sha-unknown",
};

fn version() -> String {
    let author = clap::crate_authors!();
    format!("{PKG_VERSION}-{GIT_SHA}\nAuthors: {author}")
}

/// spec.md §6 CLI surface.
#[derive(Parser, Debug)]
#[command(author, version = version(), about = "Installer control-plane daemon")]
struct Cli {
    /// Run against a throwaway state directory instead of the real root.
    #[arg(long)]
    dry_run: bool,

    /// Unix-domain socket to listen on.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Machine-readable hardware description used in place of real probing.
    #[arg(long)]
    machine_config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "none")]
    bootloader: BootloaderArg,

    /// Canned client answers file for unattended dry runs.
    #[arg(long)]
    answers: Option<PathBuf>,

    /// Autoinstall document path (defaults to `/autoinstall.yaml`).
    #[arg(long)]
    autoinstall: Option<PathBuf>,

    #[arg(long)]
    kernel_cmdline: Option<String>,

    /// Extra package source, may be given more than once.
    #[arg(long = "source")]
    sources: Vec<String>,

    #[arg(long, conflicts_with = "no_snaps_from_examples")]
    snaps_from_examples: bool,

    #[arg(long)]
    no_snaps_from_examples: bool,

    #[arg(long = "snap-section")]
    snap_sections: Vec<String>,
}

fn init_logging() {
    match std::env::var("RUST_LOG_STYLE") {
        Ok(s) if s == "SYSTEMD" => env_logger::builder()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "<{}>{}: {}",
                    match record.level() {
                        log::Level::Error => 3,
                        log::Level::Warn => 4,
                        log::Level::Info => 6,
                        log::Level::Debug => 7,
                        log::Level::Trace => 7,
                    },
                    record.target(),
                    record.args()
                )
            })
            .init(),
        _ => env_logger::init(),
    };
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    info!("starting subiquityd");
    info!("version: {PKG_VERSION}");
    info!("git sha: {GIT_SHA}");
    info!("mode: {}", if cli.dry_run { "DRY-RUN" } else { "LIVE" });

    let root = if cli.dry_run {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        PathBuf::from("/")
    };

    let opts = ServerOptions {
        dry_run: cli.dry_run,
        socket_path: cli
            .socket
            .unwrap_or_else(|| default_socket_path(cli.dry_run, &root)),
        state_dir: default_state_dir(cli.dry_run, &root),
        root: root.clone(),
        autoinstall_path: cli.autoinstall,
        curtin_config_path: root.join(".subiquity/curtin-install.yaml"),
    };

    let server = match Server::boot(opts).await {
        Ok(server) => server,
        Err(e) => {
            error!("failed to boot: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.serve().await {
        error!("server exited with error: {e}");
        std::process::exit(1);
    }
}
