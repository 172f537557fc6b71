use std::path::PathBuf;

use clap::Parser;
use log::{error, info};
use subiquity_agent::server::build_callback_router;
use subiquity_core::UnixSocketTransport;
use subiquity_core::api::{Transport, Verb, paths};

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "sha-unknown",
};

fn version() -> String {
    let author = clap::crate_authors!();
    format!("{PKG_VERSION}-{GIT_SHA}\nAuthors: {author}")
}

/// Registers as a peer `/network` subscriber and relays each callback to
/// its own log (spec.md §4.3 "the generated client running in reverse").
#[derive(Parser, Debug)]
#[command(author, version = version(), about = "Network subscription peer agent")]
struct Cli {
    /// Server's Unix-domain socket.
    #[arg(long, default_value = "/run/subiquity/socket")]
    server_socket: PathBuf,

    /// Socket this agent listens on for callbacks.
    #[arg(long, default_value = "/run/subiquity/agent.socket")]
    agent_socket: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    info!("starting subiquity-agent {PKG_VERSION}-{GIT_SHA}");

    if cli.agent_socket.exists() {
        if let Err(e) = std::fs::remove_file(&cli.agent_socket) {
            error!("failed to remove stale agent socket: {e}");
            std::process::exit(1);
        }
    }
    let listener = match tokio::net::UnixListener::bind(&cli.agent_socket) {
        Ok(l) => l,
        Err(e) => {
            error!(
                "failed to bind agent socket at {}: {e}",
                cli.agent_socket.display()
            );
            std::process::exit(1);
        }
    };

    let transport = UnixSocketTransport::new(cli.server_socket.display().to_string());
    let agent_socket_str = cli.agent_socket.display().to_string();
    let query = vec![("socket_path".to_string(), agent_socket_str.clone())];
    if let Err(e) = transport
        .call(Verb::Put, paths::NETWORK_SUBSCRIPTION.path, &query, None)
        .await
    {
        error!("failed to register network subscription: {e}");
        std::process::exit(1);
    }
    info!("registered as network subscriber at {agent_socket_str}");

    let app = build_callback_router();
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        error!("agent callback server exited: {e}");
        let _ = transport
            .call(Verb::Delete, paths::NETWORK_SUBSCRIPTION.path, &query, None)
            .await;
        std::process::exit(1);
    }
}
