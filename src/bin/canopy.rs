//! canopy daemon binary
//!
//! Binds the listener, dials any configured peers, and runs until
//! interrupted.

use canopy::Node;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Convergent state-propagation mesh daemon
#[derive(Parser, Debug)]
#[command(name = "canopy", version, about)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Peer addresses to dial at startup
    #[arg(value_name = "PEER")]
    peers: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    info!("canopy starting");

    let node = match Node::bind(&args.bind).await {
        Ok(node) => node,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(id = %node.id(), bind = %args.bind, "node listening");

    for peer in &args.peers {
        if let Err(e) = node.dial(peer).await {
            error!("{}", e);
            std::process::exit(1);
        }
    }

    tokio::select! {
        _ = node.run() => {
            error!("listener stopped");
            std::process::exit(1);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("canopy shutting down");
}
