use anyhow::Result;
use clap::Parser;
use foodscore_server::config;
use foodscore_server::logging::init_logging;
use foodscore_server::server::{RunOptions, Server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Exported classifier weights (JSON).
    #[arg(long, default_value = "../model/model.json")]
    model: PathBuf,

    /// SQLite file holding the score cache; created if missing.
    #[arg(long, default_value = "db.sqlite")]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::ServerConfig::from_env();

    init_logging(&cfg.log_level);

    tracing::info!(
        event = "server_start",
        model = ?args.model,
        db = ?args.db,
        config = ?cfg
    );

    let opts = RunOptions {
        model_path: args.model,
        db_path: args.db,
    };
    if let Err(e) = Server::run(opts, cfg).await {
        tracing::error!(event = "server_fatal", error = ?e);
        return Err(e);
    }
    Ok(())
}
