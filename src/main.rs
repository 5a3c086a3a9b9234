mod cli;
mod config;
mod engine;
mod error;
mod metainfo;
mod peer_protocol;
mod peers;
mod piece_plan;
mod prelude;
mod session;
mod torrent;
mod tracker;
mod writer;

use clap::Parser;
use cli::Cli;
use prelude::*;

use config::Config;
use engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "leech=info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let metainfo = metainfo::Metainfo::from_bencode_file(&cli.source).await?;
    info!(name = %metainfo.name, pieces = metainfo.number_of_pieces(), "parsed torrent");

    let config = Config {
        port: cli.port,
        output_dir: cli.output,
        ..Config::default()
    };

    if let Err(err) = Engine::new(metainfo, config).run().await {
        error!(error = %err, "download failed");
        std::process::exit(1);
    }

    Ok(())
}
