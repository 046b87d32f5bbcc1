use clap::Parser;
use dgrep_engine::Engine;
use eyre::WrapErr;
use tokio::io::{stdin, stdout, BufReader};

mod cli;
mod repl;

use cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    dgrep_utils::tracing::init(cli.verbose)
        .map_err(|e| eyre::eyre!("failed to initialise logging: {e}"))?;

    let layout = cli.layout()?;
    let ordinal = cli.local_ordinal(&layout)?;

    // Peers know us by our resolved address; without one we fall back to the bound address
    let advertise = match layout.resolve(ordinal).await {
        Ok(addr) => Some(addr),
        Err(e) => {
            tracing::warn!(ordinal, error = %e, "Could not resolve own address");
            None
        }
    };
    let peers = layout.resolve_peers(ordinal).await;

    let config = cli.engine_config(layout.listen_addr_for(ordinal)?, advertise);
    let engine = Engine::with_process_matcher(config)?;

    let addr = engine
        .start_server()
        .await
        .wrap_err("failed to start the query server")?;
    tracing::info!(ordinal, %addr, node = %engine.node_id(), "Listening for peers");

    engine
        .connect_to_peers(&peers)
        .await
        .wrap_err("failed to connect to peers")?;

    repl::run(&engine, BufReader::new(stdin()), stdout()).await?;

    engine.shutdown().await;
    Ok(())
}
