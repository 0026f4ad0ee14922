use clap::Parser;
use cli_support::{init_tracing, ServeArgs};
use prediction_server::{router, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "prediction_server",
    about = "Serve face attribute predictions and drift reports"
)]
struct Args {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    config.bind_addr = args.serve.bind;
    let state = config.build_state()?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Prediction server listening on http://{}", config.bind_addr);
    tracing::info!("  - POST /predict/");
    tracing::info!("  - GET  /data-drifting-report");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
