use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod golduino;
mod http;
mod port;
mod proto;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("golduino_web=info,tower_http=info")),
        )
        .init();

    let args = cli::Cli::parse();
    match args.cmd {
        cli::Cmd::Serve(opts) => http::run(opts).await,
        cli::Cmd::Ports => port::list_ports(),
    }
}
