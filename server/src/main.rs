use anyhow::Result;
use axum::Router;
use clap::Parser;
use engine::{AnalyzerConfig, DomainAnalyzer};
use scanner::{WaybackClient, WaybackConfig};
use scorer::HtmlSpamScorer;
use server::{build_app, BlockingScorer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Archive base URL
    #[arg(long, default_value = "https://web.archive.org")]
    archive_url: String,
    /// Archive request timeout seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Pause between snapshot fetches (milliseconds)
    #[arg(long, default_value_t = 3000)]
    snapshot_delay_ms: u64,
    /// Pause between domains (milliseconds)
    #[arg(long, default_value_t = 5000)]
    domain_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let source = WaybackClient::new(WaybackConfig {
        base_url: args.archive_url.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        ..WaybackConfig::default()
    })?;
    let config = AnalyzerConfig {
        snapshot_delay: Duration::from_millis(args.snapshot_delay_ms),
        domain_delay: Duration::from_millis(args.domain_delay_ms),
    };
    let scorer = BlockingScorer::new(HtmlSpamScorer::default());
    let analyzer = DomainAnalyzer::new(Arc::new(source), Arc::new(scorer), config);
    let app: Router = build_app(analyzer)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, archive = %args.archive_url, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
