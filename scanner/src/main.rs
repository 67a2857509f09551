use anyhow::{anyhow, Result};
use clap::Parser;
use engine::{AnalyzerConfig, DomainAnalyzer, ProgressSink};
use scanner::{load_keywords, load_targets, OutRecord, WaybackClient, WaybackConfig};
use scorer::HtmlSpamScorer;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "scanner")]
#[command(about = "Check a domain's archived history for spam content")]
struct Cli {
    /// Domain or URL to analyze (repeatable)
    #[arg(long = "domain", short = 'd')]
    domains: Vec<String>,
    /// File with one domain per line
    #[arg(long)]
    domains_file: Option<PathBuf>,
    /// Spam keyword, or comma-separated keywords (repeatable)
    #[arg(long = "keyword", short = 'k')]
    keywords: Vec<String>,
    /// File with spam keywords (one per line or comma separated)
    #[arg(long)]
    keywords_file: Option<PathBuf>,
    /// Also include the built-in spam keyword list
    #[arg(long, default_value_t = false)]
    default_keywords: bool,
    /// Maximum snapshots to analyze per domain
    #[arg(long, default_value_t = 10)]
    max_snapshots: usize,
    /// Pause between snapshot fetches (milliseconds)
    #[arg(long, default_value_t = 3000)]
    snapshot_delay_ms: u64,
    /// Pause between domains (milliseconds)
    #[arg(long, default_value_t = 5000)]
    domain_delay_ms: u64,
    /// Archive base URL
    #[arg(long, default_value = "https://web.archive.org")]
    archive_url: String,
    /// Request timeout seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// User-Agent string sent to the archive
    #[arg(long, default_value = "snapshot-spam-scanner/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// Optional JSONL output file, one record per domain
    #[arg(long)]
    output: Option<String>,
    /// Suppress progress lines on stderr
    #[arg(long, short = 'q', default_value_t = false)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let args = Cli::parse();

    let targets = load_targets(&args.domains, args.domains_file.as_deref())?;
    if targets.is_empty() { return Err(anyhow!("no domains to analyze")); }
    if args.max_snapshots == 0 { return Err(anyhow!("--max-snapshots must be at least 1")); }
    let keywords = load_keywords(&args.keywords, args.keywords_file.as_deref(), args.default_keywords)?;

    let source = WaybackClient::new(WaybackConfig {
        base_url: args.archive_url.clone(),
        user_agent: args.user_agent.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        ..WaybackConfig::default()
    })?;
    let config = AnalyzerConfig {
        snapshot_delay: Duration::from_millis(args.snapshot_delay_ms),
        domain_delay: Duration::from_millis(args.domain_delay_ms),
    };
    let analyzer = DomainAnalyzer::new(Arc::new(source), Arc::new(HtmlSpamScorer::default()), config);

    eprintln!(
        "scanner: domains={} keywords={} max_snapshots={} archive={}",
        targets.len(),
        keywords.len(),
        args.max_snapshots,
        args.archive_url
    );

    let print: ProgressSink<'_> = &|msg: &str| eprintln!("{msg}");
    let sink = if args.quiet { None } else { Some(print) };
    let results = analyzer.analyze_domains(&targets, &keywords, args.max_snapshots, sink).await;

    for r in &results {
        let detail = match &r.error {
            Some(e) => format!(" error={e}"),
            None => {
                let top: Vec<String> = r.stop_words_found.iter().take(3).map(|w| format!("{}:{}", w.word, w.count)).collect();
                format!(" top={}", top.join(","))
            }
        };
        println!(
            "{}\t{}\tspam={}/{} ({}%)\tscore={}\tfirst_spam={}{}",
            r.domain,
            r.status,
            r.spam_snapshots,
            r.successfully_analyzed,
            r.spam_percentage,
            r.domain_spam_score,
            r.first_spam_date.as_deref().unwrap_or("-"),
            detail
        );
    }

    if let Some(output) = &args.output {
        if let Some(dir) = std::path::Path::new(output).parent() {
            fs::create_dir_all(dir).ok();
        }
        let mut out = BufWriter::new(File::create(output)?);
        for r in &results {
            serde_json::to_writer(&mut out, &OutRecord::new(r))?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        eprintln!("done: {} domains -> {}", results.len(), output);
    }
    Ok(())
}
