//! 🚀 logship-cli: the front door, the bouncer, the maitre d' of logship.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Thin wrapper: set up logging, parse args, load config, then let the library do
//! the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use logship::{S3ObjectCreatedEvent, Trigger};

/// 🚚 Ship ALB access logs from S3 to CloudWatch Logs.
///
/// Destination and field selection come from the environment (LOG_GROUP_NAME,
/// LOG_STREAM_NAME, FIELDS, REGION, LOGSHIP_*) and an optional TOML file.
/// To handle a Lambda-style S3 notification, pipe its payload in with `--event -`.
#[derive(Debug, Parser)]
#[command(name = "logship", version)]
#[command(group(ArgGroup::new("trigger").required(true).args(["url", "event"])))]
struct Cli {
    /// s3://bucket/prefix to list and ship everything under
    #[arg(value_name = "S3_URL")]
    url: Option<String>,

    /// S3 event notification JSON to ship the objects of, or '-' for stdin (a Lambda payload works as-is)
    #[arg(long, value_name = "FILE")]
    event: Option<String>,

    /// TOML config file, layered over the environment
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Parse and batch everything, send nothing
    #[arg(long)]
    dry_run: bool,
}

/// 📬 Read the notification from a file, or from stdin when the path is `-`.
async fn read_event(source: &str) -> Result<S3ObjectCreatedEvent> {
    let the_json = if source == "-" {
        let mut the_buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut the_buffer)
            .await
            .context("💀 failed to read the event from stdin")?;
        the_buffer
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("💀 failed to read the event file '{}'", source))?
    };
    serde_json::from_str(&the_json).context("💀 the event is not a valid S3 notification")
}

/// 🎯 Exactly one of URL or event, clap already made sure of that.
async fn trigger_from(cli: &Cli) -> Result<Trigger> {
    match (&cli.url, &cli.event) {
        (Some(url), _) => Ok(Trigger::Url(url.clone())),
        (None, Some(source)) => Ok(Trigger::Event(read_event(source).await?)),
        (None, None) => anyhow::bail!("💀 give me an S3 URL or --event, I can't ship nothing"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut app_config = logship::app_config::load_config(cli.config.as_deref())
        .context("💀 In logship-cli, main, we couldn't load the configuration. Check the environment and the config file.")?;
    app_config.dry_run |= cli.dry_run;

    let the_trigger = trigger_from(&cli).await?;
    let the_summary = logship::run(app_config, the_trigger).await?;

    info!(
        "✅ shipped {} entries from {} objects",
        the_summary.total_entries(),
        the_summary.object_count()
    );
    println!("{}", the_summary.to_table());
    Ok(())
}

/// 🚀 main(): where it all begins. The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }
        std::process::exit(1);
    }
}
