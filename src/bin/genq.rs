//! genq CLI: operator interface to the generation queue.

use clap::{Parser, Subcommand};
use genq::config::Config;
use genq::generator::HttpImageGenerator;
use genq::model::{GenerationRequest, QueueItem};
use genq::queue::{QueueManager, TokioClock, plan};
use genq::telemetry::{TelemetryConfig, init_telemetry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "genq", about = "Throttled image-generation queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Push every job in a JSON-lines file through the queue
    Run {
        /// File with one job object per line
        file: PathBuf,
        /// Override GENQ_CONCURRENCY
        #[arg(long)]
        concurrency: Option<usize>,
        /// Override GENQ_COOLDOWN_MS
        #[arg(long)]
        cooldown_ms: Option<u64>,
    },
    /// Print the drain order for a jobs file without generating anything
    Plan {
        /// File with one job object per line
        file: PathBuf,
    },
}

/// One line of a jobs file.
#[derive(Debug, Deserialize)]
struct Job {
    subject_id: String,
    #[serde(default)]
    text_content: String,
    area: String,
    #[serde(default)]
    topic: String,
    dataset: String,
}

impl From<Job> for QueueItem {
    fn from(job: Job) -> Self {
        QueueItem::new(GenerationRequest {
            subject_id: job.subject_id,
            text_content: job.text_content,
            area_label: job.area,
            topic_label: job.topic,
            dataset_name: job.dataset,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            file,
            concurrency,
            cooldown_ms,
        } => cmd_run(&file, concurrency, cooldown_ms).await,
        Command::Plan { file } => cmd_plan(&file),
    }
}

fn read_jobs(path: &Path) -> anyhow::Result<Vec<Job>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| anyhow::anyhow!("{}:{}: {e}", path.display(), n + 1))
        })
        .collect()
}

async fn cmd_run(
    file: &Path,
    concurrency: Option<usize>,
    cooldown_ms: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(n) = concurrency {
        config.queue.concurrency = n;
    }
    if let Some(ms) = cooldown_ms {
        config.queue.cooldown = Duration::from_millis(ms);
    }

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "genq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let jobs = read_jobs(file)?;
    let generator = HttpImageGenerator::new(
        &config.generator_url,
        config.api_key.clone(),
        config.request_timeout,
    )?;
    let manager = QueueManager::new(Arc::new(generator), Arc::new(TokioClock), config.queue)?;

    let mut items = manager.subscribe_items();
    let total = jobs.len();
    for job in jobs {
        manager.enqueue(job.into());
    }
    println!("Submitted {total} job(s)");

    let (mut succeeded, mut failed) = (0usize, 0usize);
    let mut interrupted = false;
    let idle = manager.wait_until_idle();
    tokio::pin!(idle);

    loop {
        tokio::select! {
            biased;
            event = items.recv() => match event {
                Ok(done) => {
                    if done.success {
                        succeeded += 1;
                        println!("ok    {:<24} {}", done.item.id, done.item.area);
                    } else {
                        failed += 1;
                        println!(
                            "FAIL  {:<24} {}  {}",
                            done.item.id,
                            done.item.area,
                            done.error_message.as_deref().unwrap_or("-")
                        );
                    }
                }
                Err(RecvError::Lagged(n)) => eprintln!("(missed {n} completion events)"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                eprintln!("Interrupted: finishing the in-flight batch, then stopping");
                manager.pause();
            }
            _ = &mut idle => break,
        }
    }
    while let Ok(done) = items.try_recv() {
        if done.success {
            succeeded += 1;
        } else {
            failed += 1;
        }
    }

    let status = manager.status();
    println!(
        "\n{succeeded} succeeded, {failed} failed, {} left pending{}",
        status.pending_count,
        if status.state.is_paused() { " (paused)" } else { "" }
    );
    guard.force_flush();
    Ok(())
}

fn cmd_plan(file: &Path) -> anyhow::Result<()> {
    let order = plan(read_jobs(file)?.into_iter().map(QueueItem::from));

    if order.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!("{:<5}  {:<4}  {:<24}  AREA", "#", "TIER", "SUBJECT");
    println!("{}", "-".repeat(60));
    for (i, item) in order.iter().enumerate() {
        println!("{:<5}  {:<4}  {:<24}  {}", i + 1, item.tier, item.id, item.area);
    }
    println!("\n{} job(s)", order.len());
    Ok(())
}
