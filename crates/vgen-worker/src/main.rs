//! Narrated video worker binary.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_media::{check_ffmpeg, check_ffprobe, FfmpegBackend, HttpClipFetcher};
use vgen_models::{JobState, ProgressMessage};
use vgen_templates::{suggest_templates, TemplateStore};
use vgen_worker::{ChannelProgress, JobExecutor, JobManifest, RenderPipeline, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "vgen-worker", version, about = "Render narrated videos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render one job described by a manifest file
    Render {
        #[arg(long)]
        manifest: PathBuf,
        /// Override the manifest's output path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Override the manifest's template
        #[arg(long)]
        template: Option<String>,
    },
    /// List templates, or rank them for a topic
    Templates {
        #[arg(long)]
        suggest: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check that ffmpeg and ffprobe are installed
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();

    match cli.command {
        Command::Render {
            manifest,
            output,
            template,
        } => render(config, manifest, output, template).await,
        Command::Templates { suggest, json } => templates(&config, suggest, json),
        Command::Check => {
            let ffmpeg = check_ffmpeg()?;
            let ffprobe = check_ffprobe()?;
            println!("ffmpeg:  {}", ffmpeg.display());
            println!("ffprobe: {}", ffprobe.display());
            Ok(())
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("vgen_worker=info".parse()?)
        .add_directive("vgen_media=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn load_templates(config: &WorkerConfig) -> anyhow::Result<TemplateStore> {
    let store = match &config.assets_dir {
        Some(root) => TemplateStore::new().with_asset_root(root),
        None => TemplateStore::new(),
    };
    store
        .load_from(&config.templates_dir)
        .with_context(|| format!("loading templates from {}", config.templates_dir.display()))
}

async fn render(
    config: WorkerConfig,
    manifest_path: PathBuf,
    output: Option<PathBuf>,
    template: Option<String>,
) -> anyhow::Result<()> {
    check_ffmpeg()?;
    check_ffprobe()?;

    let manifest = JobManifest::load(&manifest_path)?;
    let mut job = manifest.job();
    if output.is_some() {
        job.output_path = output;
    }
    if template.is_some() {
        job.template_id = template;
    }

    let templates = Arc::new(load_templates(&config)?);
    info!(templates = templates.len(), "Worker config: {:?}", config);

    let backend = Arc::new(FfmpegBackend::new(config.render_config()));
    let fetcher = Arc::new(HttpClipFetcher::new(config.fetch_timeout)?);
    let pipeline =
        RenderPipeline::new(manifest.collaborators(), templates, backend, fetcher, &config);

    let (progress, mut events) = ChannelProgress::new(64);
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event.message {
                ProgressMessage::Milestone { milestone, percent } => {
                    info!(job_id = %event.job_id, percent, "Reached {}", milestone.as_str())
                }
                ProgressMessage::Log { message } => info!(job_id = %event.job_id, "{}", message),
                ProgressMessage::Failed { reason } => {
                    warn!(job_id = %event.job_id, "Failed: {}", reason)
                }
                ProgressMessage::Done { output } => {
                    info!(job_id = %event.job_id, output = %output.display(), "Done")
                }
            }
        }
    });

    let executor = Arc::new(JobExecutor::new(config, Arc::new(pipeline), Arc::new(progress)));

    let signal_executor = Arc::clone(&executor);
    let signals = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    let job = executor.execute(job).await?;
    signals.abort();
    let _ = signals.await;
    if !executor.wait_for_jobs().await {
        warn!("Timed out waiting for jobs to finish");
    }
    drop(executor);
    reporter.await.ok();

    println!("{}", serde_json::to_string_pretty(&job)?);
    if job.state != JobState::Completed {
        error!(job_id = %job.id, "Job did not complete");
        bail!(job.error.unwrap_or_else(|| "job failed".to_string()));
    }
    Ok(())
}

fn templates(config: &WorkerConfig, suggest: Option<String>, json: bool) -> anyhow::Result<()> {
    let store = load_templates(config)?;

    match suggest {
        Some(topic) => {
            let suggestions = suggest_templates(&store, &topic);
            if json {
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
            } else if suggestions.is_empty() {
                println!("No template matches {:?}", topic);
            } else {
                for (i, s) in suggestions.iter().enumerate() {
                    println!(
                        "{}. {} [{}] score {}{}",
                        i + 1,
                        s.name,
                        s.template_id,
                        s.score,
                        if s.assets_ready { "" } else { " (assets missing)" }
                    );
                    for reason in &s.reasons {
                        println!("   - {}", reason);
                    }
                }
            }
        }
        None => {
            let list = store.list();
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for t in &list {
                    println!("{} (v{}) - {}", t.name, t.version, t.id);
                    if !t.description.is_empty() {
                        println!("   {}", t.description);
                    }
                }
            }
        }
    }
    Ok(())
}
