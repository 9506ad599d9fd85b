//! riskcheck-ai - media risk analysis CLI
//!
//! `analyze` runs one media file through the full pipeline on an in-memory
//! project store and prints the final report JSON. `taxonomy` prints the
//! loaded risk taxonomy.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use riskcheck_ai::config::Settings;
use riskcheck_ai::fusion::MergePolicy;
use riskcheck_ai::judge::{GeminiClient, JudgementAdapter};
use riskcheck_ai::models::NewProject;
use riskcheck_ai::taxonomy::ReferenceData;
use riskcheck_ai::types::MediaType;
use riskcheck_ai::workflow::{AnalysisPipeline, InMemoryProjectStore, PipelineConfig, ProjectStore};
use riskcheck_common::config::load_config;
use riskcheck_common::events::{log_events, EventBus};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for riskcheck-ai
#[derive(Parser, Debug)]
#[command(name = "riskcheck-ai")]
#[command(about = "Social and legal risk analysis for advertising media")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one video or image and print the final report
    Analyze {
        /// Media file to analyze
        media: PathBuf,

        /// Media kind: video or image
        #[arg(long, default_value = "video")]
        media_type: MediaType,

        /// Project title (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,

        /// Config file path
        #[arg(long, env = "RISKCHECK_CONFIG")]
        config: Option<PathBuf>,

        /// Root folder for project workspaces
        #[arg(long)]
        root_folder: Option<PathBuf>,

        /// Risk judgement runs
        #[arg(long)]
        iterations: Option<usize>,

        /// Tag merge policy: quorum or unconditional
        #[arg(long)]
        merge_policy: Option<String>,
    },

    /// Print the loaded risk taxonomy as JSON
    Taxonomy {
        /// Config file path
        #[arg(long, env = "RISKCHECK_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.command {
        Command::Analyze { config, .. } | Command::Taxonomy { config } => config.clone(),
    };
    let toml = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let level = toml.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("riskcheck_ai={0},riskcheck_common={0}", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("riskcheck-ai {}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Analyze {
            media,
            media_type,
            title,
            root_folder,
            iterations,
            merge_policy,
            ..
        } => {
            let mut settings =
                Settings::resolve(&toml, root_folder.as_deref()).context("Invalid configuration")?;
            if let Some(n) = iterations {
                if n == 0 {
                    bail!("--iterations must be at least 1");
                }
                settings.total_iterations = n;
            }
            if let Some(name) = merge_policy {
                let threshold = toml.analysis.quorum_threshold;
                settings.merge_policy =
                    MergePolicy::from_name(&name, threshold).map_err(anyhow::Error::msg)?;
            }
            analyze(&settings, media, media_type, title).await
        }
        Command::Taxonomy { .. } => {
            let settings = Settings::resolve(&toml, None).context("Invalid configuration")?;
            let reference = ReferenceData::load(&settings.references);
            println!("{}", serde_json::to_string_pretty(reference.taxonomy.tags())?);
            Ok(())
        }
    }
}

async fn analyze(
    settings: &Settings,
    media: PathBuf,
    media_type: MediaType,
    title: Option<String>,
) -> Result<()> {
    if !media.is_file() {
        bail!("Media file not found: {}", media.display());
    }

    let reference = Arc::new(ReferenceData::load(&settings.references));
    let client = GeminiClient::new(&settings.gemini).context("Failed to build Gemini client")?;
    let adapter = JudgementAdapter::new(Arc::new(client), reference);

    let store = Arc::new(InMemoryProjectStore::new());
    let title = title.unwrap_or_else(|| {
        media
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    });
    let project = store
        .create_project(NewProject {
            title,
            media_path: media,
            media_type,
            projects_dir: settings.projects_dir(),
        })
        .await?;
    info!(project_id = %project.id, workspace = %project.workspace_dir.display(), "Project created");

    let events = EventBus::new(100);
    tokio::spawn(log_events(events.subscribe()));

    let pipeline = AnalysisPipeline::new(store, adapter, PipelineConfig::from(settings), events);
    let report = pipeline
        .run(project.id)
        .await
        .context("Analysis pipeline failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
