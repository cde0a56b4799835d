// video_search_prep - batch pipeline for video search documents
// Runs one stage (or all four in order) with configuration from the environment

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use video_search_prep::config::{
    self, AnalysisSettings, DocumentSettings, EmbeddingSettings, Env,
};
use video_search_prep::inference::BedrockInference;
use video_search_prep::storage::S3ObjectStore;
use video_search_prep::{
    AnalysisGenerator, BatchSummary, DocumentAssembler, EmbeddingGenerator, FfmpegGrabber,
    KeyframeConfig, KeyframeExtractor,
};

#[derive(Parser)]
#[command(
    name = "video_search_prep",
    version,
    about = "Prepare search documents from videos in S3"
)]
struct Args {
    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Extract one keyframe per local video with ffmpeg
    Keyframes,
    /// Generate vector embeddings with async Bedrock jobs
    Embeddings,
    /// Generate title, summary and keywords per video
    Analyses,
    /// Join embeddings and analyses into search documents
    Documents,
    /// Run all four stages in order
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let env = Env::load();

    // First Ctrl-C stops the running stage before its next item (or wakes an
    // in-flight poll); a second one exits immediately.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after the current item");
        let _ = cancel_tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });

    let stages: &[Stage] = match args.stage {
        Stage::All => &[Stage::Keyframes, Stage::Embeddings, Stage::Analyses, Stage::Documents],
        ref one => std::slice::from_ref(one),
    };

    let mut failed = false;
    for stage in stages {
        let summary = run_stage(*stage, &env, cancel_rx.clone()).await?;
        failed |= summary.has_failures();
    }

    if failed {
        anyhow::bail!("One or more videos failed; see log for details");
    }
    info!("Pipeline completed successfully");
    Ok(())
}

async fn run_stage(
    stage: Stage,
    env: &Env,
    cancel: watch::Receiver<bool>,
) -> Result<BatchSummary> {
    match stage {
        Stage::Keyframes => {
            let extractor =
                KeyframeExtractor::new(KeyframeConfig::default(), FfmpegGrabber::default())
                    .with_cancel(cancel);
            tokio::task::spawn_blocking(move || extractor.run())
                .await
                .context("Keyframe task panicked")?
                .context("Keyframe extraction failed")
        }
        Stage::Embeddings => {
            let settings = EmbeddingSettings::from_env(env).context("Embedding configuration")?;
            let owner = config::bucket_owner(env).context("Embedding configuration")?;
            let storage = Arc::new(S3ObjectStore::from_region(&settings.target.region).await);
            let inference = Arc::new(BedrockInference::from_region(&settings.target.region).await);

            EmbeddingGenerator::new(settings, owner, storage, inference)
                .with_cancel(cancel)
                .run()
                .await
                .context("Embedding generation failed")
        }
        Stage::Analyses => {
            let settings = AnalysisSettings::from_env(env).context("Analysis configuration")?;
            let owner = config::bucket_owner(env).context("Analysis configuration")?;
            let storage = Arc::new(S3ObjectStore::from_region(&settings.target.region).await);
            let inference = Arc::new(BedrockInference::from_region(&settings.target.region).await);

            AnalysisGenerator::new(settings, owner, storage, inference)
                .with_cancel(cancel)
                .run()
                .await
                .context("Analysis generation failed")
        }
        Stage::Documents => DocumentAssembler::new(DocumentSettings::default())
            .with_cancel(cancel)
            .run()
            .await
            .context("Document assembly failed"),
        Stage::All => anyhow::bail!("`all` is expanded into its stages before dispatch"),
    }
}
