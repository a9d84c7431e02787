//! survey-intake: run the submission pipeline from the command line.
//!
//! `reconcile` performs one run of the recurring reconcile job and prints its
//! outcome; `process` pushes a single submission through the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use survey_intake::config::ENV_PREFIX;
use survey_intake::dedup::{DedupStore, InMemoryDedupStore};
use survey_intake::job::LAST_PROCESSED_SUBMISSION_ID_KEY;
use survey_intake::{
    IntakeConfig, JobOutcome, ReconcileJob, Reconciler, RecurringJobProcessor, Services,
    SubmissionProcessor,
};
use tokio_util::sync::CancellationToken;

/// Idempotent survey submission intake
#[derive(Parser)]
#[command(name = "survey-intake")]
#[command(about = "Process eligibility survey submissions", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file; SURVEY_INTAKE_* variables override it
    #[arg(long, global = true, env = "SURVEY_INTAKE_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct StoreArgs {
    /// Redis URL for processed markers
    #[cfg(feature = "redis")]
    #[arg(long, global = true, env = "SURVEY_INTAKE_REDIS_URL")]
    redis_url: Option<String>,

    /// DynamoDB table for processed markers
    #[cfg(feature = "dynamodb")]
    #[arg(long, global = true, env = "SURVEY_INTAKE_DYNAMODB_TABLE")]
    dynamodb_table: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass over a form's submissions
    Reconcile {
        /// Form to reconcile
        #[arg(long)]
        form_id: String,

        /// Resume after this submission id (defaults to the beginning)
        #[arg(long, default_value = "")]
        after: String,
    },

    /// Process a single submission by id
    Process {
        /// Submission to process
        #[arg(long)]
        submission_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    survey_intake::logging::init_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => IntakeConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => IntakeConfig::default(),
    };
    config.apply_env(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok());

    let markers = open_store(&cli.store).await?;
    let services = Services::from_config(&config, markers)?;
    let processor = Arc::new(SubmissionProcessor::new(
        services.clone(),
        config.survey.clone(),
    ));

    let ctx = CancellationToken::new();
    tokio::spawn({
        let ctx = ctx.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                ctx.cancel();
            }
        }
    });

    match cli.command {
        Commands::Reconcile { form_id, after } => {
            let reconciler = Arc::new(Reconciler::new(
                services.submissions.clone(),
                processor,
                config.reconcile.clone(),
            ));
            let job_processor = ReconcileJob::new(reconciler, config.job.clone());
            let mut job = job_processor.new_job(&form_id);
            job.metadata.insert(
                LAST_PROCESSED_SUBMISSION_ID_KEY.to_string(),
                Value::String(after),
            );

            let outcome = job_processor.process(&ctx, &job).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            match outcome {
                JobOutcome::Success { .. } => Ok(()),
                JobOutcome::Failing { error, .. } => bail!("reconciliation failing: {error}"),
                JobOutcome::Failed { error } => bail!("reconciliation failed: {error}"),
            }
        },
        Commands::Process { submission_id } => {
            let outcome = processor.process_by_id(&ctx, &submission_id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        },
    }
}

#[allow(unused_variables)]
async fn open_store(args: &StoreArgs) -> Result<Arc<dyn DedupStore>> {
    #[cfg(feature = "redis")]
    if let Some(url) = &args.redis_url {
        let backend = survey_intake::dedup::RedisBackend::new(url)
            .await
            .context("connecting to redis")?;
        return Ok(Arc::new(survey_intake::dedup::GenericDedupStore::new(backend)));
    }

    #[cfg(feature = "dynamodb")]
    if let Some(table) = &args.dynamodb_table {
        let backend = survey_intake::dedup::DynamoDbBackend::from_env_with_table(table).await;
        return Ok(Arc::new(survey_intake::dedup::GenericDedupStore::new(backend)));
    }

    tracing::warn!("no persistent marker store configured; using in-memory markers");
    Ok(Arc::new(InMemoryDedupStore::in_memory()))
}
