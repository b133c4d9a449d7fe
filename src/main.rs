//! `telefonistka-controller` binary: a `clap`-derived CLI mirroring the
//! original's `cobra` command tree —
//! `server` (long-running webhook listener), `event` (one-shot, reads a
//! JSON event file from disk — the GitHub Actions use case), and the
//! `bump-*` single-file promotion commands. All subcommands share the
//! same dispatcher/synthesizer entry points; only the transport differs.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "telefonistka", version, about = "GitOps promotion controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook listener (POST /webhook, GET /metrics, /live, /ready).
    Server,

    /// Process a single already-captured webhook event from a JSON file
    /// (the GitHub Actions `workflow_dispatch` use case).
    Event {
        #[arg(long = "type")]
        event_type: String,
        #[arg(long)]
        file: PathBuf,
    },

    /// Overwrite a target file's content wholesale and open a promotion PR.
    BumpOverwrite(BumpOverwriteArgs),

    /// Apply one regex replacement to a target file and open a promotion PR.
    BumpRegex(BumpRegexArgs),

    /// Set one dot-addressed field in a target YAML file and open a promotion PR.
    BumpYaml(BumpYamlArgs),
}

#[derive(Parser, Debug)]
struct BumpCommon {
    #[arg(long)]
    target_repo: String,
    #[arg(long)]
    target_file: String,
    #[arg(long)]
    triggering_repo: String,
    #[arg(long)]
    triggering_repo_sha: String,
    #[arg(long)]
    triggering_actor: String,
    #[arg(long)]
    auto_merge: bool,
}

#[derive(Parser, Debug)]
struct BumpOverwriteArgs {
    #[command(flatten)]
    common: BumpCommon,
    /// Path to a file whose contents become the new target-file content.
    #[arg(long)]
    content_file: PathBuf,
}

#[derive(Parser, Debug)]
struct BumpRegexArgs {
    #[command(flatten)]
    common: BumpCommon,
    #[arg(long)]
    pattern: String,
    #[arg(long)]
    replacement: String,
}

#[derive(Parser, Debug)]
struct BumpYamlArgs {
    #[command(flatten)]
    common: BumpCommon,
    /// Dot-addressed field, e.g. `image.tag`.
    #[arg(long)]
    address: String,
    #[arg(long)]
    value: String,
}

impl From<BumpCommon> for bumpversion::BumpRequest {
    fn from(c: BumpCommon) -> Self {
        bumpversion::BumpRequest {
            target_repo: c.target_repo,
            target_file: c.target_file,
            triggering_repo: c.triggering_repo,
            triggering_repo_sha: c.triggering_repo_sha,
            triggering_actor: c.triggering_actor,
            auto_merge: c.auto_merge,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A local `.env` is optional (CI/production set real env vars); a
    // missing file is not an error here, unlike a missing required var.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server => run_server().await,
        Commands::Event { event_type, file } => run_event(event_type, file).await,
        Commands::BumpOverwrite(args) => run_bump_overwrite(args).await,
        Commands::BumpRegex(args) => run_bump_regex(args).await,
        Commands::BumpYaml(args) => run_bump_yaml(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "telefonistka exited with an error");
            // A missing required env var is an unrecoverable boot error -> 3.
            let is_missing_env = err.downcast_ref::<api::core::app_state::ConfigError>().is_some()
                || matches!(
                    err.downcast_ref::<api::AppError>(),
                    Some(api::AppError::Config(_))
                );
            if is_missing_env {
                ExitCode::from(3)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run_server() -> anyhow::Result<()> {
    api::start().await?;
    Ok(())
}

async fn run_event(event_type: String, file: PathBuf) -> anyhow::Result<()> {
    let body = std::fs::read(&file)?;
    let event = webhook_dispatch::parse_event(&event_type, &body)?;

    let config = api::AppConfig::from_env()?;
    let argocd: Arc<dyn argocd_diff::ArgoCdClient> = Arc::new(argocd_diff::HttpArgoCdClient::from_env()?);
    let forwarding_http = reqwest::Client::new();
    let ctx = Arc::new(webhook_dispatch::AppContext::new(
        argocd,
        forwarding_http,
        config.webhook_secret.into_bytes(),
    ));

    webhook_dispatch::process_event_for_test(ctx, event).await?;
    Ok(())
}

async fn run_bump_overwrite(args: BumpOverwriteArgs) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.content_file)?;
    let outcome = bumpversion::bump_overwrite(args.common.into(), content).await?;
    report_bump_outcome(&outcome);
    Ok(())
}

async fn run_bump_regex(args: BumpRegexArgs) -> anyhow::Result<()> {
    let outcome =
        bumpversion::bump_regex(args.common.into(), &args.pattern, &args.replacement).await?;
    report_bump_outcome(&outcome);
    Ok(())
}

async fn run_bump_yaml(args: BumpYamlArgs) -> anyhow::Result<()> {
    let outcome = bumpversion::bump_yaml(args.common.into(), &args.address, &args.value).await?;
    report_bump_outcome(&outcome);
    Ok(())
}

fn report_bump_outcome(outcome: &bumpversion::BumpOutcome) {
    tracing::info!(
        pr = outcome.pr_number,
        url = %outcome.pr_url,
        branch = %outcome.branch_name,
        "bump promotion pr opened"
    );
}
