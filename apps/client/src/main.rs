use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;

use flowforge_client::agents::AgentCatalog;
use flowforge_client::client::{RunController, StartRequest};
use flowforge_client::config::ClientConfig;
use flowforge_client::domain::run::{AgentStatus, RunState};
use flowforge_client::infrastructure::{HttpGenerationService, WebSocketEventSource};

/// Generate a website with the FlowForge agent pipeline
#[derive(Debug, Parser)]
#[command(name = "flowforge", version)]
struct Args {
    /// Description of the site to generate
    #[arg(required = true, num_args = 1..)]
    prompt: Vec<String>,

    #[arg(long)]
    business_type: Option<String>,

    #[arg(long)]
    target_audience: Option<String>,

    /// Generate authentication pages
    #[arg(long)]
    include_auth: bool,

    /// Backend base URL, overrides FLOWFORGE_BACKEND_URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Download the generated archive when the run completes
    #[arg(long)]
    download: bool,

    /// Directory for the archive, overrides FLOWFORGE_DOWNLOAD_DIR
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env().context("Failed to load configuration")?;
    if let Some(backend_url) = &args.backend_url {
        config = config.with_backend_url(backend_url)?;
    }
    if let Some(output_dir) = &args.output_dir {
        config.download_dir = output_dir.clone();
    }

    let service = HttpGenerationService::new(config.api_url.clone(), config.request_timeout)?;
    let source = WebSocketEventSource::new(config.ws_url.clone());
    let controller = RunController::new(Arc::new(service), Arc::new(source), config.stream_options());

    let mut request = StartRequest::new(args.prompt.join(" ")).include_auth(args.include_auth);
    request.business_type = args.business_type;
    request.target_audience = args.target_audience;

    let progress = tokio::spawn(report_progress(controller.subscribe(), *controller.catalog()));

    let run_id = controller.start(request).await.context("Failed to start generation")?;
    println!("Started run {}", run_id);

    let outcome = controller.wait_for_completion().await;
    progress.abort();
    controller.close().await;
    let result = outcome.context("Generation did not complete")?;

    if let Some(repo) = &result.github_repo {
        println!("Repository: {}", repo);
    }
    if let Some(url) = &result.deployment_url {
        println!("Deployment: {}", url);
    }

    if args.download {
        let path = controller
            .download_archive(&config.download_dir)
            .await
            .context("Failed to download archive")?;
        println!("Archive saved to {}", path.display());
    }

    Ok(())
}

/// Logs phase transitions and agent completions until the sender goes away
async fn report_progress(mut updates: watch::Receiver<Arc<RunState>>, catalog: AgentCatalog) {
    let mut previous = updates.borrow_and_update().clone();

    while updates.changed().await.is_ok() {
        let current = updates.borrow_and_update().clone();

        if current.current_phase() != previous.current_phase() {
            tracing::info!(
                "Phase: {} ({}%)",
                current.current_phase(),
                current.overall_progress()
            );
        }

        for (agent_id, agent) in current.agents() {
            let was_complete = previous
                .agent(agent_id)
                .is_some_and(|before| before.status == AgentStatus::Complete);
            if agent.status == AgentStatus::Complete && !was_complete {
                let name = catalog.get(agent_id).map_or(agent_id, |d| d.display_name);
                tracing::info!("Completed: {}", name);
            }
        }

        previous = current;
    }
}
