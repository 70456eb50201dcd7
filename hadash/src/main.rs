use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hadash::tui;
use hadash_core::types::FailoverTarget;
use hadash_core::{ClusterBackend, DashConfig, DashResult, FailoverController, HttpBackend};

#[derive(Parser)]
#[command(name = "hadash")]
#[command(about = "Terminal dashboard for a Hadoop HA cluster", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and HADASH_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive dashboard (default)
    Tui,
    /// Print the current cluster status as JSON and exit
    Status,
    /// List running YARN applications and exit
    Jobs,
    /// Trigger a failover and wait for the result
    Failover {
        /// Service to fail over: namenode (nn) or resourcemanager (rm)
        target: FailoverTarget,

        /// Skip the graceful fencing checks
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> DashResult<()> {
    let cli = Cli::parse();

    let mut config = DashConfig::load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.backend_url = url;
    }

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            // Stdout belongs to the terminal UI; stderr keeps the logs.
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    EnvFilter::new("hadash=warn,hadash_core=warn")
                }))
                .with_writer(std::io::stderr)
                .init();
            tui::run(config).await
        }
        Commands::Status => {
            init_cli_logging();
            let backend = HttpBackend::new(&config.backend_url)?;
            let snapshot = backend.get_cluster_status().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Jobs => {
            init_cli_logging();
            let backend = HttpBackend::new(&config.backend_url)?;
            let jobs = backend.list_running_jobs().await?;
            if jobs.is_empty() {
                println!("No running applications");
                return Ok(());
            }
            for job in jobs {
                println!(
                    "{}\t{}\t{}\t{}\t{:.0}%",
                    job.id, job.name, job.state, job.queue, job.progress
                );
            }
            Ok(())
        }
        Commands::Failover { target, force } => {
            init_cli_logging();
            let backend: Arc<dyn ClusterBackend> = Arc::new(HttpBackend::new(&config.backend_url)?);
            let (mut controller, mut outcomes) =
                FailoverController::new(backend, config.failover_history_capacity);
            controller.trigger(target, force)?;
            // Exactly one outcome arrives per launched command.
            let outcome = match outcomes.recv().await {
                Some(outcome) => outcome,
                None => {
                    return Err(hadash_core::DashError::Internal {
                        message: "failover task ended without reporting an outcome".to_string(),
                    })
                }
            };
            let record = controller.settle(outcome);
            if record.success {
                println!("{} failover completed", record.target);
                Ok(())
            } else {
                eprintln!(
                    "{} failover failed: {}",
                    record.target,
                    record.error_message.as_deref().unwrap_or("unknown error")
                );
                std::process::exit(1);
            }
        }
    }
}

fn init_cli_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hadash=info,hadash_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
