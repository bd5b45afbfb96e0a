//! benchplan CLI - run, resume and inspect test sessions.

mod prompt;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use benchplan_core::{Catalog, Outcome, SessionId, TestPlanId};
use benchplan_execution::{
    EngineConfig, ExecutionEngine, LauncherConfig, SessionAssistant, SessionManager, SessionState,
    Unattended, Verifier,
};
use benchplan_remote::{LocalConnector, RemoteController, RemoteSessionAssistant};
use benchplan_resource::ResourceProgram;
use benchplan_selection::{select_jobs, Qualifier, SimpleQualifier};
use benchplan_storage::{CheckpointStore, SessionRepository, StorageConfig};

use crate::prompt::Prompt;

#[derive(Parser)]
#[command(name = "benchplan")]
#[command(about = "Hardware test session runner", long_about = None)]
struct Cli {
    /// Directory holding session storage
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new session locally
    Run {
        /// Job catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Test plan to run
        #[arg(long)]
        test_plan: Option<String>,
        /// Launcher configuration (JSON)
        #[arg(long)]
        launcher: Option<PathBuf>,
        /// Stop after this many jobs
        #[arg(long)]
        max_cycles: Option<usize>,
        /// Skip jobs that need a person instead of asking
        #[arg(long)]
        unattended: bool,
    },
    /// Continue a stored session
    Resume {
        /// Session to resume
        session: String,
        /// Job catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Launcher configuration (JSON)
        #[arg(long)]
        launcher: Option<PathBuf>,
        /// Skip jobs that need a person instead of asking
        #[arg(long)]
        unattended: bool,
    },
    /// List stored sessions, youngest first
    Sessions,
    /// Remove the lock left by an interrupted checkpoint
    BreakLock {
        /// Locked session
        session: String,
    },
    /// Show which jobs a selection picks, without running anything
    Select {
        /// Job catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Regex of job ids to include (repeatable)
        #[arg(long)]
        include: Vec<String>,
        /// Regex of job ids to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Compile requirement expressions and report errors
    Check {
        /// Check every job of this catalog
        #[arg(long, conflicts_with = "expression")]
        catalog: Option<PathBuf>,
        /// Check a single requirement program
        #[arg(long)]
        expression: Option<String>,
        /// Namespace for unqualified resource names
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Drive an in-process target through the remote controller
    Control {
        /// Job catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Launcher configuration (JSON)
        #[arg(long)]
        launcher: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let storage = match cli.base_dir {
        Some(base_dir) => StorageConfig { base_dir },
        None => StorageConfig::default(),
    };
    let repository = SessionRepository::new(&storage);

    match cli.command {
        Commands::Run {
            catalog,
            test_plan,
            launcher,
            max_cycles,
            unattended,
        } => {
            let launcher = load_launcher(launcher.as_deref())?;
            let mut assistant = SessionAssistant::new(load_catalog(&catalog)?, repository);
            let plans = assistant.start_session(launcher)?;
            let plan_id = match test_plan
                .map(TestPlanId::new)
                .or_else(|| assistant.config().test_plan.clone())
            {
                Some(id) => id,
                None => match plans.as_slice() {
                    [only] => only.id.clone(),
                    [] => bail!("no test plan is available"),
                    _ => bail!(
                        "several test plans are available, pick one with --test-plan: {}",
                        plans.iter().map(|p| p.id.to_string()).collect::<Vec<_>>().join(", ")
                    ),
                },
            };

            for problem in assistant.select_test_plan(&plan_id)? {
                warn!(error = %problem, "bootstrap job dropped");
            }
            for id in assistant.get_bootstrap_todo_list()? {
                assistant.run_bootstrapping_job(&id).await?;
            }
            let run_list = assistant.finish_bootstrap()?;
            if let Some(id) = assistant.session_id() {
                println!("Session {} ({} jobs)", id, run_list.len());
            }

            let mut engine = ExecutionEngine::new(assistant)
                .with_verifier(verifier(unattended))
                .with_config(EngineConfig { max_cycles });
            let stats = engine.run().await?;
            info!("Completed {} cycles", engine.cycles());
            print_stats(&stats);
        }
        Commands::Resume {
            session,
            catalog,
            launcher,
            unattended,
        } => {
            let launcher = load_launcher(launcher.as_deref())?;
            launcher.validate()?;
            let mut assistant =
                SessionAssistant::new(load_catalog(&catalog)?, repository).with_config(launcher);
            let id = SessionId::new(session);
            if let Some(job) = assistant.resume_session(&id)? {
                println!("Job {} was running when the session stopped", job);
            }
            let mut engine = ExecutionEngine::new(assistant).with_verifier(verifier(unattended));
            let stats = engine.run().await?;
            print_stats(&stats);
        }
        Commands::Sessions => {
            let sessions = repository.list()?;
            println!("Sessions ({})", sessions.len());
            for storage in sessions {
                let meta = SessionManager::peek_metadata(&storage);
                let (title, status) = match &meta {
                    Ok(Some(meta)) if meta.is_incomplete() => {
                        (meta.title.clone().unwrap_or_default(), "INCOMPLETE")
                    }
                    Ok(Some(meta)) => (meta.title.clone().unwrap_or_default(), "DONE"),
                    Ok(None) => (String::new(), "EMPTY"),
                    Err(_) if storage.is_locked() => (String::new(), "LOCKED"),
                    Err(_) => (String::new(), "UNREADABLE"),
                };
                println!("  {} | {} | {}", storage.id(), status, title);
            }
        }
        Commands::BreakLock { session } => {
            let storage = repository.open(&SessionId::new(session))?;
            if !storage.is_locked() {
                println!("Session {} is not locked", storage.id());
                return Ok(());
            }
            storage.break_lock()?;
            println!("Lock removed from {}", storage.id());
        }
        Commands::Select {
            catalog,
            include,
            exclude,
        } => {
            let catalog = load_catalog(&catalog)?;
            let mut qualifiers: Vec<Qualifier> = Vec::new();
            for pattern in &include {
                qualifiers.push(SimpleQualifier::regex(pattern, true)?.into());
            }
            for pattern in &exclude {
                qualifiers.push(SimpleQualifier::regex(pattern, false)?.into());
            }
            let selected = select_jobs(&catalog.shared_jobs(), &qualifiers);
            println!("Selected jobs ({})", selected.len());
            for job in selected {
                println!("  {}", job.id);
            }
        }
        Commands::Check {
            catalog,
            expression,
            namespace,
        } => match (catalog, expression) {
            (Some(path), _) => {
                let state = SessionState::new(load_catalog(&path)?.shared_jobs());
                let problems = state.definition_problems();
                for problem in problems {
                    println!("  {}: {}", problem.job_id, problem.error);
                }
                if !problems.is_empty() {
                    bail!("{} job(s) have invalid requirements", problems.len());
                }
                println!("All requirements compile");
            }
            (None, Some(text)) => {
                let program = ResourceProgram::from_text(&text, namespace.as_deref(), &[])?;
                println!("Requires:");
                for id in program.required_resources() {
                    println!("  {}", id);
                }
            }
            (None, None) => bail!("nothing to check: pass --catalog or --expression"),
        },
        Commands::Control { catalog, launcher } => {
            let launcher = load_launcher(launcher.as_deref())?;
            let target = RemoteSessionAssistant::new(SessionAssistant::new(
                load_catalog(&catalog)?,
                repository,
            ));
            let mut controller = RemoteController::new(
                Box::new(LocalConnector::new(target)),
                Box::new(Prompt),
                launcher,
            );
            let interrupted = controller.interrupt_flag();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    interrupted.store(true, Ordering::SeqCst);
                }
            });
            let exit = controller.run().await?;
            println!("Controller finished: {:?}", exit);
        }
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<Arc<Catalog>> {
    let catalog = Catalog::load(path)
        .with_context(|| format!("failed to load catalog {}", path.display()))?;
    Ok(Arc::new(catalog))
}

fn load_launcher(path: Option<&Path>) -> Result<LauncherConfig> {
    match path {
        Some(path) => LauncherConfig::load(path)
            .with_context(|| format!("failed to load launcher {}", path.display())),
        None => Ok(LauncherConfig::default()),
    }
}

fn verifier(unattended: bool) -> Box<dyn Verifier> {
    if unattended {
        Box::new(Unattended)
    } else {
        Box::new(Prompt)
    }
}

fn print_stats(stats: &std::collections::BTreeMap<Outcome, usize>) {
    println!("Results");
    for (outcome, count) in stats {
        println!("  {}: {}", outcome, count);
    }
}
