use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "netmend", version, about = "Network fault troubleshooting workflow")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "netmend.yaml", env = "NETMEND_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a troubleshooting session for one alert
    Run {
        /// Alert text (usually JSON)
        #[arg(long, conflicts_with = "alert_file")]
        alert: Option<String>,

        /// Read the alert from a file
        #[arg(long)]
        alert_file: Option<PathBuf>,

        /// Session id to use instead of a generated one
        #[arg(long)]
        session_id: Option<String>,

        /// Answer approval prompts on stdin instead of suspending
        #[arg(short, long, default_value_t = false)]
        interactive: bool,
    },

    /// Resume a session waiting for approval
    Resume {
        session_id: String,

        /// Approval response, e.g. `yes` or `no`
        response: String,
    },

    /// Show the saved state of a suspended session
    Status { session_id: String },

    /// Discard a suspended session
    Reset { session_id: String },

    /// List suspended sessions
    Sessions,

    /// Run queued alerts as new sessions
    ProcessQueue {
        /// Stop when the queue is empty instead of polling
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// Start the alert ingestion HTTP service
    ServeQueue {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Check a plan file (JSON or YAML) against the step schema
    ValidatePlan {
        file: PathBuf,

        /// Fail if the plan has more steps than this
        #[arg(long)]
        max_steps: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Run {
            alert,
            alert_file,
            session_id,
            interactive,
        } => {
            let alert = commands::session::read_alert(alert, alert_file.as_deref())?;
            commands::session::run(&cli.config, &alert, session_id.as_deref(), interactive).await?
        }
        Command::Resume {
            session_id,
            response,
        } => commands::session::resume(&cli.config, &session_id, &response).await?,
        Command::Status { session_id } => commands::session::status(&cli.config, &session_id).await?,
        Command::Reset { session_id } => commands::session::reset(&cli.config, &session_id).await?,
        Command::Sessions => commands::session::list(&cli.config).await?,
        Command::ProcessQueue { once } => commands::queue::process(&cli.config, once).await?,
        Command::ServeQueue { host, port } => {
            commands::queue::serve(&cli.config, host, port).await?
        }
        Command::ValidatePlan { file, max_steps } => {
            commands::plan::validate(&file, max_steps)?
        }
    }

    Ok(())
}
