use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lookforge::pipeline::PipelineError;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "lookforge")]
#[command(about = "Session-based e-commerce photo generation", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/lookforge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a session: detail, retouch or clothing-detail
    New { session_type: String },

    /// List sessions, newest first
    List {
        #[arg(long = "type")]
        session_type: Option<String>,
    },

    /// Print a session's status
    Show { id: String },

    /// Delete a session and its files
    Delete { id: String },

    /// Upload images.
    ///
    /// Swap sessions take `subject` or `material`. Detail sessions take
    /// `model-front`, `model-back`, `group-front`, `group-back` (with
    /// --group) or `section`.
    Upload {
        id: String,
        role: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value = "detail")]
        section_type: String,
    },

    /// Generate every pending result (detail sessions: page sections)
    Generate {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Generate model photos for every pending garment group
    GenerateModels {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Re-run one subject or section
    Regenerate {
        id: String,
        index: u32,
        #[arg(long)]
        adjust: Option<String>,
    },

    /// Re-run one side of one garment group
    RegenerateModel {
        id: String,
        group: String,
        side: String,
        #[arg(long)]
        adjust: Option<String>,
    },

    /// Delete one reference (detail sessions: role `section`)
    DeleteRef { id: String, role: String, index: u32 },

    /// Remove a garment group and its model photos
    RemoveGroup { id: String, group: String },

    /// Stitch generated sections into the final detail page
    Stitch { id: String },
}

impl Commands {
    /// Commands that call the image API.
    fn generates(&self) -> bool {
        matches!(
            self,
            Commands::Generate { .. }
                | Commands::GenerateModels { .. }
                | Commands::Regenerate { .. }
                | Commands::RegenerateModel { .. }
        )
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // Bridge `log` records. Errors when the subscriber already did.
    let _ = tracing_log::LogTracer::init();
}

/// 2 when the request itself was wrong (bad index, unmet precondition),
/// 1 for everything else.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(e) if e.is_user_error() => 2,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app = commands::App::build(cli.config.as_deref(), cli.command.generates())?;
    let output = app.run(cli.command).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_separates_user_errors() {
        let user = anyhow::Error::new(PipelineError::NothingPending("all subjects done".into()));
        assert_eq!(exit_status(&user), 2);

        let wrapped = anyhow::Error::new(PipelineError::UnknownGroup("red".into()))
            .context("regenerate-model failed");
        assert_eq!(exit_status(&wrapped), 2);

        let internal = anyhow::Error::new(PipelineError::Task("join failed".into()));
        assert_eq!(exit_status(&internal), 1);

        assert_eq!(exit_status(&anyhow::anyhow!("bad role")), 1);
    }
}
