use anyhow::Result;
use caretforge::cli::{self, RunOptions};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caretforge")]
#[command(about = "Bring-your-own-model interactive coding agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Task words for the implicit one-shot form (`caretforge fix the bug`).
    /// Ignored when a subcommand is given.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    task: Vec<String>,

    /// Provider name from the config file's `providers` map.
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model id, overriding the provider's `defaultModel`.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Force streaming off even though it defaults to on.
    #[arg(long = "no-stream", global = true)]
    no_stream: bool,

    /// Accepted for symmetry with `--no-stream`; streaming is already the
    /// default.
    #[arg(long = "stream", global = true, conflicts_with = "no_stream")]
    stream: bool,

    /// Emit the turn result as a single JSON object instead of streaming text.
    #[arg(long, global = true)]
    json: bool,

    /// Raise the log level to debug.
    #[arg(long, global = true)]
    trace: bool,

    /// Skip the shell-command permission prompt for this process.
    #[arg(long, global = true)]
    allow_shell: bool,

    /// Skip the write/edit permission prompt for this process.
    #[arg(long, global = true)]
    allow_write: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive REPL.
    Chat,

    /// Run a single task without the REPL.
    Run {
        /// Task words; reads stdin if none are given.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        task: Vec<String>,
    },

    /// Inspect available models.
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },

    /// Manage the on-disk configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Check the environment and configuration for common problems.
    Doctor,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List the models the current (or given) provider advertises.
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a starter config file if one doesn't already exist.
    Init {
        /// Include a commented example with a literal (non-{env:}) key.
        #[arg(long)]
        with_secrets: bool,
    },
    /// Print the effective merged configuration, secrets redacted.
    Show {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let opts = RunOptions {
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        stream: !cli.no_stream,
        json: cli.json,
        allow_shell: cli.allow_shell,
        allow_write: cli.allow_write,
    };

    let result = match cli.command {
        Some(Commands::Chat) => cli::repl::execute(opts).await,
        Some(Commands::Run { task }) => cli::run::execute(task, opts).await,
        Some(Commands::Model { action }) => match action {
            ModelCommands::List => cli::model::list(opts.provider.as_deref()).await,
        },
        Some(Commands::Config { action }) => match action {
            ConfigCommands::Init { with_secrets } => cli::config_cmd::init(with_secrets).await,
            ConfigCommands::Show { json } => cli::config_cmd::show(json).await,
        },
        Some(Commands::Doctor) => {
            let all_ok = cli::doctor::run().await?;
            if !all_ok {
                std::process::exit(1);
            }
            Ok(())
        }
        None if cli.task.is_empty() => cli::repl::execute(opts).await,
        None => cli::run::execute(cli.task, opts).await,
    };

    if let Err(e) = &result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
