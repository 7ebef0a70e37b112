use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxnotify::core::log::init_logging;
use fxnotify::AppCommand;
use fxnotify::cli::user::UserCommand;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Send daily rate notifications until interrupted
    Run,
    /// Show current rates, for the standard currencies when none are given
    Rate { currencies: Vec<String> },
    /// Resolve a city to coordinates and UTC offset
    Resolve { city: String },
    /// Inspect or change a subscriber's settings
    User {
        #[arg(allow_negative_numbers = true)]
        user_id: i64,
        #[command(subcommand)]
        action: UserCommand,
    },
}

impl TryFrom<Commands> for AppCommand {
    type Error = anyhow::Error;

    fn try_from(cmd: Commands) -> Result<AppCommand> {
        Ok(match cmd {
            Commands::Run => AppCommand::Run,
            Commands::Rate { currencies } => AppCommand::Rate { currencies },
            Commands::Resolve { city } => AppCommand::Resolve { city },
            Commands::User { user_id, action } => AppCommand::User {
                user_id,
                action: action.into(),
            },
            Commands::Setup => anyhow::bail!("Setup command should be handled separately"),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else if matches!(cli.command, Some(Commands::Run)) {
        LevelFilter::INFO
    } else {
        LevelFilter::OFF
    };
    init_logging(level);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => fxnotify::cli::setup::setup_at_path(path),
            None => fxnotify::cli::setup::setup(),
        },
        Some(cmd) => match AppCommand::try_from(cmd) {
            Ok(command) => fxnotify::run_command(command, cli.config_path.as_deref()).await,
            Err(e) => Err(e),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
