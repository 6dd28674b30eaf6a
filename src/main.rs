use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use getcurcur::cli::show::OutputFormat;
use getcurcur::core::log::init_logging;
use getcurcur::core::rate::RateSide;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for getcurcur::AppCommand {
    fn from(cmd: Commands) -> getcurcur::AppCommand {
        match cmd {
            Commands::Show {
                bank,
                currency,
                format,
                no_cache,
            } => getcurcur::AppCommand::Show {
                banks: bank,
                currency,
                format,
                no_cache,
            },
            Commands::Convert {
                amount,
                from,
                to,
                bank,
                side,
            } => getcurcur::AppCommand::Convert {
                amount,
                from,
                to,
                bank,
                side,
            },
            Commands::ListProviders => getcurcur::AppCommand::ListProviders,
            Commands::ClearCache { bank } => getcurcur::AppCommand::ClearCache { bank },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display current exchange rates
    Show {
        /// Bank provider (e.g. 'hana', 'korea.hana' or 'all'); repeatable
        #[arg(short, long)]
        bank: Vec<String>,
        /// Only show this currency code (e.g. USD)
        #[arg(short, long)]
        currency: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Ignore cached rates and fetch fresh data
        #[arg(long)]
        no_cache: bool,
    },
    /// Convert an amount using current exchange rates
    Convert {
        /// Amount to convert
        amount: Decimal,
        /// Source currency code (e.g. USD)
        from: String,
        /// Target currency code
        #[arg(short, long, default_value = "KRW")]
        to: String,
        /// Bank provider
        #[arg(short, long)]
        bank: Option<String>,
        /// Transaction type: buy or sell
        #[arg(long = "type", default_value = "buy")]
        side: RateSide,
    },
    /// List available exchange rate providers
    ListProviders,
    /// Clear cached exchange rates
    ClearCache {
        /// Only clear this provider's entry
        #[arg(short, long)]
        bank: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => getcurcur::cli::setup::setup(),
        Some(cmd) => getcurcur::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
