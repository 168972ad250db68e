use anyhow::Result;
use clap::{Parser, Subcommand};
use ledgerdesk_ingest::Extractor;
use std::path::PathBuf;

mod app;
mod config;
mod logging;
mod state;
mod statement_cmd;
mod tasks_cmd;
mod watcher;

#[derive(Parser, Debug)]
#[command(
    name = "ledgerdesk",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("LEDGERDESK_BUILD_SHA"), ")"),
    about = "Bank statement ingestion and advisory tasks"
)]
struct Cli {
    /// Log level or filter directive (overrides [logging].level; RUST_LOG wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract and parse a statement PDF without storing anything
    Parse {
        pdf: PathBuf,

        /// Print the parse result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also write transactions to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// auto | content-stream | library (default from config)
        #[arg(long)]
        extractor: Option<Extractor>,
    },

    /// Parse already-extracted statement text
    ParseText {
        txt: PathBuf,

        #[arg(long, default_value_t = false)]
        json: bool,

        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Parse, store and record a statement for a bank account
    Upload {
        pdf: PathBuf,

        /// Bank account identifier the statement belongs to
        #[arg(long)]
        account: String,

        /// Account currency (default: [statement].default_currency)
        #[arg(long)]
        currency: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List recorded uploads
    Uploads {
        #[arg(long)]
        account: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the recorded lines of one upload
    Lines {
        upload_id: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Advisory tasks
    Tasks {
        #[command(subcommand)]
        command: tasks_cmd::TasksCommand,
    },

    /// Config file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default ~/.ledgerdesk/config.toml
    Init,

    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    let level = cli.log_level.as_deref().unwrap_or(cfg.logging.level.as_str());
    logging::setup_logging(level, cfg.logging.json)?;

    match cli.command {
        Command::Parse {
            pdf,
            json,
            csv,
            extractor,
        } => statement_cmd::parse(&cfg, &pdf, json, csv, extractor)?,

        Command::ParseText { txt, json, csv } => statement_cmd::parse_text(&cfg, &txt, json, csv)?,

        Command::Upload {
            pdf,
            account,
            currency,
            json,
        } => statement_cmd::upload(&cfg, &pdf, &account, currency, json)?,

        Command::Uploads { account, json } => statement_cmd::uploads(&cfg, account.as_deref(), json)?,

        Command::Lines { upload_id, json } => statement_cmd::lines(&cfg, &upload_id, json)?,

        Command::Tasks { command } => tasks_cmd::run(&cfg, command).await?,

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg)?);
            }
        },
    }

    Ok(())
}
