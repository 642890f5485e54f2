//! Radar CLI - traffic-infraction record lookups from the terminal.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use radar_core::SearchType;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod exit_codes;
mod output;
mod remote;

use commands::lookup::LookupArgs;
use exit_codes::ExitCode;
use remote::HistoryParams;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error or invalid input
  65  Lookup failed (record not found, rejected by provider)
  69  Provider, server or webhook endpoint unavailable
  75  Still processing (wait limit reached, retry later)";

#[derive(Parser)]
#[command(name = "radar")]
#[command(author, version, about = "Traffic-infraction record lookups", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress everything but errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a plate, RENAVAM, CNH, CPF or a vehicle's fines
    Lookup {
        /// plate, renavam, cnh, driver_cpf or vehicle_fines
        #[arg(value_name = "TYPE", value_parser = parse_search_type)]
        search_type: SearchType,

        /// Plate, document number or license number
        #[arg(value_name = "QUERY")]
        query: String,

        /// Holder's birth date, required for CNH lookups (YYYY-MM-DD or DD/MM/YYYY)
        #[arg(long)]
        birth_date: Option<String>,

        /// RENAVAM to narrow a vehicle_fines lookup
        #[arg(long)]
        renavam: Option<String>,

        /// Use a radar-server instead of calling providers in-process
        #[arg(long, env = "RADAR_SERVER")]
        server: Option<String>,

        /// Acting user id sent to the server
        #[arg(long, env = "RADAR_USER_ID")]
        user: Option<Uuid>,

        /// Enable demo mode (synthetic data) for in-process lookups
        #[arg(long)]
        demo: bool,

        /// Status poll interval in milliseconds
        #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval_ms: Option<u64>,

        /// Give up waiting after this many seconds (the lookup keeps running)
        #[arg(long, value_name = "SECS")]
        max_wait: Option<u64>,
    },

    /// List your search history on a radar-server
    History {
        #[arg(long, env = "RADAR_SERVER")]
        server: String,

        #[arg(long, env = "RADAR_USER_ID")]
        user: Uuid,

        /// Only entries of this search type
        #[arg(long = "type", value_name = "TYPE")]
        search_type: Option<String>,

        /// Only entries for this exact query
        #[arg(long)]
        query: Option<String>,

        /// Only successful (true) or failed (false) lookups
        #[arg(long)]
        success: Option<bool>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Send a test delivery to a webhook URL
    WebhookTest {
        #[arg(value_name = "URL")]
        url: String,

        /// Extra header, repeatable (NAME=VALUE)
        #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Allow plain http:// endpoints
        #[arg(long)]
        allow_http: bool,
    },
}

fn parse_search_type(raw: &str) -> Result<SearchType, String> {
    raw.parse::<SearchType>().map_err(|e| e.to_string())
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Lookup {
            search_type,
            query,
            birth_date,
            renavam,
            server,
            user,
            demo,
            poll_interval_ms,
            max_wait,
        } => {
            let args = LookupArgs {
                search_type,
                query,
                birth_date,
                renavam,
                server,
                user,
                demo,
                poll_interval: poll_interval_ms.map(Duration::from_millis),
                max_wait: max_wait.map(Duration::from_secs),
            };
            commands::lookup::execute(args, cli.json, cli.quiet).await
        }
        Commands::History {
            server,
            user,
            search_type,
            query,
            success,
            page,
            limit,
        } => {
            let params = HistoryParams {
                search_type,
                query,
                success,
                page,
                limit,
            };
            commands::history::execute(&server, user, params, cli.json).await
        }
        Commands::WebhookTest {
            url,
            headers,
            allow_http,
        } => commands::webhook_test::execute(url, headers, allow_http, cli.json).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            std::process::exit(code);
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };
    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
