//! Case portal: command-line entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Run a one-shot command, or the interactive console (default)

use case_portal::{
    api::ApiClient,
    config,
    error::AppError,
    loaders::{CaseDataLoader, CombinedReportLoader, RagParams, RagQueryLoader},
    logger,
    portal::{self, Portal},
    session::SessionStore,
    staging::StagingStats,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

const USAGE: &str = "\
Usage: case-portal [OPTIONS] [COMMAND]

Commands:
  shell                      Interactive portal with login (default)
  case <id>                  Print the case record
  report <id> [--refresh]    Print the combined report for a case
  ask <question...>          Query the guideline documents
  staging                    Print staging statistics across all cases

Options:
  -h, --help                 Print help
  -f, --config <PATH>        Path to configuration file (default: config/default.toml)
  -v, -vv, -vvv, -vvvv       Increase logging verbosity";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match e {
            AppError::Failed(output) => eprintln!("{output}"),
            other => eprintln!("error: {other}"),
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args()?;

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        base_url = %config.api.base_url,
        log_level = %effective_log_level,
        "config loaded"
    );

    match args.command {
        Command::Shell => {
            let portal = Portal::from_config(&config, SessionStore::new())?;
            let shutdown = CancellationToken::new();
            {
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        shutdown.cancel();
                    }
                });
            }
            portal::run_console(portal, shutdown).await
        }
        Command::Case(case_id) => {
            let api = ApiClient::from_config(&config.api)?;
            let state = CaseDataLoader::new(api).load(Some(case_id.as_str())).await;
            print_or_fail(portal::render_case(&state), state.error.is_some())
        }
        Command::Report { case_id, refresh } => {
            let api = ApiClient::from_config(&config.api)?;
            let case = CaseDataLoader::new(api.clone()).load(Some(case_id.as_str())).await;
            let Some(record) = case.data.as_ref().and_then(|r| r.record()) else {
                return print_or_fail(portal::render_case(&case), true);
            };
            let reports = CombinedReportLoader::new(api, SessionStore::new());
            let state = if refresh {
                reports.refresh(Some(case_id.as_str()), Some(record)).await
            } else {
                reports.load(Some(case_id.as_str()), Some(record)).await
            };
            print_or_fail(portal::render_report(&case_id, &state), state.error.is_some())
        }
        Command::Ask(question) => {
            let api = ApiClient::from_config(&config.api)?;
            let state = RagQueryLoader::new(api, RagParams::from(&config.rag)).query(&question).await;
            print_or_fail(portal::render_rag(&state), state.error.is_some())
        }
        Command::Staging => {
            let api = ApiClient::from_config(&config.api)?;
            let stats = StagingStats::collect(&api).await?;
            println!("{}", portal::render_staging(&stats));
            Ok(())
        }
    }
}

/// Print `output`, or hand it back as a failure when the command failed.
fn print_or_fail(output: String, failed: bool) -> Result<(), AppError> {
    if failed {
        return Err(AppError::Failed(output));
    }
    println!("{output}");
    Ok(())
}

// ── CLI arg parsing ───────────────────────────────────────────────────────────

enum Command {
    Shell,
    Case(String),
    Report { case_id: String, refresh: bool },
    Ask(String),
    Staging,
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    command: Command,
}

fn parse_cli_args() -> Result<CliArgs, AppError> {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut refresh = false;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "-f" | "--config" => match iter.next() {
                Some(path) => config_path = Some(path),
                None => return Err(AppError::Input("-f/--config requires a path argument".into())),
            },
            "--refresh" => refresh = true,
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => positional.push(arg),
        }
    }

    // Each -v raises verbosity one tier:
    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("shell") => Command::Shell,
        Some("case") => Command::Case(required(positional.next(), "case <id>")?),
        Some("report") => Command::Report {
            case_id: required(positional.next(), "report <id>")?,
            refresh,
        },
        Some("ask") => {
            let question = positional.collect::<Vec<_>>().join(" ");
            Command::Ask(question)
        }
        Some("staging") => Command::Staging,
        Some(other) => {
            return Err(AppError::Input(format!("unknown command '{other}'\n\n{USAGE}")));
        }
    };

    Ok(CliArgs { log_level, config_path, command })
}

fn required(value: Option<String>, usage: &str) -> Result<String, AppError> {
    value.ok_or_else(|| AppError::Input(format!("usage: case-portal {usage}")))
}
