//! `vaultshift` operator CLI

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vaultshift_core::{Collaborators, IntegrationConfig, IntegrationController};
use vaultshift_store::{FileStore, KeyValueStore};

mod commands;

fn cli() -> Command {
    Command::new("vaultshift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Legacy to privacy-first data migration controller")
        .subcommand_required(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .env("VAULTSHIFT_DATA_DIR")
                .default_value(".vaultshift")
                .value_parser(value_parser!(PathBuf))
                .global(true)
                .help("Directory holding both schemas and the archive"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .global(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("status").about("Show mode, status and last assessment").arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Output as JSON"),
            ),
        )
        .subcommand(
            Command::new("import")
                .about("Load a legacy record from a JSON export")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("replace")
                        .long("replace")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing legacy record"),
                ),
        )
        .subcommand(Command::new("assess").about("Validate the legacy record"))
        .subcommand(Command::new("migrate").about("Assess, then migrate if nothing blocks"))
        .subcommand(Command::new("rollback").about("Roll back to the legacy schema"))
        .subcommand(Command::new("balance").about("Print the total balance"))
        .subcommand(
            Command::new("transactions").about("List transactions").arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Output as JSON"),
            ),
        )
        .subcommand(Command::new("accounts").about("List accounts"))
        .subcommand(
            Command::new("add")
                .about("Add a transaction")
                .arg(Arg::new("id").long("id").required(true))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(Arg::new("description").long("description").required(true))
                .arg(Arg::new("account").long("account"))
                .arg(Arg::new("category").long("category"))
                .arg(
                    Arg::new("date")
                        .long("date")
                        .help("RFC 3339 timestamp, defaults to now"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a transaction")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(Command::new("archives").about("List archived legacy snapshots"))
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vaultshift=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Configuration and the data-directory backend
async fn open_backend(
    matches: &ArgMatches,
) -> anyhow::Result<(IntegrationConfig, Arc<dyn KeyValueStore>)> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => IntegrationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => IntegrationConfig::default(),
    };
    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(".vaultshift"));

    let store = FileStore::open(&data_dir)
        .await
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    Ok((config, Arc::new(store)))
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let (config, kv) = open_backend(&matches).await?;

    // import seeds the legacy schema and must not depend on startup detection
    if let Some(("import", args)) = matches.subcommand() {
        let file = args
            .get_one::<PathBuf>("file")
            .context("missing import file")?;
        return commands::import(kv, &config, file, args.get_flag("replace")).await;
    }

    let collaborators = Collaborators::over(kv, &config);
    let controller = IntegrationController::new(config, collaborators)
        .await
        .context("starting controller")?;

    match matches.subcommand() {
        Some(("status", args)) => commands::status(&controller, args.get_flag("json")),
        Some(("assess", _)) => commands::assess(&controller).await,
        Some(("migrate", _)) => commands::migrate(&controller).await,
        Some(("rollback", _)) => commands::rollback(&controller).await,
        Some(("balance", _)) => commands::balance(&controller).await,
        Some(("transactions", args)) => {
            commands::transactions(&controller, args.get_flag("json")).await
        }
        Some(("accounts", _)) => commands::accounts(&controller).await,
        Some(("add", args)) => commands::add(&controller, args).await,
        Some(("remove", args)) => {
            let id = args.get_one::<String>("id").context("missing id")?;
            commands::remove(&controller, id).await
        }
        Some(("archives", _)) => commands::archives(&controller).await,
        _ => anyhow::bail!("no command given, see --help"),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    if let Err(e) = run(matches).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
