use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use compass_connections::config::StorageConfig;
use compass_connections::services::{AppStore, ConnectionExchange, ExportOptions, ImportOptions};

const PASSPHRASE_ENV: &str = "COMPASS_CONNECTIONS_PASSPHRASE";

#[derive(Debug, PartialEq)]
enum Command {
    List,
    Export {
        all: bool,
        passphrase: Option<String>,
        remove_secrets: bool,
        out: Option<PathBuf>,
    },
    Import {
        file: PathBuf,
        passphrase: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || matches!(args[0].as_str(), "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let command = parse_args(&args, env::var(PASSPHRASE_ENV).ok())?;
    smol::block_on(run(command))
}

fn print_usage() {
    println!("Compass Connections");
    println!();
    println!("USAGE:");
    println!("    compass-connections list");
    println!("    compass-connections export [--all] [--passphrase <P> | --remove-secrets] [--out <FILE>]");
    println!("    compass-connections import <FILE> [--passphrase <P>]");
    println!();
    println!("OPTIONS:");
    println!("    --all              Export every connection, not only favorites");
    println!("    --passphrase <P>   Encrypt (export) or decrypt (import) secrets");
    println!("    --remove-secrets   Leave passwords out of the export");
    println!("    --out <FILE>       Write the export to FILE instead of stdout");
    println!();
    println!("ENVIRONMENT:");
    println!("    COMPASS_CONNECTIONS_HOME        Data directory (default ~/.compass-connections)");
    println!("    COMPASS_CONNECTIONS_SECRETS     Secret backend: keyring or database");
    println!("    {}  Passphrase when --passphrase is not given", PASSPHRASE_ENV);
    println!("    RUST_LOG                        Log filter (default info)");
}

/// Options each command accepts
fn allowed_options(command: &str) -> Option<&'static [&'static str]> {
    match command {
        "list" => Some(&[]),
        "export" => Some(&["--all", "--passphrase", "--remove-secrets", "--out"]),
        "import" => Some(&["--passphrase"]),
        _ => None,
    }
}

fn parse_args(args: &[String], env_passphrase: Option<String>) -> Result<Command> {
    let command = args[0].as_str();
    let allowed = allowed_options(command).ok_or_else(|| {
        anyhow!("Unknown command: '{}'\nRun with --help for usage", command)
    })?;

    let mut rest = args[1..].iter();
    let mut all = false;
    let mut remove_secrets = false;
    let mut passphrase = None;
    let mut out = None;
    let mut file = None;

    while let Some(arg) = rest.next() {
        if arg.starts_with("--") && !allowed.contains(&arg.as_str()) {
            return Err(anyhow!("Unknown option for '{}': '{}'", command, arg));
        }
        match arg.as_str() {
            "--all" => all = true,
            "--remove-secrets" => remove_secrets = true,
            "--passphrase" => {
                let value = rest.next().context("--passphrase needs a value")?;
                passphrase = Some(value.clone());
            }
            "--out" => {
                let value = rest.next().context("--out needs a file path")?;
                out = Some(PathBuf::from(value));
            }
            other if command == "import" && file.is_none() => file = Some(PathBuf::from(other)),
            other => return Err(anyhow!("Unexpected argument: '{}'", other)),
        }
    }

    match command {
        "list" => Ok(Command::List),
        "export" => Ok(Command::Export {
            all,
            // The environment passphrase only stands in when secrets are kept
            passphrase: passphrase.or(env_passphrase.filter(|_| !remove_secrets)),
            remove_secrets,
            out,
        }),
        _ => Ok(Command::Import {
            file: file.context("import needs a file path")?,
            passphrase: passphrase.or(env_passphrase),
        }),
    }
}

async fn run(command: Command) -> Result<()> {
    let config = StorageConfig::from_env()?;
    let store = AppStore::open(&config).await?;

    match command {
        Command::List => {
            let connections = store.connections().list().await?;
            if connections.is_empty() {
                println!("No saved connections in {}", config.data_dir.display());
            }
            for info in connections {
                let marker = if info.is_favorite() { "*" } else { " " };
                let last_used = info
                    .last_used_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{} {}  {}  (last used: {})",
                    marker,
                    info.id,
                    info.display_name(),
                    last_used
                );
                if let Some(tunnel) = &info.connection_options.ssh_tunnel {
                    println!("    via {}", tunnel.ssh_url());
                }
            }
        }
        Command::Export {
            all,
            passphrase,
            remove_secrets,
            out,
        } => {
            let mut options = ExportOptions::new().tracking_prop("context", "CLI");
            if all {
                options = options.all_connections();
            }
            if let Some(passphrase) = passphrase {
                options = options.passphrase(passphrase);
            }
            if remove_secrets {
                options = options.remove_secrets();
            }

            let exchange = ConnectionExchange::with_storage(store.connections());
            match out {
                Some(path) => {
                    exchange.export_to_file(&path, options).await?;
                    println!("Exported connections to {}", path.display());
                }
                None => println!("{}", exchange.export_connections(options).await?),
            }
        }
        Command::Import { file, passphrase } => {
            let mut options = ImportOptions::new().tracking_prop("context", "CLI");
            if let Some(passphrase) = passphrase {
                options = options.passphrase(passphrase);
            }

            ConnectionExchange::with_storage(store.connections())
                .import_from_file(&file, options)
                .await
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!("Imported connections from {}", file.display());
        }
    }

    Ok(())
}
