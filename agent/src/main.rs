//! Tuya Monitor - Entry Point
//!
//! Polls device properties from the Tuya cloud OpenAPI for every configured
//! account, keeping each account's access token fresh.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tuya_monitor::app::account::Account;
use tuya_monitor::app::options::AppOptions;
use tuya_monitor::app::run::run;
use tuya_monitor::logs::{init_logging, LogOptions};
use tuya_monitor::storage::layout::StorageLayout;
use tuya_monitor::storage::settings::Settings;
use tuya_monitor::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{} {}", version.name, version.version),
        }
        return;
    }

    let layout = match cli_args.get("config") {
        Some(dir) => StorageLayout::new(PathBuf::from(dir)),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file
    let settings = match load_settings(&layout).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
        log_dir: settings.log_to_file.then(|| layout.logs_dir()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    // Authenticate every account once and exit
    if cli_args.contains_key("check") {
        let ok = check_accounts(&settings).await;
        std::process::exit(if ok { 0 } else { 1 });
    }

    let options = AppOptions {
        layout,
        accounts: settings.accounts,
        ..Default::default()
    };

    info!(
        "Running {} {} with {} accounts",
        version.name,
        version.version,
        options.accounts.len()
    );
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the monitor: {e}");
        std::process::exit(1);
    }
}

async fn load_settings(layout: &StorageLayout) -> anyhow::Result<Settings> {
    let settings_file = layout.settings_file();
    let contents = settings_file
        .read_string()
        .await
        .with_context(|| format!("reading {}", settings_file.path().display()))?;
    Settings::from_json(&contents)
        .with_context(|| format!("parsing {}", settings_file.path().display()))
}

async fn check_accounts(settings: &Settings) -> bool {
    let mut all_ok = true;
    for account in &settings.accounts {
        match Account::initialize(account.account_options(), None).await {
            Ok(initialized) => {
                let credential = initialized.store().read();
                println!(
                    "{}: ok (token expires at {})",
                    account.name,
                    credential.expires_at()
                );
            }
            Err(e) => {
                all_ok = false;
                println!("{}: failed ({}): {}", account.name, e.reason(), e);
            }
        }
    }
    all_ok
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
