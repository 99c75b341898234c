use clap::Parser;
use sqv::AppError;
use sqv::cli::dispatcher::Dispatcher;
use sqv::cli::main_types::Cli;
use sqv::storage::config::Config;
use sqv::utils::logging::init_logging;
use std::path::PathBuf;

fn exit_with(err: &AppError) -> ! {
    eprintln!("Error: {}", err.display_friendly());
    if let Some(hint) = err.troubleshooting_hint() {
        eprintln!("Hint: {}", hint);
    }
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config_dir
        .as_ref()
        .map(|dir| Config::file_in(&PathBuf::from(dir)));

    let mut config = match Config::load(config_path) {
        Ok(config) => config,
        Err(err) => exit_with(&err.into()),
    };

    // flags win over the file and the environment
    if cli.page_size.is_some() {
        config.page_size = cli.page_size;
    }
    if cli.timeout_ms.is_some() {
        config.sql_timeout_ms = cli.timeout_ms;
    }

    let settings = match config.settings() {
        Ok(settings) => settings,
        Err(err) => exit_with(&err.into()),
    };

    let dispatcher = Dispatcher::new(settings);
    match dispatcher.dispatch(&cli.database, cli.command).await {
        Ok(0) => {}
        Ok(errors) => {
            log::debug!("{} errors reported", errors);
            std::process::exit(2);
        }
        Err(err) => exit_with(&err),
    }
}
