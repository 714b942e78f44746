//! micpulse CLI entry point

use std::process::ExitCode;

use clap::Parser;

use micpulse::cli::{
    app::{load_merged_config, parse_duration_arg, run_meter, run_record, RecordOptions},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    devices_cmd::handle_devices_command,
    presenter::Presenter,
    EXIT_ERROR, EXIT_USAGE_ERROR,
};
use micpulse::infrastructure::XdgConfigStore;
use micpulse::logging::init_logging;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut presenter = Presenter::new();

    if let Err(e) = init_logging(cli.verbose) {
        presenter.warn(&e);
    }

    let cli_config = cli.config_overrides();

    match cli.command {
        Commands::Config { action } => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Devices => {
            if let Err(e) = handle_devices_command(&presenter) {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        #[cfg(unix)]
        Commands::Send { method, path } => {
            let command = method.into_command(path);
            match micpulse::cli::daemon_cmd::handle_send(command, &presenter).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    presenter.error(&e);
                    ExitCode::from(EXIT_ERROR)
                }
            }
        }
        #[cfg(unix)]
        Commands::Watch => match micpulse::cli::daemon_cmd::handle_watch(&mut presenter).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                presenter.error(&e);
                ExitCode::from(EXIT_ERROR)
            }
        },
        #[cfg(unix)]
        Commands::Daemon => {
            let config = load_merged_config(cli_config).await;
            micpulse::cli::run_daemon(config).await
        }
        Commands::Meter { duration } => {
            let duration = match parse_duration_arg(duration.as_deref()) {
                Ok(d) => d,
                Err(e) => {
                    presenter.error(&e);
                    return ExitCode::from(EXIT_USAGE_ERROR);
                }
            };
            let config = load_merged_config(cli_config).await;
            run_meter(config, duration).await
        }
        Commands::Record(args) => {
            let duration = match parse_duration_arg(args.duration.as_deref()) {
                Ok(d) => d,
                Err(e) => {
                    presenter.error(&e);
                    return ExitCode::from(EXIT_USAGE_ERROR);
                }
            };
            let config = load_merged_config(cli_config).await;
            let options = RecordOptions {
                path: args.path,
                duration,
                meter: !args.no_meter,
            };
            run_record(config, options).await
        }
    }
}
