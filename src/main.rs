mod cli;
mod config;
mod db;
mod driver;
mod error;
mod formats;
mod markup;
mod records;
mod selector;
mod store;
mod transformer;

use cli::Cli;
use config::{Config, CONFIG};
use directories::ProjectDirs;
use flexi_logger::{detailed_format, Age, Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};
use log::{debug, error};

fn main() {
    let Some(project_dirs) = ProjectDirs::from("", "", "pfunmigrate") else {
        eprintln!("Could not determine the application data directory");
        std::process::exit(1);
    };

    let config = Config::load_config(&project_dirs);
    let _logger = setup_logging(&project_dirs, &config);

    // Config is only set once, here
    if CONFIG.set(config).is_err() {
        eprintln!("Configuration was already loaded");
        std::process::exit(1);
    }

    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());

    if let Err(err) = Cli::handle_command_line(&project_dirs) {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

/// Logs go to daily-rotated files under the app's data directory. The handle
/// must stay alive for the life of the process.
fn setup_logging(project_dirs: &ProjectDirs, config: &Config) -> Option<LoggerHandle> {
    let log_dir = project_dirs.data_local_dir().join("logs");

    let result = Logger::try_with_str(config.log_spec()).and_then(|logger| {
        logger
            .log_to_file(FileSpec::default().directory(log_dir).basename("pfunmigrate"))
            .rotate(
                Criterion::Age(Age::Day),
                Naming::Timestamps,
                Cleanup::KeepLogFiles(7),
            )
            .format_for_files(detailed_format)
            .start()
    });

    match result {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logging: {}", e);
            None
        }
    }
}
