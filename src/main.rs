use std::io;
use std::process::exit;

use clap::Parser;
use tracing::{error, subscriber};
use tracing_log::LogTracer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::FmtSubscriber;

use qdb_cli::cli::{Args, QdbCli};
use qdb_cli::config::context::build_questdb;
use qdb_cli::config::schema::load_config;
use qdb_cli::workflow::WorkflowStatus;

const EXIT_ERROR: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;

fn prepare_tracing(level: &str, json_logs: bool) {
    // Redirect all `log`'s events to our subscriber, to collect those from dependencies too
    LogTracer::init().expect("Failed to set logger");

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,qdb_cli={level}")))
        .expect("Invalid log filter");

    let sub = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr);

    let result = if json_logs {
        subscriber::set_global_default(sub.json().finish())
    } else {
        subscriber::set_global_default(sub.compact().finish())
    };
    result.expect("Failed to set the tracing subscriber");
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    prepare_tracing(args.log_level(), args.json_logs);

    let config = match load_config(args.config.as_deref(), &args.config_overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading the config: {e}");
            exit(EXIT_CONFIG_ERROR);
        }
    };

    let db = match build_questdb(&config) {
        Ok(db) => db,
        Err(e) => {
            error!("Error setting up the database client: {e}");
            exit(EXIT_CONFIG_ERROR);
        }
    };

    let cli = QdbCli::new(db);
    let mut stdout = io::stdout().lock();
    match cli.handle_command(&args.command, &mut stdout).await {
        Ok(WorkflowStatus::Ok) => {}
        Ok(WorkflowStatus::Error) => exit(EXIT_ERROR),
        Err(e) => {
            error!("{e}");
            exit(EXIT_ERROR);
        }
    }
}
