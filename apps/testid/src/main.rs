//! testid binary: load configuration, run the engine, print the report

mod cli;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use testid_config::{logging, AppConfig, ConfigResult};
use testid_core::{RunReport, Runner};

fn load_config(cli: &Cli) -> ConfigResult<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Print the report to stdout as text, or as JSON with `--json`
fn print_report(report: &RunReport, json: bool) {
    if !json {
        println!("{}", report);
        return;
    }
    match serde_json::to_string_pretty(report) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("testid: failed to serialize report: {}", e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging is not up yet, so configuration errors go straight to stderr
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("testid: {}", e);
            // Nothing was scanned, but the report is printed on every exit path
            print_report(&RunReport::default(), cli.json);
            return ExitCode::FAILURE;
        }
    };

    logging::initialize(&config);
    tracing::debug!(?config, "Configuration loaded");

    let runner = Runner::new(config).await;
    let result = runner.run().await;

    print_report(&runner.report().await, cli.json);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}
