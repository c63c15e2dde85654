pub(crate) mod provision;
mod run;

use self::provision::Provision;
use self::run::Run;
use crate::{error, Result};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::process::ExitCode;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// The names the AWS SDKs and the awslogs driver read credentials from.
pub(super) const AWS_ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub(super) const AWS_SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub(super) const AWS_REGION_ENV: &str = "AWS_REGION";

/// A tool for running a command in a container with the container's output shipped to AWS
/// CloudWatch by the engine's `awslogs` logging driver.
#[derive(Debug, Parser)]
#[clap(about, long_about = None, version)]
pub(crate) struct Args {
    /// Set the logging level. One of [off|error|warn|info|debug|trace]. Defaults to info. You can
    /// also leave this unset and use the RUST_LOG env variable. See
    /// https://github.com/rust-cli/env_logger/
    #[clap(long = "log-level")]
    pub(crate) log_level: Option<LevelFilter>,

    #[clap(subcommand)]
    pub(crate) subcommand: Subcommand,
}

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    Run(Run),

    /// One-time host setup so the docker daemon's awslogs driver can authenticate.
    Provision(Provision),
}

/// Entrypoint for the `cwrun` command line program.
pub(super) async fn run(args: Args) -> Result<ExitCode> {
    match args.subcommand {
        Subcommand::Run(run) => run.run().await,
        Subcommand::Provision(provision) => {
            provision.run().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// use `level` if present, or else use `RUST_LOG` if present, or else use a default.
pub(super) fn init_logger(level: Option<LevelFilter>) {
    match (std::env::var(env_logger::DEFAULT_FILTER_ENV).ok(), level) {
        (Some(_), None) => {
            // RUST_LOG exists and level does not; use the environment variable.
            Builder::from_default_env().init();
        }
        _ => {
            // use provided log level or default for this crate only.
            Builder::new()
                .filter(
                    Some(env!("CARGO_CRATE_NAME")),
                    level.unwrap_or(DEFAULT_LEVEL_FILTER),
                )
                .init();
        }
    }
}

/// Validate that a required value is present and non-empty, naming the offending flag otherwise.
/// Presence is the only validation performed; the engine and the logging driver are the
/// authorities on what makes a usable image name, group, or region.
pub(super) fn required(value: &Option<String>, flag: &str) -> Result<String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => error::InvalidArgumentSnafu {
            message: format!("'--{}' is required and must not be empty", flag),
        }
        .fail(),
    }
}
