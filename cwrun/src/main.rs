/*!
Cwrun runs a shell command in a container and ships the container's output to AWS CloudWatch.

The heavy lifting is delegated: the container engine supervises the workload and its `awslogs`
logging driver handles batching and delivery to CloudWatch. This program maps its arguments onto
a single `docker run` invocation, stays attached to the running container, and turns termination
signals into a graceful stop (escalating to a kill after a grace period).
*/
use crate::cmd::{init_logger, Args};
use clap::Parser;
use std::process::ExitCode;

mod cmd;
mod common;
mod docker;

mod error {
    use snafu::Snafu;

    /// Each error kind maps to a distinct process exit code. Callers rely on the codes, not on
    /// stderr contents.
    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Invalid argument: {message}"))]
        InvalidArgument { message: String },

        #[snafu(display("Unable to run container: {source}"))]
        ContainerLaunchFailed { source: crate::docker::error::Error },

        #[snafu(display(
            "Container '{name}' did not stop within the {grace_secs}s grace period and was killed"
        ))]
        ShutdownTimeout { name: String, grace_secs: u64 },

        #[snafu(display("Unable to register signal handlers: {source}"))]
        Signals { source: std::io::Error },

        #[snafu(display("Unable to provision the host: {source}"))]
        Provision {
            source: crate::cmd::provision::error::Error,
        },
    }

    impl Error {
        pub(crate) fn exit_code(&self) -> u8 {
            match self {
                Error::InvalidArgument { .. } => 1,
                Error::ContainerLaunchFailed { .. } => 2,
                Error::ShutdownTimeout { .. } => 3,
                Error::Signals { .. } => 1,
                Error::Provision { .. } => 1,
            }
        }
    }

    #[cfg(test)]
    mod test {
        use super::Error;
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        #[test]
        fn exit_codes_follow_the_documented_contract() {
            let invalid = Error::InvalidArgument {
                message: "'--docker-image' is required and must not be empty".to_string(),
            };
            assert_eq!(1, invalid.exit_code());

            let launch = Error::ContainerLaunchFailed {
                source: crate::docker::error::LaunchReportedSnafu {
                    status: ExitStatus::from_raw(125 << 8),
                }
                .build(),
            };
            assert_eq!(2, launch.exit_code());

            let timeout = Error::ShutdownTimeout {
                name: "cwrun-test".to_string(),
                grace_secs: 10,
            };
            assert_eq!(3, timeout.exit_code());
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, error::Error>;

/// `snafu` gives our errors `Display` representations that embed their sources, so rather than
/// returning a `Result` from `main` (which would print `Debug`), we print the error ourselves and
/// exit with the code its kind calls for.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level);
    match cmd::run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
