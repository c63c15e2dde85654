mod commands;
mod container;
mod image;

pub(crate) use self::commands::DockerRun;
pub(crate) use self::container::{is_launch_failure, RunningContainer};
pub(crate) use self::image::PullPolicy;

use crate::common::CommandLine;
use snafu::ResultExt;
use std::env;
use which::which;

/// Environment variable naming the engine binary to use for every invocation, e.g. `podman` or a
/// path to a specific `docker`. The unix search path is used when unset.
pub(crate) const ENGINE_ENV: &str = "CWRUN_DOCKER";

/// The logging driver that ships container output to CloudWatch.
pub(crate) const AWSLOGS_DRIVER: &str = "awslogs";
pub(crate) const OPT_REGION: &str = "awslogs-region";
pub(crate) const OPT_GROUP: &str = "awslogs-group";
pub(crate) const OPT_STREAM: &str = "awslogs-stream";
pub(crate) const OPT_CREATE_GROUP: &str = "awslogs-create-group";

/// A handle to the container engine CLI. All lifecycle operations (run, stop, kill, image pulls)
/// go through this one binary.
#[derive(Debug, Clone)]
pub(crate) struct Docker {
    pub(super) cli: CommandLine,
}

impl Docker {
    /// Find the engine binary in the unix search path, honoring the `CWRUN_DOCKER` override.
    pub(crate) fn from_environment() -> Result<Self> {
        let path = match env::var(ENGINE_ENV) {
            Ok(name) => which(&name).context(error::NotFoundSnafu { name })?,
            Err(_) => which("docker").context(error::NotFoundSnafu { name: "docker" })?,
        };
        Ok(Self {
            cli: CommandLine { path },
        })
    }
}

pub(crate) type Result<T> = std::result::Result<T, error::Error>;

pub(crate) mod error {
    use snafu::Snafu;
    use std::path::PathBuf;
    use std::process::ExitStatus;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Unable to find container engine '{name}' in the path: {source}"))]
        NotFound { name: String, source: which::Error },

        #[snafu(display("{source}"))]
        Command {
            source: crate::common::error::Error,
        },

        #[snafu(display("Unable to start '{}': {source}", program.display()))]
        SpawnRun {
            program: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Unable to wait for the container engine: {source}"))]
        WaitRun { source: std::io::Error },

        #[snafu(display("container engine reported a launch failure ({status})"))]
        LaunchReported { status: ExitStatus },
    }
}
