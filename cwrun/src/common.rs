use log::debug;
use snafu::{ensure, ResultExt};
use std::path::PathBuf;
use tokio::process::Command;

pub(crate) type Result<T> = std::result::Result<T, error::Error>;

/// Wraps invocations of an external program found at `path`. Every invocation is logged at debug
/// level before it runs.
#[derive(Debug, Clone)]
pub(crate) struct CommandLine {
    pub(crate) path: PathBuf,
}

impl CommandLine {
    /// Run the program with `args`, capturing its output. A non-zero exit is an error carrying
    /// the program's stderr.
    pub(crate) async fn output(&self, args: &[&str], error_msg: String) -> Result<Vec<u8>> {
        debug!("Running: {} {}", self.path.display(), args.join(" "));
        let output = Command::new(&self.path)
            .args(args)
            .output()
            .await
            .context(error::CommandFailedSnafu { message: error_msg })?;
        ensure!(
            output.status.success(),
            error::OperationFailedSnafu {
                message: String::from_utf8_lossy(&output.stderr),
                program: self.path.clone(),
                args: args.iter().map(|x| x.to_string()).collect::<Vec<_>>()
            }
        );
        Ok(output.stdout)
    }

    /// Run the program with `args`, leaving its stdout/stderr attached to ours so the user sees
    /// its progress. A non-zero exit is an error.
    pub(crate) async fn spawn(&self, args: &[&str], error_msg: String) -> Result<()> {
        debug!("Running: {} {}", self.path.display(), args.join(" "));
        let status = Command::new(&self.path)
            .args(args)
            .spawn()
            .context(error::CommandFailedSnafu {
                message: error_msg.clone(),
            })?
            .wait()
            .await
            .context(error::CommandFailedSnafu {
                message: error_msg.clone(),
            })?;
        ensure!(
            status.success(),
            error::OperationFailedSnafu {
                message: error_msg,
                program: self.path.clone(),
                args: args.iter().map(|x| x.to_string()).collect::<Vec<_>>()
            }
        );
        Ok(())
    }

    /// Run the program with `args`, discarding its output and reporting only whether it exited
    /// zero. Used for probes where a non-zero exit is an answer, not an error.
    pub(crate) async fn succeeds(&self, args: &[&str], error_msg: String) -> Result<bool> {
        debug!("Running: {} {}", self.path.display(), args.join(" "));
        let output = Command::new(&self.path)
            .args(args)
            .output()
            .await
            .context(error::CommandFailedSnafu { message: error_msg })?;
        Ok(output.status.success())
    }
}

pub(crate) mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to execute command, {message}: {source}"))]
        CommandFailed {
            message: String,
            source: std::io::Error,
        },

        #[snafu(display("Command was unsuccessful: {message}\n command: {} {}", program.display(), args.join(" ")))]
        OperationFailed {
            message: String,
            program: PathBuf,
            args: Vec<String>,
        },
    }
}
