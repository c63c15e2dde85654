use super::{error, Docker, Result};
use snafu::ResultExt;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

/// Exit statuses `docker run` reserves for failures that happen before or while starting the
/// container, as opposed to statuses produced by the workload itself: 125 is an engine error,
/// 126 a command that could not be invoked, 127 a command that could not be found.
const LAUNCH_FAILURE_CODES: [i32; 3] = [125, 126, 127];

pub(crate) fn is_launch_failure(status: &ExitStatus) -> bool {
    matches!(status.code(), Some(code) if LAUNCH_FAILURE_CODES.contains(&code))
}

/// A container the engine is currently supervising. Owns the attached engine process; stop and
/// kill requests go through separate engine invocations addressed by container name.
pub(crate) struct RunningContainer {
    name: String,
    child: Child,
    docker: Docker,
}

impl RunningContainer {
    pub(super) fn new(name: String, child: Child, docker: Docker) -> Self {
        Self {
            name,
            child,
            docker,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the attached engine process, and with it the container, to exit.
    pub(crate) async fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().await.context(error::WaitRunSnafu)
    }

    /// Ask the engine to stop the container gracefully. The engine delivers the container's stop
    /// signal and escalates on its own once `grace` has elapsed.
    pub(crate) async fn stop(&self, grace: Duration) -> Result<()> {
        self.docker
            .cli
            .output(
                &[
                    "stop",
                    "--time",
                    &grace.as_secs().to_string(),
                    &self.name,
                ],
                format!("failed to stop container '{}'", self.name),
            )
            .await
            .context(error::CommandSnafu)?;
        Ok(())
    }

    /// Kill the container outright.
    pub(crate) async fn kill(&self) -> Result<()> {
        self.docker
            .cli
            .output(
                &["kill", &self.name],
                format!("failed to kill container '{}'", self.name),
            )
            .await
            .context(error::CommandSnafu)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::is_launch_failure;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn status(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    #[test]
    fn engine_reserved_statuses_are_launch_failures() {
        for code in [125, 126, 127] {
            assert!(is_launch_failure(&status(code)), "code {}", code);
        }
    }

    #[test]
    fn workload_statuses_are_not_launch_failures() {
        for code in [0, 1, 2, 7, 124, 128, 137, 143] {
            assert!(!is_launch_failure(&status(code)), "code {}", code);
        }
    }

    #[test]
    fn signal_death_is_not_a_launch_failure() {
        // raw wait status for SIGKILL
        assert!(!is_launch_failure(&ExitStatus::from_raw(9)));
    }
}
