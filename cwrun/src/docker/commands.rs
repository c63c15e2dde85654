use super::{error, Docker, Result, RunningContainer};
use snafu::ResultExt;
use tokio::process::Command;

/// Can execute a `docker run` command. This follows the builder pattern, for example:
///
/// ```
/// let container = DockerRun::new("alpine", "my-container")
///     .remove()
///     .command(["/bin/sh", "-c", "echo hi"])
///     .spawn(&docker)
///     .await?;
/// ```
///
/// The engine process is left attached so the caller can wait on the container's lifetime.
pub(crate) struct DockerRun {
    image: String,
    name: String,
    remove: bool,
    log_driver: Option<String>,
    log_opts: Vec<(String, String)>,
    envs: Vec<(String, String)>,
    command: Vec<String>,
}

impl DockerRun {
    /// A run request for `image`, creating a container called `name`.
    pub(crate) fn new<S1, S2>(image: S1, name: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            image: image.into(),
            name: name.into(),
            remove: false,
            log_driver: None,
            log_opts: Vec::new(),
            envs: Vec::new(),
            command: Vec::new(),
        }
    }

    /// Add the `--rm` argument so the engine removes the container once it exits.
    pub(crate) fn remove(mut self) -> Self {
        self.remove = true;
        self
    }

    /// Add a value for the `--log-driver` argument.
    pub(crate) fn log_driver<S: Into<String>>(mut self, driver: S) -> Self {
        self.log_driver = Some(driver.into());
        self
    }

    /// Add a logging-driver option, where `("key", value)` becomes `--log-opt key=value`.
    /// Options appear in the invocation in the order they were added.
    pub(crate) fn log_opt<S1, S2>(mut self, key: S1, value: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.log_opts.push((key.into(), value.into()));
        self
    }

    /// Set an environment variable on the engine process itself. Values passed this way never
    /// appear in the invocation's argument vector.
    pub(crate) fn env<S1, S2>(mut self, key: S1, value: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The command to execute inside the container, e.g. `["/bin/bash", "-c", "echo hi"]`.
    pub(crate) fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// The argument vector handed to the engine binary.
    pub(crate) fn build_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if self.remove {
            args.push("--rm".to_string());
        }
        args.push("--name".to_string());
        args.push(self.name.clone());
        if let Some(driver) = self.log_driver.as_ref() {
            args.push("--log-driver".to_string());
            args.push(driver.clone());
        }
        for (key, value) in &self.log_opts {
            args.push("--log-opt".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }

    /// Issue the `docker run` invocation, attached, returning a handle to the running container.
    /// The container's stdout/stderr travel through the engine's logging driver, not through the
    /// returned process.
    pub(crate) async fn spawn(self, docker: &Docker) -> Result<RunningContainer> {
        let args = self.build_args();
        log::debug!(
            "Running: {} {}",
            docker.cli.path.display(),
            args.join(" ")
        );
        let mut command = Command::new(&docker.cli.path);
        command.args(&args);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        let child = command.spawn().context(error::SpawnRunSnafu {
            program: docker.cli.path.clone(),
        })?;
        Ok(RunningContainer::new(self.name, child, docker.clone()))
    }
}
