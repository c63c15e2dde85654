use crate::docker::{self, Docker, DockerRun, PullPolicy, RunningContainer};
use crate::error::{self, ContainerLaunchFailedSnafu, SignalsSnafu};
use crate::Result;
use clap::Parser;
use log::{info, warn};
use snafu::ResultExt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitCode, ExitStatus};
use std::time::Duration;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::time::timeout;
use uuid::Uuid;

const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Extra time the engine's own stop escalation is given before we issue a forceful kill, so the
/// two cleanup paths don't race.
const STOP_WAIT_MARGIN: Duration = Duration::from_secs(2);

/// Run a command in a container with the container's output shipped to CloudWatch.
#[derive(Debug, Parser)]
pub(crate) struct Run {
    /// Name of the docker image to run.
    #[clap(long = "docker-image")]
    docker_image: Option<String>,

    /// Bash command to run inside the container.
    #[clap(long = "bash-command")]
    bash_command: Option<String>,

    /// CloudWatch log group the driver ships to. Created by the driver when absent.
    #[clap(long = "aws-cloudwatch-group")]
    aws_cloudwatch_group: Option<String>,

    /// CloudWatch log stream within the group.
    #[clap(long = "aws-cloudwatch-stream")]
    aws_cloudwatch_stream: Option<String>,

    /// AWS access key id the logging driver authenticates with.
    #[clap(long = "aws-access-key-id")]
    aws_access_key_id: Option<String>,

    /// AWS secret access key the logging driver authenticates with.
    #[clap(long = "aws-secret-access-key")]
    aws_secret_access_key: Option<String>,

    /// AWS region the log group lives in.
    #[clap(long = "aws-region")]
    aws_region: Option<String>,

    /// Name for the created container. A unique name is generated when unset, so every launch
    /// creates a fresh container.
    #[clap(long = "container-name")]
    container_name: Option<String>,

    /// When to pull the image before running.
    #[clap(long = "pull", value_enum, default_value_t = PullPolicy::Missing)]
    pull: PullPolicy,

    /// Grace period in seconds between a stop request and a forceful kill.
    #[clap(long = "stop-timeout", default_value_t = DEFAULT_STOP_TIMEOUT_SECS)]
    stop_timeout: u64,
}

/// The validated set of parameters describing what to run and where to ship its logs. Assembled
/// once at startup and immutable thereafter.
#[derive(Debug)]
struct LaunchRequest {
    image: String,
    command: String,
    log_group: String,
    log_stream: String,
    access_key_id: String,
    secret_access_key: String,
    region: String,
}

impl LaunchRequest {
    fn from_args(args: &Run) -> Result<Self> {
        use super::required;
        Ok(Self {
            image: required(&args.docker_image, "docker-image")?,
            command: required(&args.bash_command, "bash-command")?,
            log_group: required(&args.aws_cloudwatch_group, "aws-cloudwatch-group")?,
            log_stream: required(&args.aws_cloudwatch_stream, "aws-cloudwatch-stream")?,
            access_key_id: required(&args.aws_access_key_id, "aws-access-key-id")?,
            secret_access_key: required(&args.aws_secret_access_key, "aws-secret-access-key")?,
            region: required(&args.aws_region, "aws-region")?,
        })
    }
}

impl Run {
    pub(super) async fn run(&self) -> Result<ExitCode> {
        // No engine call is made until the request is fully validated.
        let request = LaunchRequest::from_args(self)?;

        // Listeners must be registered before the container exists; a signal arriving earlier
        // would otherwise orphan it.
        let mut shutdown = ShutdownSignals::new().context(SignalsSnafu)?;

        let docker = Docker::from_environment().context(ContainerLaunchFailedSnafu)?;
        docker
            .ensure_image(&request.image, self.pull)
            .await
            .context(ContainerLaunchFailedSnafu)?;

        let name = self.container_name.clone().unwrap_or_else(unique_name);
        let mut container = DockerRun::new(&request.image, &name)
            .remove()
            .log_driver(docker::AWSLOGS_DRIVER)
            .log_opt(docker::OPT_REGION, &request.region)
            .log_opt(docker::OPT_GROUP, &request.log_group)
            .log_opt(docker::OPT_STREAM, &request.log_stream)
            .log_opt(docker::OPT_CREATE_GROUP, "true")
            .env(super::AWS_ACCESS_KEY_ID_ENV, &request.access_key_id)
            .env(super::AWS_SECRET_ACCESS_KEY_ENV, &request.secret_access_key)
            .env(super::AWS_REGION_ENV, &request.region)
            .command(["/bin/bash", "-c", request.command.as_str()])
            .spawn(&docker)
            .await
            .context(ContainerLaunchFailedSnafu)?;

        info!(
            "Started container '{}' from image '{}', logs ship to group '{}' stream '{}' in {}",
            name, request.image, request.log_group, request.log_stream, request.region
        );

        self.supervise(&mut container, &mut shutdown).await
    }

    /// Stay attached until the container exits on its own or a termination signal asks us to
    /// stop it.
    async fn supervise(
        &self,
        container: &mut RunningContainer,
        shutdown: &mut ShutdownSignals,
    ) -> Result<ExitCode> {
        let status = tokio::select! {
            status = container.wait() => status.context(ContainerLaunchFailedSnafu)?,
            signal_name = shutdown.recv() => {
                return self.stop_container(container, signal_name).await;
            }
        };

        if docker::is_launch_failure(&status) {
            return Err(launch_failure(status));
        }
        info!("Container '{}' exited with {}", container.name(), status);
        Ok(ExitCode::from(relay_exit_code(status)))
    }

    /// Issue one graceful stop and wait out the grace period. The engine escalates to SIGKILL on
    /// its own at the grace boundary; if the attached process still hasn't exited after a margin
    /// beyond that, kill the container ourselves and report the forced termination.
    async fn stop_container(
        &self,
        container: &mut RunningContainer,
        signal_name: &'static str,
    ) -> Result<ExitCode> {
        let grace = Duration::from_secs(self.stop_timeout);
        info!(
            "Received {}, stopping container '{}' with a {}s grace period",
            signal_name,
            container.name(),
            self.stop_timeout
        );

        if let Err(e) = container.stop(grace).await {
            warn!(
                "Stop request for container '{}' failed: {}",
                container.name(),
                e
            );
        }

        match timeout(grace + STOP_WAIT_MARGIN, container.wait()).await {
            Ok(status) => {
                let status = status.context(ContainerLaunchFailedSnafu)?;
                info!(
                    "Container '{}' stopped cleanly ({})",
                    container.name(),
                    status
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(_) => {
                warn!(
                    "Container '{}' did not stop in time, killing it",
                    container.name()
                );
                if let Err(e) = container.kill().await {
                    warn!(
                        "Kill request for container '{}' failed: {}",
                        container.name(),
                        e
                    );
                }
                // Reap the engine process so its cleanup cannot race our exit.
                let _ = timeout(STOP_WAIT_MARGIN, container.wait()).await;
                error::ShutdownTimeoutSnafu {
                    name: container.name(),
                    grace_secs: self.stop_timeout,
                }
                .fail()
            }
        }
    }
}

/// SIGINT and SIGTERM, fused into a single "stop requested" event. The OS-level handlers only
/// wake these streams; all real work happens on the main task.
struct ShutdownSignals {
    sigint: Signal,
    sigterm: Signal,
}

impl ShutdownSignals {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Resolves when either termination signal arrives.
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}

fn unique_name() -> String {
    let uuid = format!("{}", Uuid::new_v4());
    let slug = &uuid[0..8];
    format!("cwrun-{}", slug)
}

fn launch_failure(status: ExitStatus) -> error::Error {
    error::Error::ContainerLaunchFailed {
        source: docker::error::LaunchReportedSnafu { status }.build(),
    }
}

/// Map the engine process's exit status onto our own, following the shell convention of
/// `128 + signal` when the process died to a signal.
fn relay_exit_code(status: ExitStatus) -> u8 {
    match (status.code(), status.signal()) {
        (Some(code), _) => u8::try_from(code).unwrap_or(u8::MAX),
        (None, Some(sig)) => 128u8.saturating_add(sig as u8),
        (None, None) => 1,
    }
}
