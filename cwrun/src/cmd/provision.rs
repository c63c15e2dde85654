use crate::common::CommandLine;
use crate::error::ProvisionSnafu;
use crate::Result;
use clap::Parser;
use log::info;
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use which::which;

/// File the credentials are written to, inside the service's drop-in directory.
const DROPIN_FILE: &str = "aws-credentials.conf";
const DEFAULT_DROPIN_DIR: &str = "/etc/systemd/system/docker.service.d";
const DOCKER_SERVICE: &str = "docker.service";

/// Write the AWS credential environment into a systemd drop-in for the docker service and
/// restart the service, so the daemon's awslogs driver can authenticate. This is a one-time
/// bootstrap invoked explicitly by an operator; `run` never performs it implicitly.
#[derive(Debug, Parser)]
pub(crate) struct Provision {
    /// AWS access key id. Falls back to the AWS_ACCESS_KEY_ID environment variable.
    #[clap(long = "aws-access-key-id", env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    aws_access_key_id: Option<String>,

    /// AWS secret access key. Falls back to the AWS_SECRET_ACCESS_KEY environment variable.
    #[clap(
        long = "aws-secret-access-key",
        env = "AWS_SECRET_ACCESS_KEY",
        hide_env_values = true
    )]
    aws_secret_access_key: Option<String>,

    /// AWS region. Falls back to the AWS_REGION environment variable.
    #[clap(long = "aws-region", env = "AWS_REGION")]
    aws_region: Option<String>,

    /// Directory the systemd drop-in is written to.
    #[clap(long = "dropin-dir", default_value = DEFAULT_DROPIN_DIR)]
    dropin_dir: PathBuf,

    /// Write the drop-in but do not reload systemd or restart the docker service.
    #[clap(long = "no-restart")]
    no_restart: bool,
}

struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    region: String,
}

impl Provision {
    pub(super) async fn run(&self) -> Result<()> {
        let creds = Credentials {
            access_key_id: super::required(&self.aws_access_key_id, "aws-access-key-id")?,
            secret_access_key: super::required(
                &self.aws_secret_access_key,
                "aws-secret-access-key",
            )?,
            region: super::required(&self.aws_region, "aws-region")?,
        };

        let path = write_dropin(&self.dropin_dir, &render_dropin(&creds))
            .await
            .context(ProvisionSnafu)?;
        info!("Wrote credentials to '{}'", path.display());

        if self.no_restart {
            info!("Skipping restart of {}", DOCKER_SERVICE);
            return Ok(());
        }
        restart_docker().await.context(ProvisionSnafu)?;
        info!("Restarted {}", DOCKER_SERVICE);
        Ok(())
    }
}

/// Render the drop-in that injects the AWS environment into the docker service.
fn render_dropin(creds: &Credentials) -> String {
    format!(
        "[Service]\n\
         Environment=\"{}={}\"\n\
         Environment=\"{}={}\"\n\
         Environment=\"{}={}\"\n",
        super::AWS_ACCESS_KEY_ID_ENV,
        creds.access_key_id,
        super::AWS_SECRET_ACCESS_KEY_ENV,
        creds.secret_access_key,
        super::AWS_REGION_ENV,
        creds.region
    )
}

/// Write the drop-in file with owner-only permissions; it holds a secret.
async fn write_dropin(dir: &Path, contents: &str) -> std::result::Result<PathBuf, error::Error> {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir)
        .await
        .context(error::CreateDirSnafu { path: dir })?;
    let path = dir.join(DROPIN_FILE);
    fs::write(&path, contents)
        .await
        .context(error::WriteDropinSnafu { path: path.clone() })?;
    fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
        .await
        .context(error::SetPermissionsSnafu { path: path.clone() })?;
    Ok(path)
}

async fn restart_docker() -> std::result::Result<(), error::Error> {
    let systemctl = CommandLine {
        path: which("systemctl").context(error::SystemctlNotFoundSnafu)?,
    };
    systemctl
        .output(&["daemon-reload"], "failed to reload systemd units".to_string())
        .await
        .context(error::SystemctlSnafu)?;
    systemctl
        .output(
            &["restart", DOCKER_SERVICE],
            format!("failed to restart {}", DOCKER_SERVICE),
        )
        .await
        .context(error::SystemctlSnafu)?;
    Ok(())
}

pub(crate) mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Unable to create directory '{}': {source}", path.display()))]
        CreateDir {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Unable to write '{}': {source}", path.display()))]
        WriteDropin {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Unable to set permissions on '{}': {source}", path.display()))]
        SetPermissions {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Unable to find 'systemctl' in the path: {source}"))]
        SystemctlNotFound { source: which::Error },

        #[snafu(display("{source}"))]
        Systemctl {
            source: crate::common::error::Error,
        },
    }
}
