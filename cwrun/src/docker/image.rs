use super::{error, Docker, Result};
use clap::ValueEnum;
use log::{debug, info};
use snafu::ResultExt;

/// When `docker run` should be preceded by a `docker pull`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum PullPolicy {
    /// Pull only when the image is not present locally.
    #[default]
    Missing,
    /// Always pull before running.
    Always,
    /// Never pull. The image must already be present.
    Never,
}

impl Docker {
    /// Check whether an image with this name exists locally. `docker image inspect` exits
    /// non-zero when it does not.
    pub(crate) async fn image_exists(&self, image: &str) -> Result<bool> {
        self.cli
            .succeeds(
                &["image", "inspect", "--type=image", image],
                format!("failed to inspect image '{}'", image),
            )
            .await
            .context(error::CommandSnafu)
    }

    /// Pull an image, streaming the engine's progress output.
    pub(crate) async fn pull(&self, image: &str) -> Result<()> {
        self.cli
            .spawn(
                &["pull", image],
                format!("failed to pull image '{}'", image),
            )
            .await
            .context(error::CommandSnafu)
    }

    /// Apply the pull policy before launching.
    pub(crate) async fn ensure_image(&self, image: &str, policy: PullPolicy) -> Result<()> {
        match policy {
            PullPolicy::Never => Ok(()),
            PullPolicy::Always => self.pull(image).await,
            PullPolicy::Missing => {
                if self.image_exists(image).await? {
                    debug!("Image '{}' found locally", image);
                    Ok(())
                } else {
                    info!("Image '{}' not found locally, pulling", image);
                    self.pull(image).await
                }
            }
        }
    }
}
