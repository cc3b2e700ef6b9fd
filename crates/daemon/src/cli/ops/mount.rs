use std::path::PathBuf;

use clap::Args;
use owo_colors::OwoColorize;

use pikaqfs::fuse::{MountError, MountManager};

#[derive(Args, Debug, Clone)]
pub struct Mount {
    /// Directory to mount the counter tree on
    pub mount_point: PathBuf,

    /// Comma-separated mount data (max_nodes=N,legacy_dir_mode; the rest is ignored)
    #[arg(short = 'o', long)]
    pub options: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MountOpError {
    #[error("mount failed: {0}")]
    Mount(#[from] MountError),
    #[error("signal handler failed: {0}")]
    Signal(std::io::Error),
    #[error("unmount task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mount {
    type Error = MountOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let data = self
            .options
            .clone()
            .unwrap_or_else(|| ctx.config.mount_options.clone());

        let manager = MountManager::new(ctx.config.mount_manager_config());
        let mount_id = manager.mount(&self.mount_point, &data)?;

        eprintln!(
            "{} pikaqfs at {} (Ctrl-C to unmount)",
            "Mounted".green().bold(),
            self.mount_point.display().to_string().bold()
        );

        tokio::signal::ctrl_c().await.map_err(MountOpError::Signal)?;
        tracing::info!("interrupt received, unmounting {}", mount_id);

        // Joining the session blocks until the kernel lets go
        tokio::task::spawn_blocking(move || manager.unmount_all()).await?;

        Ok(format!("Unmounted {}", self.mount_point.display()))
    }
}
