use std::fmt;
use std::path::PathBuf;

use clap::Args;
use owo_colors::OwoColorize;

use pikaqfs::config::{Config, ConfigError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug)]
pub struct InitOutput {
    pub config_path: PathBuf,
    pub config: Config,
}

impl fmt::Display for InitOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} pikaqfs config at {}",
            "Initialized".green().bold(),
            self.config_path.display().to_string().bold()
        )?;
        writeln!(f, "  {} {}", "Log level:".dimmed(), self.config.log_level)?;
        writeln!(f, "  {} {}", "Allow other:".dimmed(), self.config.allow_other)?;
        write!(f, "  {} {}", "Auto unmount:".dimmed(), self.config.auto_unmount)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    Config(#[from] ConfigError),

    #[error("config already exists at {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = InitOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config_path = Config::config_file(ctx.config_path.clone())?;
        if config_path.exists() && !self.force {
            return Err(InitError::AlreadyExists(config_path));
        }

        let config = Config::default();
        config.save(&config_path)?;
        tracing::info!("wrote default config to {}", config_path.display());

        Ok(InitOutput {
            config_path,
            config,
        })
    }
}
