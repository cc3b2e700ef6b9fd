use std::path::PathBuf;

use clap::Parser;

use super::ops::Command;

#[derive(Parser, Debug)]
#[command(name = "pikaqfs", version, about = "Counter filesystem: every read of a file bumps its value")]
pub struct Args {
    /// Config directory (default: ~/.config/pikaqfs)
    #[arg(long, global = true, env = "PIKAQFS_CONFIG")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}
