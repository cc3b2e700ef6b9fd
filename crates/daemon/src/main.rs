use clap::Parser;
use owo_colors::OwoColorize;

mod cli;

use cli::args::Args;
use cli::op::{Op, OpContext};
use pikaqfs::{logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load_from(args.config_path.clone())?;
    let _log_guard = logging::init(&config);

    let ctx = OpContext {
        config_path: args.config_path.clone(),
        config,
    };

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
