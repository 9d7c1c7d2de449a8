use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use stsbug_common::util::tracing::{reload_level, setup_tracing};
use stsbug_common::warn;

use crate::{error::StsBugCliResult, init::init_config};

mod crd;
mod info;
mod run;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Overrides `log_level` from the settings file
    #[clap(short('l'), long, value_name("LEVEL"))]
    pub log_level: Option<LevelFilter>,

    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    #[command(about = "Show information about stsbug")]
    Info(info::InfoArgs),
    #[command(about = "Print the StsBug CustomResourceDefinition")]
    Crd(crd::CrdArgs),
    #[command(about = "Run the StsBug controller")]
    Run(run::RunArgs),
}

pub async fn exec() -> StsBugCliResult {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let logging = setup_tracing(cli.log_level);
    let cfg = init_config(&cli)?;
    if let Some(handle) = &logging {
        if let Err(err) = reload_level(handle, cfg.log_level) {
            warn!(error = %err, "unable to apply configured log level");
        }
    }

    match cli.cmd {
        Command::Info(args) => info::run(args, cfg).await?,
        Command::Crd(args) => crd::run(args, cfg).await?,
        Command::Run(args) => run::run(args, cfg).await?,
    }
    Ok(())
}
