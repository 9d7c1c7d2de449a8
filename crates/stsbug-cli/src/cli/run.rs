use clap::Parser;
use stsbug_common::{info, settings::Settings};

use crate::error::StsBugCliResult;

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Namespace to watch, all namespaces when unset
    #[arg(short, long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Maximum number of owners reconciled in parallel
    #[arg(short, long)]
    pub concurrency: Option<u16>,
}

pub async fn run(args: RunArgs, config: &Settings) -> StsBugCliResult<()> {
    let mut operator = config.operator.clone();
    if let Some(namespace) = args.namespace.filter(|namespace| !namespace.is_empty()) {
        operator.namespace = Some(namespace);
    }
    if let Some(concurrency) = args.concurrency {
        operator.concurrency = concurrency;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting stsbug operator");
    stsbug_operator::operator(&operator).await?;
    Ok(())
}
