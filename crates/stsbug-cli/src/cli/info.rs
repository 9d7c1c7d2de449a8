use clap::Parser;
use stsbug_common::settings::Settings;

use crate::error::StsBugCliResult;

#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {}

pub async fn run(_args: InfoArgs, config: &Settings) -> StsBugCliResult<()> {
    println!("{}", version_line());
    println!(
        "namespace: {}",
        config.operator.namespace.as_deref().unwrap_or("all")
    );
    Ok(())
}

fn version_line() -> String {
    let sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown");
    format!(
        "{} {} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
        sha.get(..8).unwrap_or(sha)
    )
}
