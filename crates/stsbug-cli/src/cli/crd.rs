use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stsbug_common::settings::Settings;
use stsbug_operator::operator::crd::print_crd;

use crate::error::StsBugCliResult;

#[derive(Parser, Debug, Clone)]
pub struct CrdArgs {
    /// Write the YAML to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: CrdArgs, _config: &Settings) -> StsBugCliResult<()> {
    let yaml = print_crd()?;
    match args.output {
        Some(path) => std::fs::write(&path, yaml)
            .with_context(|| format!("unable to write {}", path.display()))?,
        None => print!("{yaml}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_crd_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crd.yaml");
        run(
            CrdArgs {
                output: Some(path.clone()),
            },
            &Settings::default(),
        )
        .await
        .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("kind: CustomResourceDefinition"));
    }
}
