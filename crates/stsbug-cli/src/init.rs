use stsbug_common::settings::{init_config as store_config, Settings};

use crate::{error::StsBugCliResult, Cli};

/// Loads settings from `--settings` (or `--root`) and applies flag overrides.
pub fn init_config(cli: &Cli) -> StsBugCliResult<&'static Settings> {
    let root = cli.settings.clone().or_else(|| cli.root.clone());
    let mut settings = Settings::from_root(root)?;
    if let Some(log_level) = cli.log_level {
        settings.log_level = log_level;
    }
    Ok(store_config(settings)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;
    use crate::error::StsBugCliError;

    #[test]
    fn test_malformed_settings_file_is_reported() {
        let temp_root = tempfile::tempdir().unwrap();
        let path = temp_root.path().join("settings.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "log_level: loud").unwrap();

        let cli = Cli::try_parse_from(["stsbug", "-s", path.to_str().unwrap(), "info"]).unwrap();
        let err = init_config(&cli).unwrap_err();
        assert!(matches!(err, StsBugCliError::InitConfig(_)), "unexpected error {err:?}");
    }
}
