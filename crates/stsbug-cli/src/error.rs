use stsbug_common::error::StsBugError;
use stsbug_operator::error::StsBugOperatorError;
use thiserror::Error;

pub type StsBugCliResult<T = (), E = StsBugCliError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum StsBugCliError {
    #[error("Unable to initialize config: {0}")]
    InitConfig(#[from] StsBugError),
    #[error("Unable to run command: {0}")]
    Command(#[from] clap::error::Error),
    #[error("Operator error: {0}")]
    Operator(#[from] StsBugOperatorError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
}
