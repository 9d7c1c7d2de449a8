pub type StsBugResult<T = (), E = StsBugError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum StsBugError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Config not initialized")]
    ConfigNotInitialized,
    #[error("Config already initialized")]
    ConfigAlreadyInitialized,
    #[error("Runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
    #[error("Command error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
    /// Any error originating from the `kube-rs` crate
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },
    #[error("Invalid Json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("Invalid Kubernetes Yaml: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}
