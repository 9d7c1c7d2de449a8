use std::time::Duration;

pub type StsBugOperatorResult<T = (), E = StsBugOperatorError> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum StsBugOperatorError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] anyhow::Error),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    /// Any error originating from the `kube-rs` crate
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid Kubernetes Yaml: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Found {count} statefulsets controlled by {namespace}/{name}, expected at most one")]
    MultipleDependents {
        namespace: String,
        name: String,
        count: usize,
    },

    #[error("Conflict writing {namespace}/{name}: {message}")]
    Conflict {
        namespace: String,
        name: String,
        message: String,
    },

    #[error("{namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("{dependent} is already controlled by {kind} {owner}")]
    AlreadyOwned {
        dependent: String,
        kind: String,
        owner: String,
    },

    #[error("Owner {0} has no uid yet")]
    MissingOwnerUid(String),

    #[error("Unable to register index {index}: {reason}")]
    IndexRegistration { index: String, reason: String },
}

impl StsBugOperatorError {
    /// Retryable errors are requeued with backoff. The rest wait for the
    /// next watch event on the key.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            StsBugOperatorError::MultipleDependents { .. }
                | StsBugOperatorError::IndexRegistration { .. }
                | StsBugOperatorError::Yaml { .. }
        )
    }

    pub fn requeue_delay(&self, base: Duration) -> Option<Duration> {
        self.is_retryable().then_some(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StsBugOperatorError::MultipleDependents {
            namespace: "ns".to_string(),
            name: "foo".to_string(),
            count: 2,
        };
        assert!(err.to_string().contains("ns/foo"));
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_retryable_errors() {
        let conflict = StsBugOperatorError::Conflict {
            namespace: "ns".to_string(),
            name: "foo".to_string(),
            message: "stale".to_string(),
        };
        assert!(conflict.is_retryable());

        let owned = StsBugOperatorError::AlreadyOwned {
            dependent: "foo".to_string(),
            kind: "Other".to_string(),
            owner: "bar".to_string(),
        };
        assert!(owned.is_retryable());

        let multiple = StsBugOperatorError::MultipleDependents {
            namespace: "ns".to_string(),
            name: "foo".to_string(),
            count: 3,
        };
        assert!(!multiple.is_retryable());
    }

    #[test]
    fn test_requeue_delay() {
        let base = Duration::from_secs(5);
        let retryable = StsBugOperatorError::MissingOwnerUid("ns/foo".to_string());
        assert_eq!(retryable.requeue_delay(base), Some(base));

        let terminal = StsBugOperatorError::IndexRegistration {
            index: String::new(),
            reason: "empty".to_string(),
        };
        assert_eq!(terminal.requeue_delay(base), None);
    }
}
