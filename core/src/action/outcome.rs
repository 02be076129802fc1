/// What an action reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    /// The action cannot do this automatically; a human should take over.
    NotImplemented { message: String, allow_retry: bool },
    /// The action tried and failed.
    Failure {
        message: String,
        detail: Option<String>,
    },
}

impl ActionOutcome {
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
            allow_retry: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            detail: None,
        }
    }

    /// Failure carrying the whole error chain as detail.
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::Failure {
            message: err.to_string(),
            detail: Some(format!("{err:?}")),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<anyhow::Result<()>> for ActionOutcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) => Self::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_from_result_keeps_chain() {
        let result: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"))
            .context("failed to reach the streaming platform");
        match ActionOutcome::from(result) {
            ActionOutcome::Failure { message, detail } => {
                assert_eq!(message, "failed to reach the streaming platform");
                assert!(detail.unwrap().contains("connection refused"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(ActionOutcome::from(Ok(())).is_success());
    }
}
