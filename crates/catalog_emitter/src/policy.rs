use tracing::warn;

use crate::{EmitError, Urn};

/// What the caller does with a failed emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Propagate the error and abort the batch.
    #[default]
    Hard,
    /// Log the error and continue with an empty URN.
    Soft,
}

impl FailurePolicy {
    #[must_use]
    pub const fn from_hard_fail(hard_fail: bool) -> Self {
        if hard_fail { Self::Hard } else { Self::Soft }
    }

    /// Resolves an emission result into a URN string according to the policy.
    ///
    /// # Errors
    ///
    /// Returns the emission error under [`FailurePolicy::Hard`].
    pub fn settle(self, result: Result<Urn, EmitError>, what: &str) -> Result<String, EmitError> {
        match (result, self) {
            (Ok(urn), _) => Ok(urn.into()),
            (Err(error), Self::Hard) => Err(error),
            (Err(error), Self::Soft) => {
                warn!(what, %error, "Emission failed, continuing");
                Ok(String::new())
            }
        }
    }

    /// Same as [`FailurePolicy::settle`] for operations without a URN.
    ///
    /// # Errors
    ///
    /// Returns the emission error under [`FailurePolicy::Hard`].
    pub fn settle_unit(self, result: Result<(), EmitError>, what: &str) -> Result<bool, EmitError> {
        match (result, self) {
            (Ok(()), _) => Ok(true),
            (Err(error), Self::Hard) => Err(error),
            (Err(error), Self::Soft) => {
                warn!(what, %error, "Emission failed, continuing");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityKind;

    fn failure() -> Result<Urn, EmitError> {
        Err(EmitError::Status {
            status: 500,
            body: String::new(),
        })
    }

    #[test]
    fn test_hard_policy_propagates() {
        assert!(FailurePolicy::Hard.settle(failure(), "model").is_err());
        let edge = Err(EmitError::InvalidUrn(String::new()));
        assert!(FailurePolicy::from_hard_fail(true).settle_unit(edge, "edge").is_err());
    }

    #[test]
    fn test_soft_policy_yields_empty_urn() {
        assert_eq!(FailurePolicy::Soft.settle(failure(), "model").unwrap(), "");
        let edge = Err(EmitError::InvalidUrn(String::new()));
        assert!(!FailurePolicy::from_hard_fail(false).settle_unit(edge, "edge").unwrap());
    }

    #[test]
    fn test_success_passes_through() {
        let urn = Urn::new(EntityKind::MlModel, "llm", "m", "PROD").unwrap();
        let expected = urn.to_string();

        for policy in [FailurePolicy::Hard, FailurePolicy::Soft] {
            assert_eq!(policy.settle(Ok(urn.clone()), "model").unwrap(), expected);
        }
    }
}
