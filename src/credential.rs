//! One-shot credential state.

/// Result of fetching one prerequisite (publishable key or session secret).
///
/// Moves forward only: `Pending → Resolved` or `Pending → Failed`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CredentialState<T> {
    /// Fetch not completed yet.
    #[default]
    Pending,
    /// Fetch returned a value.
    Resolved(T),
    /// Fetch failed, with a displayable reason.
    Failed(String),
}

impl<T> CredentialState<T> {
    /// Record the fetched value. Returns `false` if the state already settled.
    pub fn resolve(&mut self, value: T) -> bool {
        if !self.is_pending() {
            return false;
        }
        *self = CredentialState::Resolved(value);
        true
    }

    /// Record a failure. Returns `false` if the state already settled.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if !self.is_pending() {
            return false;
        }
        *self = CredentialState::Failed(reason.into());
        true
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CredentialState::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, CredentialState::Resolved(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            CredentialState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CredentialState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
