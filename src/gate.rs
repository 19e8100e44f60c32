//! Initialization gate: starts the card widget bootstrap at most once, and
//! only after both credentials resolved.

use crate::credential::CredentialState;

/// Progress of the one-time Stripe.js bootstrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BootstrapState {
    #[default]
    NotStarted,
    InProgress,
    Ready,
    Failed,
}

/// Move `state` from `NotStarted` to `InProgress` if both credentials are
/// resolved, handing back the publishable key to bootstrap with.
///
/// Returns `None`, and changes nothing, in every other case. Callers hold the
/// only mutable borrow of `state` for the duration of the check, so two
/// completions landing in the same turn cannot both win.
pub fn try_begin(
    state: &mut BootstrapState,
    public_key: &CredentialState<String>,
    session_secret: &CredentialState<String>,
) -> Option<String> {
    if *state != BootstrapState::NotStarted || !session_secret.is_resolved() {
        return None;
    }
    let key = public_key.value()?.clone();
    *state = BootstrapState::InProgress;
    Some(key)
}

/// Settle an in-progress bootstrap. Ignored in any other state.
pub fn finish(state: &mut BootstrapState, ready: bool) {
    if *state == BootstrapState::InProgress {
        *state = if ready {
            BootstrapState::Ready
        } else {
            BootstrapState::Failed
        };
    }
}
