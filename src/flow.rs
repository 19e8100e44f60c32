//! Outbound signals to the host flow.

use yew::Callback;

use crate::outcome::PaymentOutcome;

/// Tells the host flow to move to its next step.
///
/// `advance` carries no payload; the host reads the outcome from
/// `on_outcome` or from the component state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowBridge {
    on_next: Callback<()>,
    on_outcome: Callback<PaymentOutcome>,
}

impl WorkflowBridge {
    pub fn new(on_next: Callback<()>) -> Self {
        Self {
            on_next,
            on_outcome: Callback::default(),
        }
    }

    /// Also publish each classified outcome to `on_outcome`.
    pub fn with_outcome(mut self, on_outcome: Callback<PaymentOutcome>) -> Self {
        self.on_outcome = on_outcome;
        self
    }

    pub(crate) fn publish(&self, outcome: &PaymentOutcome) {
        self.on_outcome.emit(outcome.clone());
    }

    /// Emit the "next step" signal.
    pub fn advance(&self) {
        tracing::info!("advancing flow to next step");
        self.on_next.emit(());
    }
}
