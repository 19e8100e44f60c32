//! Errors of the card payment step.
//!
//! Every variant ends up as display state (`init_error` / `card_error`) or,
//! for precondition violations, as the `Err` of `CardPayment::submit`.

use crate::sdk::StripeError;

/// Card payment error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentError {
    /// The publishable key could not be fetched
    #[error("Unable to retrieve the Stripe publishable key: {0}")]
    PublicKeyFetch(String),
    /// The payment session could not be created
    #[error("Unable to create the Stripe payment session: {0}")]
    SessionSecretFetch(String),
    /// Stripe.js could not be loaded
    #[error("Unable to load Stripe.js: {0}")]
    ScriptLoad(String),
    /// Nothing matches the card mount selector
    #[error("Card element target `{0}` not found")]
    MountTargetMissing(String),
    /// Stripe.js rejected a call
    #[error("Stripe error: {0}")]
    Sdk(#[from] StripeError),
    /// Amount is not a usable payment amount
    #[error("Invalid payment amount: {0}")]
    InvalidAmount(f64),
    /// No card element is mounted or the session secret is unknown
    #[error("Card payment is not ready")]
    NotReady,
    /// A confirmation was already started for this component
    #[error("Payment was already submitted")]
    AlreadySubmitted,
}
