//! Classification of a confirmation into the values the host flow reads.

use serde::{Deserialize, Serialize};

use crate::sdk::PaymentResult;

/// `statusCode` reported for an accepted payment.
pub const SUCCESS_STATUS_CODE: &str = "200";
/// `resultText` for an accepted payment.
pub const PAYMENT_SUCCESS: &str = "Payment success";
/// `resultText` for a PaymentIntent that ended in any other status.
pub const PAYMENT_FAILED: &str = "Payment failed";

/// PaymentIntent statuses treated as a successful payment.
pub const SUCCESS_STATUSES: [&str; 2] = ["succeeded", "requires_capture"];

/// Coarse result shown to the host flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMessage {
    Success,
    Error,
}

/// Values published to the host after a confirmation.
///
/// Fields a branch does not write keep their previous value, so they start
/// out as `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub message: Option<PaymentMessage>,
    pub status_code: Option<String>,
    pub result_text: Option<String>,
}

/// Where the confirmation of this component stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfirmationPhase {
    #[default]
    Idle,
    AwaitingConfirmation,
    Succeeded,
    /// Stripe reported an error, typically a declined card.
    Declined,
    /// A PaymentIntent came back with a status outside [`SUCCESS_STATUSES`].
    FailedOther,
    /// The host flow was told to advance.
    Navigated,
}

/// Fold `result` into `outcome` and return the terminal phase it maps to.
///
/// A non-success status leaves `message` as it was.
pub fn classify(result: &PaymentResult, outcome: &mut PaymentOutcome) -> ConfirmationPhase {
    match result {
        PaymentResult::Error(err) => {
            outcome.message = Some(PaymentMessage::Error);
            outcome.status_code = Some(err.message.clone());
            ConfirmationPhase::Declined
        }
        PaymentResult::Success(intent) if SUCCESS_STATUSES.contains(&intent.status.as_str()) => {
            outcome.message = Some(PaymentMessage::Success);
            outcome.status_code = Some(SUCCESS_STATUS_CODE.to_string());
            outcome.result_text = Some(PAYMENT_SUCCESS.to_string());
            ConfirmationPhase::Succeeded
        }
        PaymentResult::Success(intent) => {
            outcome.status_code = Some(intent.status.clone());
            outcome.result_text = Some(PAYMENT_FAILED.to_string());
            ConfirmationPhase::FailedOther
        }
    }
}
