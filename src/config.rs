//! Configuration of the card payment step.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::sdk::{CardElementOptions, ConfirmCardPaymentParams};

/// Stripe.js v3 location.
pub const STRIPE_JS_URL: &str = "https://js.stripe.com/v3/";

/// Selector of the node the card element is mounted into.
pub const DEFAULT_CARD_SELECTOR: &str = ".card-element";

/// Settings for [`CardPayment`](crate::CardPayment) and the
/// [`StripeCardPayment`](crate::StripeCardPayment) component.
///
/// Every field has a default, so hosts only override what they need:
///
/// ```rust
/// use yew_stripe_card::CardPaymentConfig;
///
/// let config = CardPaymentConfig::from_json(
///     r#"{ "session_secret_url": "/api/stripe/payment-intents" }"#,
/// ).unwrap();
/// assert_eq!(config.script_url, "https://js.stripe.com/v3/");
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CardPaymentConfig {
    /// Where Stripe.js is loaded from.
    pub script_url: String,
    /// CSS selector of the card mount target.
    pub card_selector: String,
    /// Style map passed to the card element.
    pub card_style: serde_json::Value,
    /// Hide the postal code field.
    pub hide_postal_code: bool,
    /// `setup_future_usage` sent with the confirmation.
    pub setup_future_usage: Option<String>,
    /// Endpoint returning `{ "data": "<publishable key>" }`.
    pub public_key_url: String,
    /// Endpoint creating the payment session, returning `{ "data": "<client secret>" }`.
    pub session_secret_url: String,
}

impl Default for CardPaymentConfig {
    fn default() -> Self {
        Self {
            script_url: STRIPE_JS_URL.to_string(),
            card_selector: DEFAULT_CARD_SELECTOR.to_string(),
            card_style: default_card_style(),
            hide_postal_code: true,
            setup_future_usage: Some("off_session".to_string()),
            public_key_url: "/api/stripe/public-key".to_string(),
            session_secret_url: "/api/stripe/payment-intent".to_string(),
        }
    }
}

impl CardPaymentConfig {
    /// Parse host-supplied JSON; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub(crate) fn card_options(&self) -> CardElementOptions {
        CardElementOptions {
            style: self.card_style.clone(),
            hide_postal_code: self.hide_postal_code,
        }
    }

    pub(crate) fn confirm_params(&self) -> ConfirmCardPaymentParams {
        ConfirmCardPaymentParams {
            setup_future_usage: self.setup_future_usage.clone(),
        }
    }
}

fn default_card_style() -> serde_json::Value {
    json!({
        "base": {
            "color": "#32325d",
            "lineHeight": "18px",
            "fontFamily": "\"Helvetica Neue\", Helvetica, sans-serif",
            "fontSmoothing": "antialiased",
            "fontSize": "16px",
            "::placeholder": {
                "color": "#aab7c4"
            }
        },
        "invalid": {
            "color": "#fa755a",
            "iconColor": "#fa755a"
        }
    })
}
