//! yew_stripe_card/src/sdk.rs
//!
//! The Stripe.js surface consumed by the card payment step, expressed as the
//! [`StripeJs`] trait so the orchestration in `payment.rs` never reaches for
//! `window.Stripe` directly.
//!
//! This module provides:
//! - `CardElementOptions` for `elements.create("card", ...)` (opaque style map + postal code flag).
//! - `ConfirmCardPaymentParams` for `stripe.confirmCardPayment(secret, data)`.
//! - `PaymentResult` / `PaymentIntentInfo` / `StripeError`, the typed confirmation outcome.
//! - `CardChangeEvent`, the payload of the card element's `change` event.
//! - `BrowserStripe`, the implementation backed by the wasm-bindgen handles in `bindings.rs`.

use std::cell::RefCell;

use async_trait::async_trait;
use gloo_utils::format::JsValueSerdeExt;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys::{Object, Reflect};

use crate::bindings::{new_stripe, JsCardElement, JsStripe};

/// Customization for `elements.create("card", ...)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CardElementOptions {
    /// Style map handed to Stripe.js as-is (`base`, `invalid`, ...).
    pub style: serde_json::Value,

    /// Hide the postal code field of the card element.
    #[serde(rename = "hidePostalCode")]
    pub hide_postal_code: bool,
}

/// Extra data for `stripe.confirmCardPayment(clientSecret, data)`.
///
/// The card element itself is attached as `payment_method.card` by the
/// [`StripeJs`] implementation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ConfirmCardPaymentParams {
    /// Keep the payment method for later use, e.g. `"off_session"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_future_usage: Option<String>,
}

/// Minimal representation of a confirmed PaymentIntent.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PaymentIntentInfo {
    /// Stripe's identifier, e.g. `pi_1Fxxxxxx`.
    #[serde(default)]
    pub id: String,
    /// Status reported by Stripe, e.g. `"succeeded"` or `"requires_action"`.
    #[serde(default)]
    pub status: String,
}

/// Strongly-typed outcome of `confirmCardPayment`.
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentResult {
    /// The call returned a PaymentIntent. Its status still has to be inspected.
    Success(PaymentIntentInfo),
    /// Stripe reported an error (declined card, network failure, ...).
    Error(StripeError),
}

impl PaymentResult {
    /// Interpret the resolved value of `confirmCardPayment`, which is either
    /// `{ error }` or `{ paymentIntent }`.
    pub fn from_response(value: serde_json::Value) -> Self {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            #[serde(default)]
            error: Option<StripeError>,
            #[serde(default)]
            payment_intent: Option<PaymentIntentInfo>,
        }

        match serde_json::from_value::<Response>(value) {
            Ok(Response { error: Some(err), .. }) => PaymentResult::Error(err),
            Ok(Response { payment_intent: Some(intent), .. }) => PaymentResult::Success(intent),
            Ok(_) => PaymentResult::Error(StripeError::new(
                "confirmCardPayment returned neither an error nor a paymentIntent",
            )),
            Err(err) => PaymentResult::Error(StripeError::new(err.to_string())),
        }
    }
}

/// Representation of a Stripe.js error object.
#[derive(Clone, Debug, Deserialize, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct StripeError {
    /// Human-readable message.
    pub message: String,
    /// Stripe's error type, e.g. `"card_error"`.
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Optional Stripe error code, e.g. `"card_declined"`.
    #[serde(default)]
    pub code: Option<String>,
}

impl StripeError {
    /// Error with a message and no Stripe type or code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            code: None,
        }
    }
}

/// Payload of the card element's `change` event.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CardChangeEvent {
    /// Validation error for the current input, if any.
    #[serde(default)]
    pub error: Option<StripeError>,
    /// Whether the card details are complete.
    #[serde(default)]
    pub complete: bool,
    /// Whether the field is empty.
    #[serde(default)]
    pub empty: bool,
}

/// The Stripe.js surface and the DOM it mounts into.
///
/// Implementations are single-threaded; none of the associated handles need
/// to be `Send`.
#[async_trait(?Send)]
pub trait StripeJs: 'static {
    /// Client constructed from a publishable key.
    type Client: 'static;
    /// Mounted card element.
    type Card: 'static;
    /// DOM-like node the card is mounted into.
    type Target;

    /// Look up the mount target, `None` if it is not rendered.
    fn find_target(&self, selector: &str) -> Option<Self::Target>;

    /// Construct a client from a publishable key.
    fn client(&self, publishable_key: &str) -> Result<Self::Client, StripeError>;

    /// Create an (unmounted) card element.
    fn create_card(
        &self,
        client: &Self::Client,
        options: &CardElementOptions,
    ) -> Result<Self::Card, StripeError>;

    /// Mount a card element into `target`.
    fn mount(&self, card: &Self::Card, target: &Self::Target) -> Result<(), StripeError>;

    /// Subscribe to the card element's `change` events.
    fn on_change(
        &self,
        card: &Self::Card,
        handler: Box<dyn Fn(CardChangeEvent)>,
    ) -> Result<(), StripeError>;

    /// Unmount and release the card element.
    fn destroy(&self, card: &Self::Card);

    /// Confirm the PaymentIntent behind `client_secret` using `card`.
    async fn confirm_card_payment(
        &self,
        client: &Self::Client,
        card: &Self::Card,
        client_secret: &str,
        params: &ConfirmCardPaymentParams,
    ) -> PaymentResult;
}

/// [`StripeJs`] backed by the global `window.Stripe` and the page DOM.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BrowserStripe;

/// A mounted card element together with its `change` listener.
///
/// The listener lives as long as the handle; dropping it after `destroy()`
/// releases the closure.
pub struct BrowserCard {
    element: JsCardElement,
    listener: RefCell<Option<Closure<dyn FnMut(JsValue)>>>,
}

impl std::fmt::Debug for BrowserCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserCard")
            .field("element", &self.element)
            .field("listening", &self.listener.borrow().is_some())
            .finish()
    }
}

#[async_trait(?Send)]
impl StripeJs for BrowserStripe {
    type Client = JsStripe;
    type Card = BrowserCard;
    type Target = web_sys::Element;

    fn find_target(&self, selector: &str) -> Option<web_sys::Element> {
        web_sys::window()?
            .document()?
            .query_selector(selector)
            .ok()
            .flatten()
    }

    fn client(&self, publishable_key: &str) -> Result<JsStripe, StripeError> {
        new_stripe(publishable_key).map_err(js_to_stripe_error)
    }

    fn create_card(
        &self,
        client: &JsStripe,
        options: &CardElementOptions,
    ) -> Result<BrowserCard, StripeError> {
        let elements = client
            .elements(JsValue::undefined())
            .map_err(js_to_stripe_error)?;
        let options_js = card_options_js(options)?;
        let element = elements
            .create_element("card", options_js)
            .map_err(js_to_stripe_error)?;
        Ok(BrowserCard {
            element,
            listener: RefCell::new(None),
        })
    }

    fn mount(&self, card: &BrowserCard, target: &web_sys::Element) -> Result<(), StripeError> {
        card.element.mount(target).map_err(js_to_stripe_error)
    }

    fn on_change(
        &self,
        card: &BrowserCard,
        handler: Box<dyn Fn(CardChangeEvent)>,
    ) -> Result<(), StripeError> {
        let listener = Closure::wrap(Box::new(move |event: JsValue| {
            match event.into_serde::<CardChangeEvent>() {
                Ok(event) => handler(event),
                Err(err) => tracing::warn!(%err, "unreadable card change event"),
            }
        }) as Box<dyn FnMut(JsValue)>);

        card.element
            .on("change", listener.as_ref().unchecked_ref())
            .map_err(js_to_stripe_error)?;
        *card.listener.borrow_mut() = Some(listener);
        Ok(())
    }

    fn destroy(&self, card: &BrowserCard) {
        if let Err(err) = card.element.destroy() {
            tracing::warn!(error = %js_to_stripe_error(err), "card element destroy failed");
        }
        card.listener.borrow_mut().take();
    }

    async fn confirm_card_payment(
        &self,
        client: &JsStripe,
        card: &BrowserCard,
        client_secret: &str,
        params: &ConfirmCardPaymentParams,
    ) -> PaymentResult {
        let data = match confirm_data(card, params) {
            Ok(data) => data,
            Err(err) => return PaymentResult::Error(err),
        };

        // Call stripe.confirmCardPayment(...)
        let promise = match client.confirm_card_payment(client_secret, data.into()) {
            Ok(p) => p,
            Err(e) => return PaymentResult::Error(js_to_stripe_error(e)),
        };

        // Await the JS Promise
        match JsFuture::from(promise).await {
            Ok(js_val) => match js_val.into_serde::<serde_json::Value>() {
                Ok(value) => PaymentResult::from_response(value),
                Err(err) => PaymentResult::Error(StripeError::new(err.to_string())),
            },
            Err(js_err) => PaymentResult::Error(js_to_stripe_error(js_err)),
        }
    }
}

/// Build `{ payment_method: { card }, setup_future_usage }`.
fn confirm_data(card: &BrowserCard, params: &ConfirmCardPaymentParams) -> Result<Object, StripeError> {
    let payment_method = Object::new();
    Reflect::set(
        &payment_method,
        &JsValue::from_str("card"),
        card.element.as_ref(),
    )
    .map_err(js_to_stripe_error)?;

    let data = Object::new();
    Reflect::set(&data, &JsValue::from_str("payment_method"), &payment_method)
        .map_err(js_to_stripe_error)?;
    if let Some(usage) = &params.setup_future_usage {
        Reflect::set(
            &data,
            &JsValue::from_str("setup_future_usage"),
            &JsValue::from_str(usage),
        )
        .map_err(js_to_stripe_error)?;
    }
    Ok(data)
}

/// Convert any caught `JsValue` into a `StripeError` with best effort.
pub(crate) fn js_to_stripe_error(value: JsValue) -> StripeError {
    serde_wasm_bindgen::from_value::<StripeError>(value.clone()).unwrap_or_else(|_| {
        StripeError::new(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
    })
}

/// Stripe.js reads the style as a plain object. The default
/// `serde_wasm_bindgen` serializer turns the `serde_json` map into a JS `Map`,
/// so the JSON-compatible serializer is required here.
fn card_options_js(options: &CardElementOptions) -> Result<JsValue, StripeError> {
    options
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(serde_error_to_stripe_error)
}

/// Convert a `serde_wasm_bindgen::Error` into `StripeError`.
fn serde_error_to_stripe_error(err: serde_wasm_bindgen::Error) -> StripeError {
    StripeError::new(err.to_string())
}
