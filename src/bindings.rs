//! yew_stripe_card/src/bindings.rs
//!
//! Low-level wasm-bindgen bindings to the parts of Stripe.js v3 used by the
//! card payment step.
//!
//! Exposes the raw Stripe.js handles (`JsStripe`, `JsElements`, `JsCardElement`)
//! and their methods. Every call that can throw is bound with `catch` so a
//! missing or broken Stripe.js surfaces as `Err(JsValue)` instead of an
//! uncaught exception. Higher-level wrappers live in `sdk.rs`.

use wasm_bindgen::prelude::*;
use web_sys::js_sys::{Function, Promise};

#[wasm_bindgen]
extern "C" {
    //------------------------------------------------------------------------------
    // Core Types
    //------------------------------------------------------------------------------

    /// Raw Stripe.js client handle.
    #[wasm_bindgen(js_name = Stripe)]
    #[derive(Debug, Clone)]
    pub type JsStripe;

    /// Raw Elements factory handle.
    #[wasm_bindgen(js_name = Elements)]
    #[derive(Debug, Clone)]
    pub type JsElements;

    /// Raw card Element UI component handle.
    #[wasm_bindgen(js_name = CardElement)]
    #[derive(Debug, Clone)]
    pub type JsCardElement;

    //------------------------------------------------------------------------------
    // Constructors
    //------------------------------------------------------------------------------

    /// Construct a new `JsStripe` from a publishable key.
    ///
    /// ```js
    ///   const stripe = window.Stripe("pk_test_...");
    /// ```
    #[wasm_bindgen(catch, js_name = Stripe, js_namespace = window)]
    pub fn new_stripe(publishable_key: &str) -> Result<JsStripe, JsValue>;

    //------------------------------------------------------------------------------
    // Instance Methods
    //------------------------------------------------------------------------------

    /// `stripe.elements(options)` → `JsElements`
    #[wasm_bindgen(method, catch, js_name = elements)]
    pub fn elements(this: &JsStripe, options: JsValue) -> Result<JsElements, JsValue>;

    /// `elements.create("card", { style, hidePostalCode })` → `JsCardElement`
    #[wasm_bindgen(method, catch, js_name = create)]
    pub fn create_element(
        this: &JsElements,
        element_type: &str,
        options: JsValue,
    ) -> Result<JsCardElement, JsValue>;

    /// `card.mount(domElement)` → `()`
    #[wasm_bindgen(method, catch, js_name = mount)]
    pub fn mount(this: &JsCardElement, target: &web_sys::Element) -> Result<(), JsValue>;

    /// `card.on(event, handler)` → `()`
    #[wasm_bindgen(method, catch, js_name = on)]
    pub fn on(this: &JsCardElement, event: &str, handler: &Function) -> Result<(), JsValue>;

    /// `card.destroy()` → `()`
    #[wasm_bindgen(method, catch, js_name = destroy)]
    pub fn destroy(this: &JsCardElement) -> Result<(), JsValue>;

    /// `stripe.confirmCardPayment(clientSecret, data)` → JS `Promise`
    #[wasm_bindgen(method, catch, js_name = confirmCardPayment)]
    pub fn confirm_card_payment(
        this: &JsStripe,
        client_secret: &str,
        data: JsValue,
    ) -> Result<Promise, JsValue>;
}
