//! yew_stripe_card/src/loader.rs
//!
//! Load an external script (Stripe.js) exactly once per page.
//!
//! # Overview
//! [`BrowserScriptLoader::load_script`] injects a single
//! `<script src="..." defer>` into `<head>` on first use and resolves when the
//! script's `load` event fires, or fails on its `error` event. Every later or
//! concurrent call for the same URL awaits the same load, including a load
//! that already failed.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys::{Function, Promise};
use web_sys::HtmlScriptElement;

use crate::error::PaymentError;

/// Loads external scripts.
#[async_trait(?Send)]
pub trait ScriptLoader {
    /// Resolve once the script at `url` has executed.
    async fn load_script(&self, url: &str) -> Result<(), PaymentError>;
}

thread_local! {
    static LOADS: RefCell<HashMap<String, Promise>> = RefCell::new(HashMap::new());
}

/// [`ScriptLoader`] that injects `<script>` tags into the current document.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BrowserScriptLoader;

#[async_trait(?Send)]
impl ScriptLoader for BrowserScriptLoader {
    async fn load_script(&self, url: &str) -> Result<(), PaymentError> {
        let promise = LOADS.with(|loads| {
            loads
                .borrow_mut()
                .entry(url.to_string())
                .or_insert_with(|| inject(url))
                .clone()
        });

        JsFuture::from(promise).await.map(|_| ()).map_err(|err| {
            let reason = err
                .as_string()
                .unwrap_or_else(|| format!("failed to load {url}"));
            PaymentError::ScriptLoad(reason)
        })
    }
}

/// Start loading `url`; the promise settles with the script's load/error event.
fn inject(url: &str) -> Promise {
    tracing::debug!(url, "injecting script");
    Promise::new(&mut |resolve: Function, reject: Function| {
        if let Err(err) = append_script(url, &resolve, &reject) {
            let _ = reject.call1(&JsValue::NULL, &err);
        }
    })
}

fn append_script(url: &str, onload: &Function, onerror: &Function) -> Result<(), JsValue> {
    let document = web_sys::window()
        .and_then(|win| win.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let script: HtmlScriptElement = document.create_element("script")?.dyn_into()?;
    script.set_src(url);
    script.set_defer(true);
    script.set_onload(Some(onload));
    script.set_onerror(Some(onerror));

    document
        .head()
        .ok_or_else(|| JsValue::from_str("head missing"))?
        .append_child(&script)?;
    Ok(())
}
