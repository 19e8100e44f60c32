//! A Yew card payment step for your flow to drop in.
//!
//! This component fetches the Stripe publishable key and a payment session
//! from your backend, loads Stripe.js, mounts a card element, confirms the
//! payment on click and then tells the flow to move on.

use std::rc::Rc;

use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::backend::HttpBackend;
use crate::components::{Button, ConfirmationModal, DEFAULT_MODAL_TITLE};
use crate::config::CardPaymentConfig;
use crate::flow::WorkflowBridge;
use crate::loader::BrowserScriptLoader;
use crate::outcome::PaymentOutcome;
use crate::payment::CardPayment;
use crate::sdk::BrowserStripe;

/// Properties for the [`StripeCardPayment`] component.
///
/// # Fields
///
/// * `amount` – Amount to charge. The payment session is created once it is set;
///   later changes are ignored.
/// * `config` – Endpoints, Stripe.js location and card styling.
/// * `on_next` – Emitted once after the confirmation, whatever its outcome.
/// * `on_outcome` – Receives the classified [`PaymentOutcome`] right before `on_next`.
/// * `modal_title` / `modal_message` – Text for the result dialog. The message
///   defaults to the outcome's result text.
/// * `button_label` – Override the Pay button text (default: `"Pay"`).
/// * `children` – Extra Yew nodes (e.g. order summary) rendered above the card.
#[derive(Properties, PartialEq, Clone)]
pub struct StripeCardPaymentProps {
    #[prop_or_default]
    pub amount: Option<f64>,
    #[prop_or_default]
    pub config: CardPaymentConfig,
    #[prop_or_default]
    pub on_next: Callback<()>,
    #[prop_or_default]
    pub on_outcome: Callback<PaymentOutcome>,
    #[prop_or_default]
    pub modal_title: Option<String>,
    #[prop_or_default]
    pub modal_message: Option<String>,
    #[prop_or_default]
    pub button_label: Option<String>,
    #[prop_or_default]
    pub children: Children,
}

/// Yew function component rendering the card payment step.
///
/// Props are read once, on first render, except `amount`: a host may supply
/// it later, and the first amount to arrive creates the payment session.
///
/// # Example
///
/// ```rust,ignore
/// use yew::prelude::*;
/// use yew_stripe_card::{PaymentOutcome, StripeCardPayment};
///
/// #[function_component(PaymentStep)]
/// fn payment_step() -> Html {
///     let on_outcome = Callback::from(|outcome: PaymentOutcome| {
///         tracing::info!(?outcome, "payment finished");
///     });
///     let on_next = Callback::from(|()| {
///         // hand control back to the flow
///     });
///
///     html! {
///         <StripeCardPayment amount={Some(49.0)} {on_outcome} {on_next}>
///             <p>{ "Annual plan – 49.00 €" }</p>
///         </StripeCardPayment>
///     }
/// }
/// ```
#[function_component(StripeCardPayment)]
pub fn stripe_card_payment(props: &StripeCardPaymentProps) -> Html {
    let payment = {
        let props = props.clone();
        use_memo((), move |_| {
            let bridge =
                WorkflowBridge::new(props.on_next.clone()).with_outcome(props.on_outcome.clone());
            CardPayment::new(
                props.config.clone(),
                props.amount,
                Rc::new(HttpBackend::from_config(&props.config)),
                Rc::new(BrowserScriptLoader),
                BrowserStripe,
                bridge,
            )
        })
    };
    let rerender = use_force_update();

    // Fetch credentials and mount once the card target is in the DOM
    {
        let payment = payment.clone();
        use_effect_with((), move |_| {
            let subscription = payment.subscribe(move |_| rerender.force_update());
            let runner = (*payment).clone();
            spawn_local(async move { runner.start().await });
            move || {
                drop(subscription);
                payment.teardown();
            }
        });
    }

    // Late amount
    {
        let payment = payment.clone();
        use_effect_with(props.amount, move |amount| {
            let amount = *amount;
            if amount.is_some() {
                let payment = (*payment).clone();
                spawn_local(async move { payment.set_amount(amount).await });
            }
        });
    }

    let state = payment.state();

    let on_pay = {
        let payment = payment.clone();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            let payment = (*payment).clone();
            spawn_local(async move {
                if let Err(err) = payment.submit().await {
                    tracing::warn!(%err, "payment submission rejected");
                }
            });
        })
    };

    let on_close = {
        let payment = payment.clone();
        Callback::from(move |()| payment.close_modal())
    };

    let (mount_id, mount_class) = mount_attributes(&props.config.card_selector);
    let label = if state.is_confirming {
        "Processing…".to_string()
    } else {
        props.button_label.clone().unwrap_or_else(|| "Pay".to_string())
    };
    let modal_title = props
        .modal_title
        .clone()
        .unwrap_or_else(|| DEFAULT_MODAL_TITLE.to_string());
    let modal_message = props
        .modal_message
        .clone()
        .or_else(|| state.outcome.result_text.clone())
        .or_else(|| state.outcome.status_code.clone())
        .unwrap_or_default();

    html! {
        <div class="ysc-card-payment">
            { for props.children.iter() }
            if let Some(msg) = &state.init_error {
                <div class="ysc-init-error" role="alert">{ msg }</div>
            }
            if state.is_loading {
                <div class="ysc-spinner">{ "Loading…" }</div>
            }
            <div id={mount_id} class={classes!(mount_class)} />
            <div class="card-errors" role="alert">
                { state.card_error.clone().unwrap_or_default() }
            </div>
            <Button {label} onclick={on_pay} disabled={!state.can_submit()} />
            if state.show_modal {
                <ConfirmationModal title={modal_title} message={modal_message} {on_close} />
            }
        </div>
    }
}

/// `id`/`class` to give the rendered mount node so `selector` finds it.
/// Other selectors must be satisfied by the host's own markup.
fn mount_attributes(selector: &str) -> (Option<String>, Option<String>) {
    if let Some(id) = selector.strip_prefix('#') {
        (Some(id.to_string()), None)
    } else if let Some(class) = selector.strip_prefix('.') {
        (None, Some(class.to_string()))
    } else {
        (None, None)
    }
}
