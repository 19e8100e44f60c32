//! Card payment step for guided flows, built on Yew and Stripe.js.
//!
//! [`StripeCardPayment`] is the drop-in component. Underneath it,
//! [`CardPayment`] runs the credential fetches, the one-time Stripe.js
//! bootstrap and the confirmation against any [`StripeJs`],
//! [`ScriptLoader`] and [`CredentialBackend`] implementation.

mod amount;
mod backend;
mod bindings;
mod card_component;
mod components;
mod config;
mod credential;
mod error;
mod flow;
pub mod gate;
mod loader;
mod outcome;
mod payment;
mod sdk;
mod store;

pub use amount::*;
pub use backend::*;
pub use bindings::*;
pub use card_component::*;
pub use components::*;
pub use config::*;
pub use credential::*;
pub use error::*;
pub use flow::*;
pub use gate::BootstrapState;
pub use loader::*;
pub use outcome::*;
pub use payment::*;
pub use sdk::*;
pub use store::*;
