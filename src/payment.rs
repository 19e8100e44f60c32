//! Card payment orchestration.
//!
//! [`CardPayment`] fetches the publishable key and the session secret
//! concurrently, bootstraps Stripe.js once both are known, mounts the card
//! element, confirms the payment on submit and advances the host flow.
//!
//! Everything runs on one thread. Fetch completions may land in any order,
//! including the same turn; the bootstrap gate in `gate.rs` is checked and
//! flipped inside a single store update, which is what keeps bootstrap
//! at-most-once.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::join;
use tracing::{debug, error, info, warn};

use crate::amount::Amount;
use crate::backend::CredentialBackend;
use crate::config::CardPaymentConfig;
use crate::credential::CredentialState;
use crate::error::PaymentError;
use crate::flow::WorkflowBridge;
use crate::gate::{self, BootstrapState};
use crate::loader::ScriptLoader;
use crate::outcome::{classify, ConfirmationPhase, PaymentOutcome};
use crate::sdk::{CardChangeEvent, PaymentResult, StripeJs};
use crate::store::{Store, Subscription};

/// Observable state of one card payment component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaymentState {
    pub public_key: CredentialState<String>,
    pub session_secret: CredentialState<String>,
    pub bootstrap: BootstrapState,
    /// Load-level error: failed fetch, script load or mount.
    pub init_error: Option<String>,
    /// Inline card error: validation errors and declines.
    pub card_error: Option<String>,
    /// Prerequisites or bootstrap in flight.
    pub is_loading: bool,
    /// Confirmation in flight.
    pub is_confirming: bool,
    pub phase: ConfirmationPhase,
    pub outcome: PaymentOutcome,
    pub show_modal: bool,
}

impl PaymentState {
    /// Whether `submit` would be accepted.
    pub fn can_submit(&self) -> bool {
        self.bootstrap == BootstrapState::Ready
            && self.phase == ConfirmationPhase::Idle
            && self.session_secret.is_resolved()
    }
}

/// Stripe handles created by the one successful bootstrap.
struct MountedCard<S: StripeJs> {
    client: S::Client,
    card: S::Card,
}

struct Inner<S: StripeJs> {
    config: CardPaymentConfig,
    amount: Cell<Option<f64>>,
    /// Set once the session fetch has been issued; the amount is fixed from then on.
    session_requested: Cell<bool>,
    torn_down: Cell<bool>,
    backend: Rc<dyn CredentialBackend>,
    loader: Rc<dyn ScriptLoader>,
    stripe: S,
    bridge: WorkflowBridge,
    store: Store<PaymentState>,
    mounted: RefCell<Option<Rc<MountedCard<S>>>>,
}

/// One card payment step. Clones share the same state.
pub struct CardPayment<S: StripeJs> {
    inner: Rc<Inner<S>>,
}

impl<S: StripeJs> Clone for CardPayment<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: StripeJs> std::fmt::Debug for CardPayment<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardPayment")
            .field("amount", &self.inner.amount.get())
            .field("bootstrap", &self.inner.store.with(|s| s.bootstrap))
            .field("phase", &self.inner.store.with(|s| s.phase))
            .finish()
    }
}

impl<S: StripeJs> CardPayment<S> {
    /// `amount` may be absent; the session secret is then requested once
    /// [`set_amount`](Self::set_amount) provides one.
    pub fn new(
        config: CardPaymentConfig,
        amount: Option<f64>,
        backend: Rc<dyn CredentialBackend>,
        loader: Rc<dyn ScriptLoader>,
        stripe: S,
        bridge: WorkflowBridge,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                amount: Cell::new(amount),
                session_requested: Cell::new(false),
                torn_down: Cell::new(false),
                backend,
                loader,
                stripe,
                bridge,
                store: Store::new(PaymentState::default()),
                mounted: RefCell::new(None),
            }),
        }
    }

    pub fn state(&self) -> PaymentState {
        self.inner.store.snapshot()
    }

    /// Observe every state change.
    pub fn subscribe(&self, observer: impl Fn(&PaymentState) + 'static) -> Subscription {
        self.inner.store.subscribe(observer)
    }

    /// Fetch both prerequisites concurrently. Bootstrap starts from whichever
    /// completion finds both resolved.
    pub async fn start(&self) {
        self.inner.store.update(|s| s.is_loading = true);
        join(self.load_public_key(), self.load_session_secret()).await;
    }

    async fn load_public_key(&self) {
        let fetched = self.inner.backend.publishable_key().await;
        let settled = self.inner.store.update(|s| match fetched {
            Ok(key) => s.public_key.resolve(key),
            Err(err) => {
                let err = PaymentError::PublicKeyFetch(err.to_string());
                error!(%err, "publishable key fetch failed");
                fail_load(s, &err);
                s.public_key.fail(err.to_string())
            }
        });
        if !settled {
            warn!("publishable key already settled, ignoring completion");
            return;
        }
        debug!("publishable key settled");
        self.check_and_maybe_bootstrap().await;
    }

    /// Provide the amount after construction. The first amount to arrive
    /// creates the payment session; later changes are ignored.
    pub async fn set_amount(&self, amount: Option<f64>) {
        let inner = &self.inner;
        if inner.torn_down.get() {
            return;
        }
        if inner.session_requested.get() {
            if amount != inner.amount.get() {
                warn!(?amount, "payment session already requested, amount change ignored");
            }
            return;
        }
        inner.amount.set(amount);
        self.load_session_secret().await;
    }

    async fn load_session_secret(&self) {
        let Some(raw) = self.inner.amount.get() else {
            debug!("no amount yet, payment session not requested");
            return;
        };
        if self.inner.session_requested.replace(true) {
            return;
        }

        let fetched = match Amount::try_from(raw) {
            Ok(amount) => self
                .inner
                .backend
                .create_session_secret(amount)
                .await
                .map_err(|err| PaymentError::SessionSecretFetch(err.to_string())),
            Err(err) => Err(err),
        };

        let settled = self.inner.store.update(|s| match fetched {
            Ok(secret) => s.session_secret.resolve(secret),
            Err(err) => {
                error!(%err, "payment session creation failed");
                fail_load(s, &err);
                s.session_secret.fail(err.to_string())
            }
        });
        if !settled {
            warn!("session secret already settled, ignoring completion");
            return;
        }
        debug!("session secret settled");
        self.check_and_maybe_bootstrap().await;
    }

    /// Start bootstrap if both credentials are resolved and it has not
    /// started yet; otherwise do nothing. Returns whether this call started it.
    pub async fn check_and_maybe_bootstrap(&self) -> bool {
        let eligible = self.inner.store.with(|s| {
            s.bootstrap == BootstrapState::NotStarted
                && s.public_key.is_resolved()
                && s.session_secret.is_resolved()
        });
        if !eligible || self.inner.torn_down.get() {
            return false;
        }
        let Some(publishable_key) = self.inner.store.update(|s| {
            gate::try_begin(&mut s.bootstrap, &s.public_key, &s.session_secret)
        }) else {
            return false;
        };

        self.bootstrap(&publishable_key).await;
        true
    }

    async fn bootstrap(&self, publishable_key: &str) {
        info!("bootstrapping Stripe card element");
        match self.mount_card(publishable_key).await {
            Ok(mounted) if self.inner.torn_down.get() => {
                debug!("torn down while bootstrapping, destroying card element");
                self.inner.stripe.destroy(&mounted.card);
                self.inner.store.update(|s| {
                    gate::finish(&mut s.bootstrap, false);
                    s.is_loading = false;
                });
            }
            Ok(mounted) => {
                *self.inner.mounted.borrow_mut() = Some(Rc::new(mounted));
                self.inner.store.update(|s| {
                    gate::finish(&mut s.bootstrap, true);
                    s.is_loading = false;
                });
                info!("card element ready");
            }
            Err(err) => {
                error!(%err, "card element bootstrap failed");
                self.inner.store.update(|s| {
                    gate::finish(&mut s.bootstrap, false);
                    s.init_error = Some(err.to_string());
                    s.is_loading = false;
                });
            }
        }
    }

    /// Load Stripe.js, then create, mount and observe the card element.
    /// Nothing stays mounted when this fails.
    async fn mount_card(&self, publishable_key: &str) -> Result<MountedCard<S>, PaymentError> {
        let inner = &self.inner;
        inner.loader.load_script(&inner.config.script_url).await?;

        let selector = &inner.config.card_selector;
        let target = inner
            .stripe
            .find_target(selector)
            .ok_or_else(|| PaymentError::MountTargetMissing(selector.clone()))?;

        let client = inner.stripe.client(publishable_key)?;
        let card = inner
            .stripe
            .create_card(&client, &inner.config.card_options())?;

        let store = inner.store.clone();
        let observed = inner.stripe.mount(&card, &target).and_then(|()| {
            inner.stripe.on_change(
                &card,
                Box::new(move |event: CardChangeEvent| {
                    store.update(|s| s.card_error = event.error.map(|e| e.message));
                }),
            )
        });
        if let Err(err) = observed {
            inner.stripe.destroy(&card);
            return Err(err.into());
        }

        Ok(MountedCard { client, card })
    }

    /// Confirm the payment with the mounted card, publish the outcome and
    /// advance the host flow, whatever the outcome.
    ///
    /// Only precondition violations are returned as errors; they change no
    /// state and do not advance the flow.
    pub async fn submit(&self) -> Result<PaymentOutcome, PaymentError> {
        let inner = &self.inner;
        let secret = inner.store.with(|s| {
            if s.phase != ConfirmationPhase::Idle {
                return Err(PaymentError::AlreadySubmitted);
            }
            if s.bootstrap != BootstrapState::Ready {
                return Err(PaymentError::NotReady);
            }
            s.session_secret.value().cloned().ok_or(PaymentError::NotReady)
        })?;
        let mounted = inner
            .mounted
            .borrow()
            .clone()
            .ok_or(PaymentError::NotReady)?;

        inner.store.update(|s| {
            s.phase = ConfirmationPhase::AwaitingConfirmation;
            s.is_confirming = true;
        });
        info!("confirming card payment");

        let result = inner
            .stripe
            .confirm_card_payment(
                &mounted.client,
                &mounted.card,
                &secret,
                &inner.config.confirm_params(),
            )
            .await;

        let outcome = inner.store.update(|s| {
            s.is_confirming = false;
            s.phase = classify(&result, &mut s.outcome);
            if let PaymentResult::Error(err) = &result {
                s.card_error = Some(err.message.clone());
            }
            s.show_modal = true;
            s.outcome.clone()
        });
        match &result {
            PaymentResult::Success(intent) => {
                info!(status = %intent.status, payment_intent = %intent.id, "payment confirmed")
            }
            PaymentResult::Error(err) => {
                warn!(error = %err, code = ?err.code, "payment confirmation failed")
            }
        }

        inner.bridge.publish(&outcome);
        inner.bridge.advance();
        inner.store.update(|s| s.phase = ConfirmationPhase::Navigated);
        Ok(outcome)
    }

    pub fn close_modal(&self) {
        self.inner.store.update(|s| s.show_modal = false);
    }

    /// Destroy the mounted card element, if any. A bootstrap still in
    /// flight destroys its card as soon as it is created.
    pub fn teardown(&self) {
        self.inner.torn_down.set(true);
        if let Some(mounted) = self.inner.mounted.borrow_mut().take() {
            debug!("destroying card element");
            self.inner.stripe.destroy(&mounted.card);
        }
    }
}

fn fail_load(state: &mut PaymentState, err: &PaymentError) {
    state.init_error = Some(err.to_string());
    state.is_loading = false;
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use async_trait::async_trait;
    use futures::channel::oneshot;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use yew::Callback;

    use super::*;
    use crate::backend::BackendError;
    use crate::outcome::PaymentMessage;
    use crate::sdk::{CardElementOptions, ConfirmCardPaymentParams, PaymentIntentInfo, StripeError};

    type Reply = Result<String, BackendError>;

    /// Backend whose replies are fed through channels by the test.
    struct ScriptedBackend {
        key: RefCell<Option<oneshot::Receiver<Reply>>>,
        secret: RefCell<Option<oneshot::Receiver<Reply>>>,
        amounts: RefCell<Vec<Amount>>,
    }

    #[async_trait(?Send)]
    impl CredentialBackend for ScriptedBackend {
        async fn publishable_key(&self) -> Result<String, BackendError> {
            let rx = self.key.borrow_mut().take().expect("key requested twice");
            rx.await.unwrap_or(Err(BackendError::Empty))
        }

        async fn create_session_secret(&self, amount: Amount) -> Result<String, BackendError> {
            self.amounts.borrow_mut().push(amount);
            let rx = self.secret.borrow_mut().take().expect("secret requested twice");
            rx.await.unwrap_or(Err(BackendError::Empty))
        }
    }

    struct FakeLoader {
        fail: bool,
        calls: Cell<u32>,
        /// Holds the load open until the test fires it.
        hold: RefCell<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait(?Send)]
    impl ScriptLoader for FakeLoader {
        async fn load_script(&self, url: &str) -> Result<(), PaymentError> {
            self.calls.set(self.calls.get() + 1);
            let hold = self.hold.borrow_mut().take();
            if let Some(rx) = hold {
                let _ = rx.await;
            }
            if self.fail {
                Err(PaymentError::ScriptLoad(format!("failed to load {url}")))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct FakeStripe {
        target_missing: bool,
        mount_fails: bool,
        clients: RefCell<Vec<String>>,
        cards_created: Cell<u32>,
        destroyed: Cell<u32>,
        change_handler: RefCell<Option<Rc<dyn Fn(CardChangeEvent)>>>,
        confirm_result: RefCell<Option<PaymentResult>>,
        confirmations: RefCell<Vec<(String, ConfirmCardPaymentParams)>>,
    }

    #[async_trait(?Send)]
    impl StripeJs for FakeStripe {
        type Client = String;
        type Card = u32;
        type Target = &'static str;

        fn find_target(&self, selector: &str) -> Option<&'static str> {
            assert_eq!(selector, ".card-element");
            (!self.target_missing).then_some("div.card-element")
        }

        fn client(&self, publishable_key: &str) -> Result<String, StripeError> {
            self.clients.borrow_mut().push(publishable_key.to_string());
            Ok(publishable_key.to_string())
        }

        fn create_card(
            &self,
            _client: &String,
            options: &CardElementOptions,
        ) -> Result<u32, StripeError> {
            assert!(options.hide_postal_code);
            self.cards_created.set(self.cards_created.get() + 1);
            Ok(self.cards_created.get())
        }

        fn mount(&self, _card: &u32, _target: &&'static str) -> Result<(), StripeError> {
            if self.mount_fails {
                Err(StripeError::new("mount exploded"))
            } else {
                Ok(())
            }
        }

        fn on_change(
            &self,
            _card: &u32,
            handler: Box<dyn Fn(CardChangeEvent)>,
        ) -> Result<(), StripeError> {
            *self.change_handler.borrow_mut() = Some(Rc::from(handler));
            Ok(())
        }

        fn destroy(&self, _card: &u32) {
            self.destroyed.set(self.destroyed.get() + 1);
        }

        async fn confirm_card_payment(
            &self,
            _client: &String,
            _card: &u32,
            client_secret: &str,
            params: &ConfirmCardPaymentParams,
        ) -> PaymentResult {
            self.confirmations
                .borrow_mut()
                .push((client_secret.to_string(), params.clone()));
            self.confirm_result
                .borrow_mut()
                .take()
                .expect("unexpected confirmation")
        }
    }

    struct Harness {
        payment: CardPayment<FakeStripe>,
        key_tx: Option<oneshot::Sender<Reply>>,
        secret_tx: Option<oneshot::Sender<Reply>>,
        backend: Rc<ScriptedBackend>,
        loader: Rc<FakeLoader>,
        advances: Rc<Cell<u32>>,
        published: Rc<RefCell<Vec<PaymentOutcome>>>,
    }

    impl Harness {
        fn new(stripe: FakeStripe) -> Self {
            Self::with(stripe, Some(25.0), false)
        }

        fn with(stripe: FakeStripe, amount: Option<f64>, loader_fails: bool) -> Self {
            let (key_tx, key_rx) = oneshot::channel();
            let (secret_tx, secret_rx) = oneshot::channel();
            let backend = Rc::new(ScriptedBackend {
                key: RefCell::new(Some(key_rx)),
                secret: RefCell::new(Some(secret_rx)),
                amounts: RefCell::new(Vec::new()),
            });
            let loader = Rc::new(FakeLoader {
                fail: loader_fails,
                calls: Cell::new(0),
                hold: RefCell::new(None),
            });
            let advances = Rc::new(Cell::new(0));
            let published = Rc::new(RefCell::new(Vec::new()));

            let bridge = {
                let advances = Rc::clone(&advances);
                let published = Rc::clone(&published);
                WorkflowBridge::new(Callback::from(move |_: ()| advances.set(advances.get() + 1)))
                    .with_outcome(Callback::from(move |outcome: PaymentOutcome| {
                        published.borrow_mut().push(outcome)
                    }))
            };

            let payment = CardPayment::new(
                CardPaymentConfig::default(),
                amount,
                backend.clone(),
                loader.clone(),
                stripe,
                bridge,
            );

            Self {
                payment,
                key_tx: Some(key_tx),
                secret_tx: Some(secret_tx),
                backend,
                loader,
                advances,
                published,
            }
        }

        fn send_key(&mut self, reply: Reply) {
            let _ = self.key_tx.take().expect("key sent twice").send(reply);
        }

        fn send_secret(&mut self, reply: Reply) {
            let _ = self.secret_tx.take().expect("secret sent twice").send(reply);
        }

        fn stripe(&self) -> &FakeStripe {
            &self.payment.inner.stripe
        }

        fn bootstrap(&self) -> BootstrapState {
            self.payment.state().bootstrap
        }

        /// Resolve both credentials and run start() to completion.
        fn ready(mut self) -> Self {
            self.send_key(Ok("pk_test_abc".into()));
            self.send_secret(Ok("pi_1_secret_2".into()));
            block_on(self.payment.start());
            assert_eq!(self.bootstrap(), BootstrapState::Ready);
            self
        }

        fn confirm_with(&self, result: PaymentResult) -> PaymentOutcome {
            *self.stripe().confirm_result.borrow_mut() = Some(result);
            block_on(self.payment.submit()).expect("submit accepted")
        }
    }

    fn spawn_start(pool: &LocalPool, payment: &CardPayment<FakeStripe>) {
        let payment = payment.clone();
        pool.spawner()
            .spawn_local(async move { payment.start().await })
            .expect("spawn start");
    }

    fn intent(status: &str) -> PaymentResult {
        PaymentResult::Success(PaymentIntentInfo {
            id: "pi_1".into(),
            status: status.into(),
        })
    }

    #[test]
    fn key_first_bootstraps_once_after_secret() {
        let mut pool = LocalPool::new();
        let mut h = Harness::new(FakeStripe::default());
        spawn_start(&pool, &h.payment);

        pool.run_until_stalled();
        assert_eq!(h.bootstrap(), BootstrapState::NotStarted);
        assert!(h.payment.state().is_loading);

        h.send_key(Ok("pk_test_abc".into()));
        pool.run_until_stalled();
        assert_eq!(h.bootstrap(), BootstrapState::NotStarted);
        assert!(h.stripe().clients.borrow().is_empty());

        h.send_secret(Ok("pi_1_secret_2".into()));
        pool.run_until_stalled();
        assert_eq!(h.bootstrap(), BootstrapState::Ready);
        assert_eq!(*h.stripe().clients.borrow(), vec!["pk_test_abc".to_string()]);
        assert_eq!(h.stripe().cards_created.get(), 1);
        assert_eq!(h.loader.calls.get(), 1);
        assert!(!h.payment.state().is_loading);
    }

    #[test]
    fn secret_first_bootstraps_once_after_key() {
        let mut pool = LocalPool::new();
        let mut h = Harness::new(FakeStripe::default());
        spawn_start(&pool, &h.payment);

        h.send_secret(Ok("pi_1_secret_2".into()));
        pool.run_until_stalled();
        assert_eq!(h.bootstrap(), BootstrapState::NotStarted);
        assert_eq!(h.loader.calls.get(), 0);

        h.send_key(Ok("pk_test_abc".into()));
        pool.run_until_stalled();
        assert_eq!(h.bootstrap(), BootstrapState::Ready);
        assert_eq!(h.stripe().clients.borrow().len(), 1);
        assert_eq!(h.loader.calls.get(), 1);
    }

    #[test]
    fn same_turn_completion_bootstraps_once() {
        let mut pool = LocalPool::new();
        let mut h = Harness::new(FakeStripe::default());
        h.send_key(Ok("pk_test_abc".into()));
        h.send_secret(Ok("pi_1_secret_2".into()));

        spawn_start(&pool, &h.payment);
        pool.run_until_stalled();

        assert_eq!(h.bootstrap(), BootstrapState::Ready);
        assert_eq!(h.stripe().clients.borrow().len(), 1);
        assert_eq!(h.stripe().cards_created.get(), 1);
        assert_eq!(h.loader.calls.get(), 1);
    }

    #[test]
    fn session_is_created_for_the_amount() {
        let h = Harness::new(FakeStripe::default()).ready();
        assert_eq!(*h.backend.amounts.borrow(), vec![Amount::new(25.0).unwrap()]);
    }

    #[test]
    fn gate_check_before_credentials_is_noop() {
        let h = Harness::new(FakeStripe::default());
        assert!(!block_on(h.payment.check_and_maybe_bootstrap()));
        assert!(!block_on(h.payment.check_and_maybe_bootstrap()));
        assert_eq!(h.bootstrap(), BootstrapState::NotStarted);
        assert_eq!(h.loader.calls.get(), 0);
    }

    #[test]
    fn gate_check_after_bootstrap_is_noop() {
        let h = Harness::new(FakeStripe::default()).ready();
        assert!(!block_on(h.payment.check_and_maybe_bootstrap()));
        assert_eq!(h.bootstrap(), BootstrapState::Ready);
        assert_eq!(h.stripe().clients.borrow().len(), 1);
        assert_eq!(h.loader.calls.get(), 1);
    }

    #[test]
    fn gate_check_after_failed_bootstrap_is_noop() {
        let stripe = FakeStripe {
            target_missing: true,
            ..FakeStripe::default()
        };
        let mut h = Harness::new(stripe);
        h.send_key(Ok("pk_test_abc".into()));
        h.send_secret(Ok("pi_1_secret_2".into()));
        block_on(h.payment.start());

        assert_eq!(h.bootstrap(), BootstrapState::Failed);
        assert!(!block_on(h.payment.check_and_maybe_bootstrap()));
        assert_eq!(h.bootstrap(), BootstrapState::Failed);
        assert_eq!(h.loader.calls.get(), 1);
    }

    #[test]
    fn key_failure_never_bootstraps() {
        let mut pool = LocalPool::new();
        let mut h = Harness::new(FakeStripe::default());
        spawn_start(&pool, &h.payment);

        h.send_key(Err(BackendError::Rejected("no key configured".into())));
        pool.run_until_stalled();
        h.send_secret(Ok("pi_1_secret_2".into()));
        pool.run_until_stalled();

        let state = h.payment.state();
        assert_eq!(state.bootstrap, BootstrapState::NotStarted);
        assert!(state.public_key.error().is_some());
        assert!(state.session_secret.is_resolved());
        assert!(!state.is_loading);
        assert_eq!(
            state.init_error.as_deref(),
            Some("Unable to retrieve the Stripe publishable key: no key configured")
        );
        assert_eq!(h.loader.calls.get(), 0);
    }

    #[test]
    fn secret_failure_never_bootstraps() {
        let mut h = Harness::new(FakeStripe::default());
        h.send_secret(Err(BackendError::Status(500)));
        h.send_key(Ok("pk_test_abc".into()));
        block_on(h.payment.start());

        let state = h.payment.state();
        assert_eq!(state.bootstrap, BootstrapState::NotStarted);
        assert!(state.public_key.is_resolved());
        assert!(state
            .init_error
            .as_deref()
            .is_some_and(|e| e.starts_with("Unable to create the Stripe payment session")));
        assert!(h.stripe().clients.borrow().is_empty());
    }

    #[test]
    fn missing_amount_leaves_secret_pending() {
        let mut h = Harness::with(FakeStripe::default(), None, false);
        h.send_key(Ok("pk_test_abc".into()));
        block_on(h.payment.start());

        let state = h.payment.state();
        assert!(state.session_secret.is_pending());
        assert_eq!(state.bootstrap, BootstrapState::NotStarted);
        assert!(h.backend.amounts.borrow().is_empty());
    }

    #[test]
    fn invalid_amount_fails_session() {
        let mut h = Harness::with(FakeStripe::default(), Some(-3.0), false);
        h.send_key(Ok("pk_test_abc".into()));
        block_on(h.payment.start());

        let state = h.payment.state();
        assert_eq!(state.session_secret.error(), Some("Invalid payment amount: -3"));
        assert_eq!(state.bootstrap, BootstrapState::NotStarted);
        assert!(h.backend.amounts.borrow().is_empty());
    }

    #[test]
    fn missing_target_fails_without_widget() {
        let stripe = FakeStripe {
            target_missing: true,
            ..FakeStripe::default()
        };
        let mut h = Harness::new(stripe);
        h.send_key(Ok("pk_test_abc".into()));
        h.send_secret(Ok("pi_1_secret_2".into()));
        block_on(h.payment.start());

        let state = h.payment.state();
        assert_eq!(state.bootstrap, BootstrapState::Failed);
        assert_eq!(
            state.init_error.as_deref(),
            Some("Card element target `.card-element` not found")
        );
        assert!(!state.is_loading);
        assert_eq!(h.stripe().cards_created.get(), 0);
        assert!(h.payment.inner.mounted.borrow().is_none());
    }

    #[test]
    fn script_load_failure_fails_bootstrap() {
        let mut h = Harness::with(FakeStripe::default(), Some(10.0), true);
        h.send_key(Ok("pk_test_abc".into()));
        h.send_secret(Ok("pi_1_secret_2".into()));
        block_on(h.payment.start());

        let state = h.payment.state();
        assert_eq!(state.bootstrap, BootstrapState::Failed);
        assert!(state
            .init_error
            .as_deref()
            .is_some_and(|e| e.starts_with("Unable to load Stripe.js")));
        assert!(h.stripe().clients.borrow().is_empty());
    }

    #[test]
    fn mount_failure_destroys_card() {
        let stripe = FakeStripe {
            mount_fails: true,
            ..FakeStripe::default()
        };
        let mut h = Harness::new(stripe);
        h.send_key(Ok("pk_test_abc".into()));
        h.send_secret(Ok("pi_1_secret_2".into()));
        block_on(h.payment.start());

        assert_eq!(h.bootstrap(), BootstrapState::Failed);
        assert_eq!(h.stripe().destroyed.get(), 1);
        assert!(h.payment.inner.mounted.borrow().is_none());
        assert_eq!(
            block_on(h.payment.submit()),
            Err(PaymentError::NotReady)
        );
    }

    #[test]
    fn change_events_project_card_errors() {
        let h = Harness::new(FakeStripe::default()).ready();
        let handler = h.stripe().change_handler.borrow().clone().expect("observer registered");

        handler(CardChangeEvent {
            error: Some(StripeError::new("Your card number is incomplete.")),
            ..CardChangeEvent::default()
        });
        assert_eq!(
            h.payment.state().card_error.as_deref(),
            Some("Your card number is incomplete.")
        );

        handler(CardChangeEvent {
            complete: true,
            ..CardChangeEvent::default()
        });
        assert_eq!(h.payment.state().card_error, None);
    }

    #[test]
    fn succeeded_is_success_and_advances() {
        let h = Harness::new(FakeStripe::default()).ready();
        let outcome = h.confirm_with(intent("succeeded"));

        assert_eq!(
            outcome,
            PaymentOutcome {
                message: Some(PaymentMessage::Success),
                status_code: Some("200".into()),
                result_text: Some("Payment success".into()),
            }
        );
        assert_eq!(h.advances.get(), 1);
        assert_eq!(*h.published.borrow(), vec![outcome]);

        let state = h.payment.state();
        assert_eq!(state.phase, ConfirmationPhase::Navigated);
        assert!(state.show_modal);
        assert!(!state.is_confirming);

        let confirmations = h.stripe().confirmations.borrow();
        assert_eq!(confirmations.len(), 1);
        assert_eq!(confirmations[0].0, "pi_1_secret_2");
        assert_eq!(
            confirmations[0].1.setup_future_usage.as_deref(),
            Some("off_session")
        );
    }

    #[test]
    fn requires_capture_is_success_and_advances() {
        let h = Harness::new(FakeStripe::default()).ready();
        let outcome = h.confirm_with(intent("requires_capture"));

        assert_eq!(outcome.message, Some(PaymentMessage::Success));
        assert_eq!(outcome.status_code.as_deref(), Some("200"));
        assert_eq!(outcome.result_text.as_deref(), Some("Payment success"));
        assert_eq!(h.advances.get(), 1);
    }

    #[test]
    fn other_status_is_failure_and_advances() {
        let h = Harness::new(FakeStripe::default()).ready();
        let outcome = h.confirm_with(intent("requires_action"));

        assert_eq!(outcome.message, None);
        assert_eq!(outcome.status_code.as_deref(), Some("requires_action"));
        assert_eq!(outcome.result_text.as_deref(), Some("Payment failed"));
        assert_eq!(h.advances.get(), 1);
        assert_eq!(h.payment.state().card_error, None);
    }

    #[test]
    fn decline_is_error_shown_inline_and_still_advances() {
        let h = Harness::new(FakeStripe::default()).ready();
        let outcome = h.confirm_with(PaymentResult::Error(StripeError::new(
            "Your card was declined.",
        )));

        assert_eq!(outcome.message, Some(PaymentMessage::Error));
        assert_eq!(outcome.status_code.as_deref(), Some("Your card was declined."));
        assert_eq!(
            h.payment.state().card_error.as_deref(),
            Some("Your card was declined.")
        );
        assert_eq!(h.advances.get(), 1);
    }

    #[test]
    fn submit_before_ready_is_rejected_without_advancing() {
        let h = Harness::new(FakeStripe::default());
        assert_eq!(block_on(h.payment.submit()), Err(PaymentError::NotReady));
        assert_eq!(h.advances.get(), 0);
        assert_eq!(h.payment.state().phase, ConfirmationPhase::Idle);
    }

    #[test]
    fn second_submit_is_rejected() {
        let h = Harness::new(FakeStripe::default()).ready();
        h.confirm_with(intent("succeeded"));

        assert_eq!(
            block_on(h.payment.submit()),
            Err(PaymentError::AlreadySubmitted)
        );
        assert_eq!(h.advances.get(), 1);
        assert_eq!(h.stripe().confirmations.borrow().len(), 1);
    }

    #[test]
    fn observers_follow_the_lifecycle() {
        let mut h = Harness::new(FakeStripe::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _subscription = {
            let seen = Rc::clone(&seen);
            h.payment.subscribe(move |s| seen.borrow_mut().push(s.bootstrap))
        };

        h.send_key(Ok("pk_test_abc".into()));
        h.send_secret(Ok("pi_1_secret_2".into()));
        block_on(h.payment.start());

        let seen = seen.borrow();
        assert!(seen.contains(&BootstrapState::InProgress));
        assert_eq!(seen.last(), Some(&BootstrapState::Ready));
    }

    #[test]
    fn modal_closes() {
        let h = Harness::new(FakeStripe::default()).ready();
        h.confirm_with(intent("succeeded"));
        assert!(h.payment.state().show_modal);
        h.payment.close_modal();
        assert!(!h.payment.state().show_modal);
    }

    #[test]
    fn teardown_destroys_card_once() {
        let h = Harness::new(FakeStripe::default()).ready();
        h.payment.teardown();
        h.payment.teardown();

        assert_eq!(h.stripe().destroyed.get(), 1);
        assert_eq!(block_on(h.payment.submit()), Err(PaymentError::NotReady));
        assert_eq!(h.advances.get(), 0);
    }

    #[test]
    fn teardown_during_bootstrap_destroys_late_card() {
        let mut pool = LocalPool::new();
        let mut h = Harness::new(FakeStripe::default());
        let (release, hold) = oneshot::channel();
        *h.loader.hold.borrow_mut() = Some(hold);

        spawn_start(&pool, &h.payment);
        h.send_key(Ok("pk_test_abc".into()));
        h.send_secret(Ok("pi_1_secret_2".into()));
        pool.run_until_stalled();
        assert_eq!(h.bootstrap(), BootstrapState::InProgress);

        h.payment.teardown();
        let _ = release.send(());
        pool.run_until_stalled();

        assert_eq!(h.stripe().cards_created.get(), 1);
        assert_eq!(h.stripe().destroyed.get(), 1);
        assert!(h.payment.inner.mounted.borrow().is_none());
        assert_eq!(h.bootstrap(), BootstrapState::Failed);
        assert!(!h.payment.state().is_loading);
        assert_eq!(block_on(h.payment.submit()), Err(PaymentError::NotReady));
    }

    #[test]
    fn late_amount_creates_the_session() {
        let mut pool = LocalPool::new();
        let mut h = Harness::with(FakeStripe::default(), None, false);
        spawn_start(&pool, &h.payment);
        h.send_key(Ok("pk_test_abc".into()));
        pool.run_until_stalled();
        assert!(h.payment.state().session_secret.is_pending());
        assert!(h.backend.amounts.borrow().is_empty());

        let payment = h.payment.clone();
        pool.spawner()
            .spawn_local(async move { payment.set_amount(Some(12.5)).await })
            .expect("spawn set_amount");
        pool.run_until_stalled();
        assert_eq!(*h.backend.amounts.borrow(), vec![Amount::new(12.5).unwrap()]);

        h.send_secret(Ok("pi_1_secret_2".into()));
        pool.run_until_stalled();
        assert_eq!(h.bootstrap(), BootstrapState::Ready);
        assert_eq!(h.stripe().cards_created.get(), 1);

        // the session is fixed once requested
        block_on(h.payment.set_amount(Some(99.0)));
        block_on(h.payment.set_amount(None));
        assert_eq!(h.backend.amounts.borrow().len(), 1);
    }

    #[test]
    fn repeated_initial_amount_fetches_once() {
        let h = Harness::new(FakeStripe::default()).ready();
        block_on(h.payment.set_amount(Some(25.0)));
        assert_eq!(h.backend.amounts.borrow().len(), 1);
    }
}
