//! Single-slot runner for cart mutations.
//!
//! The sequencer is `idle` until a [`MutationIntent`] arrives, then `mutating`
//! while exactly one server call is outstanding. Intents that arrive while
//! mutating are ignored. The call's outcome never escapes as an error: a
//! failure becomes the context's `error` and the sequencer returns to idle.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use cartflow_core::{ActionError, ActionResult};
use cartflow_storage::CartActions;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::config::SequencerConfig;
use crate::intent::{MutationIntent, MutationKind};

pub type Revalidate = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SequencerState {
    #[default]
    Idle,
    Mutating,
}

impl SequencerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Mutating => "mutating",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationContext {
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerSnapshot {
    pub state: SequencerState,
    pub context: MutationContext,
    pub in_flight: Option<MutationKind>,
    /// Episodes started since construction.
    pub episodes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Succeeded(ActionResult),
    Failed { message: String },
}

impl Settlement {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed { message } => Some(message.as_str()),
        }
    }
}

/// Result of handing an intent to the sequencer.
#[derive(Debug)]
pub enum Dispatch {
    Accepted(Episode),
    /// A mutation was already in flight; nothing was started.
    Ignored,
}

impl Dispatch {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// One idle → mutating → idle round trip.
#[derive(Debug)]
pub struct Episode {
    kind: MutationKind,
    handle: JoinHandle<Settlement>,
    fallback: String,
}

impl Episode {
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Waits for the call to settle. The sequencer is idle again by the time
    /// this resolves.
    pub async fn settled(self) -> Settlement {
        match self.handle.await {
            Ok(settlement) => settlement,
            Err(err) => {
                tracing::error!(kind = self.kind.as_str(), error = %err, "cart mutation episode aborted");
                Settlement::Failed {
                    message: self.fallback,
                }
            }
        }
    }
}

struct Inner<A> {
    actions: Arc<A>,
    revalidate: Revalidate,
    config: SequencerConfig,
    snapshot: watch::Sender<SequencerSnapshot>,
}

pub struct MutationSequencer<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for MutationSequencer<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: CartActions + 'static> MutationSequencer<A> {
    pub fn new(actions: Arc<A>, revalidate: impl Fn() + Send + Sync + 'static) -> Self {
        Self::with_config(actions, revalidate, SequencerConfig::default())
    }

    pub fn with_config(
        actions: Arc<A>,
        revalidate: impl Fn() + Send + Sync + 'static,
        config: SequencerConfig,
    ) -> Self {
        let (snapshot, _rx) = watch::channel(SequencerSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                actions,
                revalidate: Arc::new(revalidate),
                config,
                snapshot,
            }),
        }
    }

    /// Starts a mutation if idle, otherwise ignores the intent.
    ///
    /// The idle check and the switch to `mutating` happen in one atomic step,
    /// so two dispatches can never both be accepted. Must be called from
    /// within a Tokio runtime.
    pub fn dispatch(&self, intent: MutationIntent) -> Dispatch {
        self.dispatch_with(intent, || {})
    }

    /// Like [`dispatch`](Self::dispatch), but runs `on_accept` once the
    /// sequencer is `mutating` and before the server call is spawned.
    /// `on_accept` is not run for an ignored intent.
    pub fn dispatch_with(&self, intent: MutationIntent, on_accept: impl FnOnce()) -> Dispatch {
        let kind = intent.kind();
        let accepted = self.inner.snapshot.send_if_modified(|snap| match snap.state {
            SequencerState::Idle => {
                snap.state = SequencerState::Mutating;
                snap.in_flight = Some(kind);
                snap.context.error = None;
                snap.episodes += 1;
                true
            }
            SequencerState::Mutating => false,
        });

        if !accepted {
            tracing::debug!(
                kind = kind.as_str(),
                in_flight = ?self.snapshot().in_flight,
                "mutation ignored while another is in flight"
            );
            return Dispatch::Ignored;
        }

        tracing::debug!(kind = kind.as_str(), "idle -> mutating");
        on_accept();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(intent).await });
        Dispatch::Accepted(Episode {
            kind,
            handle,
            fallback: self.inner.config.unknown_error_message.clone(),
        })
    }
}

impl<A> MutationSequencer<A> {
    pub fn snapshot(&self) -> SequencerSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SequencerState {
        self.inner.snapshot.borrow().state
    }

    pub fn is_idle(&self) -> bool {
        self.state() == SequencerState::Idle
    }

    pub fn error(&self) -> Option<String> {
        self.inner.snapshot.borrow().context.error.clone()
    }

    /// Reads the last error and clears it.
    pub fn take_error(&self) -> Option<String> {
        let mut taken = None;
        self.inner.snapshot.send_if_modified(|snap| {
            taken = snap.context.error.take();
            taken.is_some()
        });
        taken
    }

    pub fn subscribe(&self) -> watch::Receiver<SequencerSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|snap| snap.state == SequencerState::Idle).await;
    }
}

impl<A: CartActions + 'static> Inner<A> {
    async fn run(self: Arc<Self>, intent: MutationIntent) -> Settlement {
        let kind = intent.kind();
        let actions = Arc::clone(&self.actions);
        // Own task, so a panicking backend surfaces as a JoinError.
        let call = tokio::spawn(async move { perform(actions.as_ref(), intent).await });
        let settlement = self.settle(call.await);

        match &settlement {
            Settlement::Succeeded(_) => {
                tracing::debug!(kind = kind.as_str(), "cart mutation succeeded");
                if catch_unwind(AssertUnwindSafe(|| (self.revalidate)())).is_err() {
                    tracing::error!(kind = kind.as_str(), "revalidation callback panicked");
                }
            }
            Settlement::Failed { message } => {
                tracing::warn!(kind = kind.as_str(), error = %message, "cart mutation failed");
            }
        }

        let error = settlement.error_message().map(str::to_owned);
        self.snapshot.send_modify(|snap| {
            snap.state = SequencerState::Idle;
            snap.in_flight = None;
            snap.context.error = error;
        });
        tracing::debug!(kind = kind.as_str(), "mutating -> idle");
        settlement
    }

    fn settle(&self, outcome: Result<Result<ActionResult, ActionError>, JoinError>) -> Settlement {
        match outcome {
            Ok(Ok(result)) if result.success => Settlement::Succeeded(result),
            Ok(Ok(result)) => Settlement::Failed {
                message: self.message_or_fallback(result.usable_message()),
            },
            Ok(Err(err)) => Settlement::Failed {
                message: self.message_or_fallback(err.user_message()),
            },
            Err(err) => {
                tracing::error!(error = %err, "cart mutation call panicked");
                Settlement::Failed {
                    message: self.message_or_fallback(None),
                }
            }
        }
    }

    fn message_or_fallback(&self, message: Option<&str>) -> String {
        message
            .unwrap_or(&self.config.unknown_error_message)
            .to_string()
    }
}

async fn perform<A: CartActions + ?Sized>(
    actions: &A,
    intent: MutationIntent,
) -> Result<ActionResult, ActionError> {
    match intent {
        MutationIntent::AddLines(input) => actions.add_line(input).await,
        MutationIntent::UpdateLine(input) => actions.update_line_quantity(input).await,
        MutationIntent::RemoveLine(input) => actions.remove_line(input).await,
        MutationIntent::Clear => actions.clear_cart().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use cartflow_core::{AddLineInput, RemoveLineInput, UpdateLineInput};
    use tokio::sync::Semaphore;

    type Reply = Result<ActionResult, ActionError>;

    /// Records calls and answers from a script. With a gate, each call waits
    /// for a permit before replying.
    #[derive(Default)]
    struct Scripted {
        calls: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<Reply>>,
        gate: Option<Arc<Semaphore>>,
        panic_on_call: bool,
    }

    impl Scripted {
        fn replying(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                ..Default::default()
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn answer(&self, call: String) -> Reply {
            self.calls.lock().unwrap().push(call);
            if self.panic_on_call {
                panic!("backend exploded");
            }
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ActionResult::ok()))
        }
    }

    #[async_trait]
    impl CartActions for Scripted {
        async fn add_line(&self, input: AddLineInput) -> Reply {
            self.answer(format!("add {} {}", input.variant_id, input.quantity)).await
        }

        async fn update_line_quantity(&self, input: UpdateLineInput) -> Reply {
            self.answer(format!("update {} {}", input.line_id, input.quantity)).await
        }

        async fn remove_line(&self, input: RemoveLineInput) -> Reply {
            self.answer(format!("remove {}", input.line_id)).await
        }

        async fn clear_cart(&self) -> Reply {
            self.answer("clear".to_string()).await
        }
    }

    fn sequencer(actions: Scripted) -> (MutationSequencer<Scripted>, Arc<Scripted>, Arc<AtomicUsize>) {
        let actions = Arc::new(actions);
        let revalidations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&revalidations);
        let seq = MutationSequencer::new(Arc::clone(&actions), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (seq, actions, revalidations)
    }

    fn accepted(dispatch: Dispatch) -> Episode {
        match dispatch {
            Dispatch::Accepted(episode) => episode,
            Dispatch::Ignored => panic!("expected dispatch to be accepted"),
        }
    }

    #[tokio::test]
    async fn update_success_revalidates_once() {
        let (seq, actions, revalidations) = sequencer(Scripted::default());
        assert_eq!(seq.state(), SequencerState::Idle);

        let episode = accepted(seq.dispatch(MutationIntent::UpdateLine(UpdateLineInput::new("L1", 2))));
        assert_eq!(seq.state(), SequencerState::Mutating);
        assert_eq!(seq.snapshot().in_flight, Some(MutationKind::UpdateLine));

        let settlement = episode.settled().await;
        assert!(settlement.is_success());
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.error(), None);
        assert_eq!(revalidations.load(Ordering::SeqCst), 1);
        assert_eq!(actions.calls(), ["update L1 2"]);
    }

    #[tokio::test]
    async fn rejection_message_is_stored() {
        let (seq, _actions, revalidations) =
            sequencer(Scripted::replying([Err(ActionError::unexpected("Network timeout"))]));

        let episode = accepted(seq.dispatch(MutationIntent::RemoveLine(RemoveLineInput::new("L2"))));
        let settlement = episode.settled().await;

        assert_eq!(settlement.error_message(), Some("Network timeout"));
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.error().as_deref(), Some("Network timeout"));
        assert_eq!(revalidations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsuccessful_result_counts_as_failure() {
        let (seq, _actions, revalidations) = sequencer(Scripted::replying([Ok(
            ActionResult::failure(cartflow_core::ErrorCode::ApiError, "Sold out"),
        )]));

        accepted(seq.dispatch(MutationIntent::AddLines(AddLineInput::new("v1", 1))))
            .settled()
            .await;
        assert_eq!(seq.error().as_deref(), Some("Sold out"));
        assert_eq!(revalidations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_message_uses_fallback() {
        let (seq, _actions, _) = sequencer(Scripted::replying([
            Err(ActionError::Unexpected(None)),
            Err(ActionError::api("")),
        ]));

        accepted(seq.dispatch(MutationIntent::Clear)).settled().await;
        assert_eq!(seq.error().as_deref(), Some("An unknown error occurred."));

        accepted(seq.dispatch(MutationIntent::Clear)).settled().await;
        assert_eq!(seq.error().as_deref(), Some("An unknown error occurred."));
    }

    #[tokio::test]
    async fn configured_fallback_message() {
        let actions = Arc::new(Scripted::replying([Err(ActionError::Unexpected(None))]));
        let seq = MutationSequencer::with_config(
            actions,
            || {},
            SequencerConfig {
                unknown_error_message: "Noe gikk galt.".into(),
            },
        );
        accepted(seq.dispatch(MutationIntent::Clear)).settled().await;
        assert_eq!(seq.error().as_deref(), Some("Noe gikk galt."));
    }

    #[tokio::test]
    async fn dispatch_while_mutating_is_ignored() {
        let gate = Arc::new(Semaphore::new(0));
        let (seq, actions, revalidations) = sequencer(Scripted::gated(Arc::clone(&gate)));

        let episode = accepted(seq.dispatch(MutationIntent::UpdateLine(UpdateLineInput::new("L1", 2))));
        tokio::task::yield_now().await;

        let second = seq.dispatch(MutationIntent::Clear);
        assert!(!second.is_accepted());
        assert_eq!(seq.snapshot().in_flight, Some(MutationKind::UpdateLine));
        assert_eq!(seq.snapshot().episodes, 1);

        gate.add_permits(1);
        episode.settled().await;

        assert_eq!(actions.calls(), ["update L1 2"]);
        assert_eq!(revalidations.load(Ordering::SeqCst), 1);
        assert!(seq.is_idle());
    }

    #[tokio::test]
    async fn new_dispatch_clears_previous_error() {
        let gate = Arc::new(Semaphore::new(0));
        let actions = Scripted {
            replies: Mutex::new(VecDeque::from([Err(ActionError::api("Line gone"))])),
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let (seq, _actions, _) = sequencer(actions);

        gate.add_permits(1);
        accepted(seq.dispatch(MutationIntent::Clear)).settled().await;
        assert_eq!(seq.error().as_deref(), Some("Line gone"));

        let episode = accepted(seq.dispatch(MutationIntent::Clear));
        assert_eq!(seq.error(), None, "starting an episode clears the error");
        gate.add_permits(1);
        episode.settled().await;
        assert_eq!(seq.error(), None);
    }

    #[tokio::test]
    async fn take_error_reads_once() {
        let (seq, _actions, _) = sequencer(Scripted::replying([Err(ActionError::api("Nope"))]));
        accepted(seq.dispatch(MutationIntent::Clear)).settled().await;

        assert_eq!(seq.take_error().as_deref(), Some("Nope"));
        assert_eq!(seq.take_error(), None);
        assert_eq!(seq.error(), None);
    }

    #[tokio::test]
    async fn panicking_backend_becomes_failure() {
        let (seq, _actions, revalidations) = sequencer(Scripted {
            panic_on_call: true,
            ..Default::default()
        });

        let settlement = accepted(seq.dispatch(MutationIntent::Clear)).settled().await;
        assert_eq!(settlement.error_message(), Some("An unknown error occurred."));
        assert!(seq.is_idle());
        assert_eq!(revalidations.load(Ordering::SeqCst), 0);

        // Still usable afterwards.
        assert!(seq.dispatch(MutationIntent::Clear).is_accepted());
    }

    #[tokio::test]
    async fn panicking_revalidate_still_settles() {
        let actions = Arc::new(Scripted::default());
        let seq = MutationSequencer::new(Arc::clone(&actions), || panic!("refetch exploded"));

        let settlement = accepted(seq.dispatch(MutationIntent::Clear)).settled().await;
        assert!(settlement.is_success());
        assert!(seq.is_idle());
        assert_eq!(seq.error(), None);
        assert!(seq.dispatch(MutationIntent::Clear).is_accepted());
    }

    #[tokio::test]
    async fn on_accept_runs_before_the_call() {
        let (seq, actions, _) = sequencer(Scripted::default());
        let seen = Arc::new(Mutex::new(None));

        let episode = accepted(seq.dispatch_with(MutationIntent::Clear, {
            let seen = Arc::clone(&seen);
            let seq = seq.clone();
            let actions = Arc::clone(&actions);
            move || *seen.lock().unwrap() = Some((seq.state(), actions.calls().len()))
        }));
        episode.settled().await;
        assert_eq!(*seen.lock().unwrap(), Some((SequencerState::Mutating, 0)));

        let gate = Arc::new(Semaphore::new(0));
        let (seq, _actions, _) = sequencer(Scripted::gated(Arc::clone(&gate)));
        let _episode = accepted(seq.dispatch(MutationIntent::Clear));
        let mut ran = false;
        assert!(!seq.dispatch_with(MutationIntent::Clear, || ran = true).is_accepted());
        assert!(!ran, "ignored intents skip the hook");
        gate.add_permits(1);
    }

    #[tokio::test]
    async fn each_intent_reaches_its_action() {
        let (seq, actions, revalidations) = sequencer(Scripted::default());
        let intents = [
            MutationIntent::AddLines(AddLineInput::new("v1", 3)),
            MutationIntent::UpdateLine(UpdateLineInput::new("L1", 0)),
            MutationIntent::RemoveLine(RemoveLineInput::new("L2")),
            MutationIntent::Clear,
        ];
        for intent in intents {
            accepted(seq.dispatch(intent)).settled().await;
        }
        assert_eq!(actions.calls(), ["add v1 3", "update L1 0", "remove L2", "clear"]);
        assert_eq!(revalidations.load(Ordering::SeqCst), 4);
        assert_eq!(seq.snapshot().episodes, 4);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_settle() {
        let gate = Arc::new(Semaphore::new(0));
        let (seq, _actions, _) = sequencer(Scripted::gated(Arc::clone(&gate)));

        let _episode = accepted(seq.dispatch(MutationIntent::Clear));
        let waiter = {
            let seq = seq.clone();
            tokio::spawn(async move { seq.wait_idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.add_permits(1);
        waiter.await.unwrap();
        assert!(seq.is_idle());
    }
}
