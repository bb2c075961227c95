use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use cartflow_core::{ActionError, ActionResult, AddLineInput, RemoveLineInput, UpdateLineInput};
use cartflow_storage::CartActions;
use tokio::sync::Semaphore;

/// Wraps a backend with knobs the tests need: a gate that holds calls in
/// flight, scripted failures, and call/concurrency counters.
pub struct GatedActions<A> {
    inner: Arc<A>,
    held: AtomicBool,
    permits: Semaphore,
    calls: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<ActionError>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: CartActions> GatedActions<A> {
    pub fn new(inner: Arc<A>) -> Self {
        Self {
            inner,
            held: AtomicBool::new(false),
            permits: Semaphore::new(0),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Calls started from now on wait until released.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Lets one held call proceed.
    pub fn release_one(&self) {
        self.permits.add_permits(1);
    }

    /// Stops holding and lets every waiting call proceed.
    pub fn release_all(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.permits.add_permits(self.in_flight.load(Ordering::SeqCst));
    }

    /// The next call fails with `err` without reaching the backend.
    pub fn fail_next(&self, err: ActionError) {
        lock(&self.failures).push_back(err);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Yields to the runtime until at least `count` calls have started.
    pub async fn wait_in_flight(&self, count: usize) {
        while self.in_flight() < count {
            tokio::task::yield_now().await;
        }
    }

    async fn run(
        &self,
        label: String,
        call: impl Future<Output = Result<ActionResult, ActionError>>,
    ) -> Result<ActionResult, ActionError> {
        lock(&self.calls).push(label);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.held.load(Ordering::SeqCst) {
            if let Ok(permit) = self.permits.acquire().await {
                permit.forget();
            }
        }

        let scripted = lock(&self.failures).pop_front();
        let result = match scripted {
            Some(err) => Err(err),
            None => call.await,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl<A: CartActions> CartActions for GatedActions<A> {
    async fn add_line(&self, input: AddLineInput) -> Result<ActionResult, ActionError> {
        let label = format!("add {} x{}", input.variant_id, input.quantity);
        self.run(label, self.inner.add_line(input)).await
    }

    async fn update_line_quantity(
        &self,
        input: UpdateLineInput,
    ) -> Result<ActionResult, ActionError> {
        let label = format!("update {} x{}", input.line_id, input.quantity);
        self.run(label, self.inner.update_line_quantity(input)).await
    }

    async fn remove_line(&self, input: RemoveLineInput) -> Result<ActionResult, ActionError> {
        let label = format!("remove {}", input.line_id);
        self.run(label, self.inner.remove_line(input)).await
    }

    async fn clear_cart(&self) -> Result<ActionResult, ActionError> {
        self.run("clear".to_string(), self.inner.clear_cart()).await
    }
}
