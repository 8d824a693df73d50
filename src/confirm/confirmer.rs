use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{ConfirmerConfig, Hooks};
use super::errors::{ConfirmerError, PollError};
use super::queue::{Entry, RetryQueue};
use super::traits::TxClient;

/// Tracks submitted transactions until each is confirmed at the required
/// depth or fails for good.
///
/// `submit` broadcasts through the client and enqueues the hash; a pool of
/// polling workers then re-checks every queued transaction, paced by the
/// configured confirmation interval. Confirmation order across transactions
/// is not defined. Create once, `start` once, `stop` once; a stopped
/// confirmer is not restartable.
pub struct Confirmer<C: TxClient> {
    inner: Arc<Inner<C>>,
    hooks: Hooks,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// State shared between the owning handle and the worker tasks.
struct Inner<C: TxClient> {
    client: C,
    queue: RetryQueue,
    config: ConfirmerConfig,
    shutdown: CancellationToken,
}

impl<C: TxClient + 'static> Confirmer<C> {
    /// `queue_size` of 0 means an unbounded retry queue.
    pub fn new(client: C, queue_size: usize, config: ConfirmerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                queue: RetryQueue::new(queue_size),
                config,
                shutdown: CancellationToken::new(),
            }),
            hooks: Hooks::default(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the no-op hook invoked once after every successful send.
    pub fn with_on_tx_sent(
        mut self,
        hook: impl Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_tx_sent = Arc::new(hook);
        self
    }

    /// Replaces the no-op hook invoked once when a transaction is confirmed.
    pub fn with_on_tx_confirmed(
        mut self,
        hook: impl Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_tx_confirmed = Arc::new(hook);
        self
    }

    /// Replaces the default fail-fast error hook. Terminal failures and hook
    /// errors inside the worker loop are reported here and nowhere else.
    pub fn with_on_error(
        mut self,
        hook: impl Fn(&str, &ConfirmerError) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_error = Arc::new(hook);
        self
    }

    pub fn config(&self) -> &ConfirmerConfig {
        &self.inner.config
    }

    /// Advisory number of transactions currently awaiting confirmation.
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Broadcasts `tx` and tracks the returned hash for confirmation.
    ///
    /// On success exactly one entry enters the queue. If the send itself
    /// fails, nothing is tracked and the error is the caller's. If the
    /// on-sent hook fails, the transaction is already on the wire but will
    /// NOT be tracked: callers that persist the hash inside the hook own
    /// recovery in that case. The same holds when a bounded queue is full.
    pub async fn submit(&self, tx: &C::Tx) -> Result<String, ConfirmerError> {
        self.inner.submit(&self.hooks, tx).await
    }

    /// Runs one dequeue-check cycle and returns the hash it worked on, or
    /// `Ok(None)` when the queue was empty.
    ///
    /// An entry checked less than the confirmation interval ago goes back
    /// unchanged without touching the node. A retryable status refreshes the
    /// entry's timestamp and re-enqueues it. Anything else is terminal: the
    /// entry is dropped and the error is returned with its hash.
    pub async fn poll_next(&self) -> Result<Option<String>, PollError> {
        self.inner.poll_next(&self.hooks).await
    }

    /// Spawns the polling workers. Validates the config before spawning and
    /// returns immediately; workers run until `stop`.
    pub fn start(&self) -> Result<(), ConfirmerError> {
        self.inner.config.validate()?;

        let mut workers = self.workers.lock();
        for id in 1..=self.inner.config.workers {
            let inner = Arc::clone(&self.inner);
            let hooks = self.hooks.clone();
            workers.push(tokio::spawn(async move { inner.run_worker(hooks, id).await }));
        }

        info!(workers = self.inner.config.workers, "confirmer is ready");
        Ok(())
    }

    /// Signals every worker to exit and blocks until the last in-flight cycle
    /// has finished. After this returns no hook fires again and no worker
    /// dequeues again. Call once; the confirmer is done afterwards.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock();
            workers.drain(..).collect()
        };
        for joined in join_all(handles).await {
            if let Err(err) = joined {
                warn!(error = %err, "worker exited abnormally");
            }
        }

        info!("confirmer closed");
    }
}

impl<C: TxClient> Inner<C> {
    async fn submit(&self, hooks: &Hooks, tx: &C::Tx) -> Result<String, ConfirmerError> {
        let deadline = self.config.timeout();
        let tx_hash = match timeout(deadline, self.client.send_tx(tx)).await {
            Ok(sent) => sent?,
            Err(_) => return Err(ConfirmerError::Timeout(deadline)),
        };

        (hooks.on_tx_sent)(&tx_hash)
            .map_err(|reason| ConfirmerError::Hook { hook: "on_tx_sent", reason })?;

        self.queue.enqueue(Entry::new(tx_hash.clone()))?;
        debug!(%tx_hash, "tx queued for confirmation");
        Ok(tx_hash)
    }

    async fn poll_next(&self, hooks: &Hooks) -> Result<Option<String>, PollError> {
        let Some(mut entry) = self.queue.dequeue() else {
            return Ok(None);
        };
        let tx_hash = entry.tx_hash.clone();

        if entry.last_checked_at.elapsed() < self.config.confirmation_interval() {
            self.requeue(entry)?;
            return Ok(Some(tx_hash));
        }

        match self.check_with_timeout(&tx_hash).await {
            Ok(()) => {
                // The chain already confirmed it; the entry stays dropped even
                // if the hook refuses.
                (hooks.on_tx_confirmed)(&tx_hash).map_err(|reason| PollError {
                    tx_hash: tx_hash.clone(),
                    source: ConfirmerError::Hook { hook: "on_tx_confirmed", reason },
                })?;
                debug!(%tx_hash, "tx confirmed");
                Ok(Some(tx_hash))
            }
            Err(err) if err.is_retryable() => {
                entry.touch();
                self.requeue(entry)?;
                Ok(Some(tx_hash))
            }
            Err(err) => Err(PollError { tx_hash, source: err }),
        }
    }

    async fn run_worker(&self, hooks: Hooks, id: usize) {
        let mut tick = tokio::time::interval(self.config.worker_interval());
        // A slow chain call must not be followed by a burst of catch-up ticks.
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!(worker = id, "worker closing");
                    return;
                }
                _ = tick.tick() => {
                    if let Err(err) = self.poll_next(&hooks).await {
                        (hooks.on_error)(&err.tx_hash, &err.source);
                    }
                }
            }
        }
    }

    async fn check_with_timeout(&self, tx_hash: &str) -> Result<(), ConfirmerError> {
        let deadline = self.config.timeout();
        let check = self.client.confirm_tx(tx_hash, self.config.confirmation_blocks);
        match timeout(deadline, check).await {
            Ok(checked) => checked,
            Err(_) => Err(ConfirmerError::Timeout(deadline)),
        }
    }

    fn requeue(&self, entry: Entry) -> Result<(), PollError> {
        let tx_hash = entry.tx_hash.clone();
        self.queue
            .enqueue(entry)
            .map_err(|source| PollError { tx_hash, source })
    }
}
