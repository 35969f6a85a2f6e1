//! Parallel exchange scheduling.
//!
//! A [`Requester`] owns a FIFO queue of pending exchanges and a bounded
//! in-flight set keyed by transport handle. [`Requester::run`] drives the
//! transport's progress step in a loop, demultiplexing completions back to
//! their exchanges and refilling from the queue one-for-one, until both the
//! queue and the in-flight set are empty.
//!
//! Scheduling is single-threaded cooperative multiplexing: concurrency
//! comes from the transport holding many logical connections open, not from
//! worker threads here. The only blocking point is the transport's wait
//! step, bounded by a configurable timeout per cycle.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::base::Error;
use crate::exchange::Exchange;
use crate::transport::{Handle, Transport};

const DEFAULT_PARALLEL_LIMIT: usize = 40;
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Cooperative cancellation flag for a running batch.
///
/// Once set, the scheduler stops submitting new exchanges at the top of its
/// next loop iteration, aborts those still in flight, and surfaces every
/// remaining exchange as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Manages parallel execution of HTTP exchanges over one transport.
#[derive(Debug)]
pub struct Requester<T: Transport> {
    transport: T,
    parallel_limit: usize,
    wait_timeout: Duration,
    cancel: CancelToken,
    /// Exchanges still to execute, in FIFO order.
    queue: VecDeque<Exchange>,
    /// Handle -> exchange lookup for everything currently submitted.
    in_flight: HashMap<Handle, Exchange>,
}

impl<T: Transport> Requester<T> {
    /// Create a requester with the default parallel limit of 40.
    pub fn new(transport: T) -> Self {
        Self::with_limit(transport, DEFAULT_PARALLEL_LIMIT)
    }

    /// Create a requester allowing at most `parallel_limit` exchanges to be
    /// executing simultaneously.
    pub fn with_limit(transport: T, parallel_limit: usize) -> Self {
        Self {
            transport,
            parallel_limit,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            cancel: CancelToken::new(),
            queue: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Upper bound on the blocking wait per loop cycle.
    pub fn set_wait_timeout(&mut self, timeout: Duration) {
        self.wait_timeout = timeout;
    }

    pub fn parallel_limit(&self) -> usize {
        self.parallel_limit
    }

    /// A token that cancels the current (or next) run when set. Clones
    /// share the flag, so one can be handed to another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Schedule an exchange for execution.
    pub fn enqueue(&mut self, exchange: Exchange) {
        self.queue.push_back(exchange);
    }

    /// Schedule multiple exchanges for execution.
    pub fn enqueue_all(&mut self, exchanges: impl IntoIterator<Item = Exchange>) {
        for exchange in exchanges {
            self.enqueue(exchange);
        }
    }

    /// Number of exchanges waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The underlying transport engine.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute the current queue simultaneously.
    ///
    /// Exchanges are submitted in FIFO order but complete in
    /// transport-determined order; callback invocation order carries no
    /// guarantee. A single exchange's network failure is recorded on that
    /// exchange and never aborts the batch; a multiplexer-level fault
    /// aborts the whole run with [`Error::TransportFault`]. Finalization
    /// and validation errors also propagate synchronously from here.
    ///
    /// Returns the exchanges in completion order so outcomes can be
    /// inspected without callbacks.
    pub fn run(&mut self) -> Result<Vec<Exchange>, Error> {
        // reduce the parallel limit if it is greater than the size of the
        // queue, so the loop never waits for exchanges that don't exist
        let limit = self.parallel_limit.min(self.queue.len());
        if limit == 0 {
            return Ok(Vec::new());
        }
        debug!(queued = self.queue.len(), limit, "running exchange batch");

        let mut done = Vec::new();
        match self.run_loop(limit, &mut done) {
            Ok(()) => {
                debug!(completed = done.len(), "exchange batch drained");
                Ok(done)
            }
            Err(err) => {
                // a fault aborts the run outright; no partial recovery of
                // exchanges still in flight
                self.in_flight.clear();
                Err(err)
            }
        }
    }

    fn run_loop(&mut self, limit: usize, done: &mut Vec<Exchange>) -> Result<(), Error> {
        // fill the transport with the initial batch
        for _ in 0..limit {
            self.submit_next()?;
        }

        loop {
            if self.cancel.is_cancelled() {
                debug!("run cancelled, draining remaining exchanges");
                self.drain_cancelled(done);
                return Ok(());
            }

            for completion in self.transport.step()? {
                let Some(mut exchange) = self.in_flight.remove(&completion.handle) else {
                    trace!(handle = completion.handle.value(), "completion for unknown handle");
                    continue;
                };
                if let Err(err) = &completion.result {
                    warn!(url = %exchange.url(), error = %err, "exchange failed");
                }
                exchange.recover(completion.result);
                self.transport.remove(completion.handle);
                // replace the finished exchange before waiting again; the
                // in-flight count never exceeds the limit, even transiently
                if !self.queue.is_empty() {
                    self.submit_next()?;
                }
                done.push(exchange);
            }

            if self.queue.is_empty() && self.in_flight.is_empty() {
                return Ok(());
            }

            // block until something happens
            if !self.in_flight.is_empty() {
                self.transport.wait(self.wait_timeout)?;
            }
        }
    }

    /// Execute a single exchange immediately, bypassing the queue and the
    /// parallel limit: a direct, blocking send-and-recover.
    pub fn fire_one(&mut self, mut exchange: Exchange) -> Result<Exchange, Error> {
        exchange.finalize()?;
        let request = exchange.take_prepared()?;
        let handle = self.transport.submit(request)?;
        trace!(handle = handle.value(), url = %exchange.url(), "fired single exchange");

        loop {
            for completion in self.transport.step()? {
                if completion.handle == handle {
                    exchange.recover(completion.result);
                    self.transport.remove(handle);
                    return Ok(exchange);
                }
                trace!(
                    handle = completion.handle.value(),
                    "ignoring stray completion during single fire"
                );
            }
            self.transport.wait(self.wait_timeout)?;
        }
    }

    /// Move the front of the queue to the in-flight set, finalizing it as
    /// it goes.
    fn submit_next(&mut self) -> Result<(), Error> {
        let Some(mut exchange) = self.queue.pop_front() else {
            return Ok(());
        };
        exchange.finalize()?;
        let request = exchange.take_prepared()?;
        let handle = self.transport.submit(request)?;
        trace!(handle = handle.value(), url = %exchange.url(), "submitted exchange");
        self.in_flight.insert(handle, exchange);
        Ok(())
    }

    fn drain_cancelled(&mut self, done: &mut Vec<Exchange>) {
        for (handle, mut exchange) in self.in_flight.drain() {
            self.transport.cancel(handle);
            self.transport.remove(handle);
            exchange.mark_cancelled();
            done.push(exchange);
        }
        while let Some(mut exchange) = self.queue.pop_front() {
            exchange.mark_cancelled();
            done.push(exchange);
        }
    }
}
