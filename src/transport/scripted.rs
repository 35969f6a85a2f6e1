//! A deterministic in-memory transport.
//!
//! Completes submitted exchanges according to a script instead of touching
//! the network, so scheduler behavior (limit clamping, refill, failure
//! isolation, fault aborts) can be tested exactly. Also records every
//! submitted request and the high-water mark of concurrently held handles.

use bytes::Bytes;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::base::{Error, TransportError};
use crate::transport::{Completion, Handle, RawOutput, Transport, TransportRequest};

/// What should happen to one submitted exchange.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Complete with a synthesized response.
    Respond {
        status: u16,
        body: String,
        /// Progress steps before the completion is reported.
        latency: usize,
    },
    /// Fail with a transport error after `latency` steps.
    Fail {
        error: TransportError,
        latency: usize,
    },
}

impl Plan {
    /// A 200 response completing on the next step.
    pub fn ok(body: &str) -> Self {
        Plan::Respond {
            status: 200,
            body: body.to_string(),
            latency: 0,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Plan::Respond {
            status,
            body: body.to_string(),
            latency: 0,
        }
    }

    pub fn fail(error: TransportError) -> Self {
        Plan::Fail { error, latency: 0 }
    }

    pub fn with_latency(mut self, steps: usize) -> Self {
        match &mut self {
            Plan::Respond { latency, .. } | Plan::Fail { latency, .. } => *latency = steps,
        }
        self
    }

    fn latency(&self) -> usize {
        match self {
            Plan::Respond { latency, .. } | Plan::Fail { latency, .. } => *latency,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    handle: Handle,
    url: Url,
    remaining: usize,
    plan: Plan,
}

/// Scripted transport engine. Plans apply per submission order; submissions
/// beyond the scripted list fall back to a default 200 response.
#[derive(Debug)]
pub struct ScriptedTransport {
    plans: Vec<Plan>,
    next_handle: u64,
    submissions: usize,
    in_flight: Vec<InFlight>,
    /// Handles submitted and not yet removed.
    held: HashSet<Handle>,
    high_water: usize,
    /// Requests seen, in submission order.
    requests: Vec<TransportRequest>,
    /// Fault the multiplexer on this step number (1-based).
    fault_on_step: Option<usize>,
    steps_taken: usize,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            plans: Vec::new(),
            next_handle: 1,
            submissions: 0,
            in_flight: Vec::new(),
            held: HashSet::new(),
            high_water: 0,
            requests: Vec::new(),
            fault_on_step: None,
            steps_taken: 0,
        }
    }

    /// Append a plan for the next unscripted submission.
    pub fn plan(mut self, plan: Plan) -> Self {
        self.plans.push(plan);
        self
    }

    /// Fault the multiplexer on the given progress step (1-based).
    pub fn fault_on_step(mut self, step: usize) -> Self {
        self.fault_on_step = Some(step);
        self
    }

    /// Most handles held simultaneously over the transport's lifetime.
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }

    /// Requests submitted so far, in order.
    pub fn requests(&self) -> &[TransportRequest] {
        &self.requests
    }

    fn synthesize(url: &Url, status: u16, body: &str) -> RawOutput {
        let header_block = format!(
            "HTTP/1.1 {} X\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
            status,
            body.len()
        );
        let header_len = header_block.len();
        let mut bytes = header_block.into_bytes();
        bytes.extend_from_slice(body.as_bytes());
        RawOutput {
            bytes: Bytes::from(bytes),
            header_len,
            effective_url: url.clone(),
            status,
        }
    }
}

impl Transport for ScriptedTransport {
    fn submit(&mut self, request: TransportRequest) -> Result<Handle, Error> {
        let handle = Handle::new(self.next_handle);
        self.next_handle += 1;

        let plan = self
            .plans
            .get(self.submissions)
            .cloned()
            .unwrap_or_else(|| Plan::ok(""));
        self.submissions += 1;

        self.in_flight.push(InFlight {
            handle,
            url: request.url.clone(),
            remaining: plan.latency(),
            plan,
        });
        self.requests.push(request);

        self.held.insert(handle);
        self.high_water = self.high_water.max(self.held.len());
        Ok(handle)
    }

    fn step(&mut self) -> Result<Vec<Completion>, Error> {
        self.steps_taken += 1;
        if self.fault_on_step == Some(self.steps_taken) {
            return Err(Error::fault("scripted multiplexer fault"));
        }

        let mut finished = Vec::new();
        let mut still_running = Vec::new();
        for mut entry in self.in_flight.drain(..) {
            if entry.remaining == 0 {
                let result = match entry.plan {
                    Plan::Respond { status, ref body, .. } => {
                        Ok(Self::synthesize(&entry.url, status, body))
                    }
                    Plan::Fail { error, .. } => Err(error),
                };
                finished.push(Completion {
                    handle: entry.handle,
                    result,
                });
            } else {
                entry.remaining -= 1;
                still_running.push(entry);
            }
        }
        self.in_flight = still_running;
        Ok(finished)
    }

    fn wait(&mut self, _timeout: Duration) -> Result<(), Error> {
        // nothing to block on; progress happens in step()
        Ok(())
    }

    fn cancel(&mut self, handle: Handle) {
        self.in_flight.retain(|entry| entry.handle != handle);
    }

    fn remove(&mut self, handle: Handle) {
        self.held.remove(&handle);
    }
}
