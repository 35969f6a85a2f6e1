//! Scheduler behavior against the scripted transport: limit clamping,
//! one-for-one refill, failure isolation, fault aborts and cancellation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use volley::base::Error;
use volley::{
    CancelToken, Exchange, Plan, Requester, ScriptedTransport, TransportError,
};

fn get(url: &str) -> Exchange {
    Exchange::get(url).unwrap()
}

#[test]
fn empty_queue_returns_immediately() {
    let mut requester = Requester::new(ScriptedTransport::new());
    assert!(requester.run().unwrap().is_empty());
}

#[test]
fn limit_is_clamped_to_queue_length() {
    // M = 3 exchanges under a limit of 10: never more than 3 in flight
    let mut requester = Requester::with_limit(ScriptedTransport::new(), 10);
    for i in 0..3 {
        requester.enqueue(get(&format!("http://example.com/{i}")));
    }
    let done = requester.run().unwrap();

    assert_eq!(done.len(), 3);
    assert!(done.iter().all(Exchange::is_completed));
    assert_eq!(requester.transport().high_water_mark(), 3);
}

#[test]
fn bounded_refill_with_one_failure_completes_the_batch() {
    // L=2, 5 exchanges, the second fails at the transport level; each plan
    // takes a step so the refill machinery is actually exercised
    let transport = ScriptedTransport::new()
        .plan(Plan::ok("a").with_latency(1))
        .plan(Plan::fail(TransportError::ConnectionReset).with_latency(2))
        .plan(Plan::ok("c").with_latency(1))
        .plan(Plan::ok("d"))
        .plan(Plan::ok("e").with_latency(1));

    let completions: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut requester = Requester::with_limit(transport, 2);
    for i in 1..=5 {
        let mut exchange = get(&format!("http://example.com/{i}"));
        let log = Arc::clone(&completions);
        exchange.on_complete(move |ex| {
            log.lock()
                .unwrap()
                .push((ex.url().path().to_string(), ex.is_failed()));
        });
        requester.enqueue(exchange);
    }

    let done = requester.run().unwrap();

    assert_eq!(done.len(), 5);
    assert!(requester.transport().high_water_mark() <= 2);

    let failed: Vec<&Exchange> = done.iter().filter(|ex| ex.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url().path(), "/2");
    assert_eq!(failed[0].error(), Some(TransportError::ConnectionReset));
    assert_eq!(done.iter().filter(|ex| ex.is_completed()).count(), 4);

    // every callback fired exactly once
    let log = completions.lock().unwrap();
    assert_eq!(log.len(), 5);
    assert_eq!(log.iter().filter(|(_, failed)| *failed).count(), 1);
}

#[test]
fn completion_order_is_transport_determined() {
    // the first submission takes longest; completion order inverts
    let transport = ScriptedTransport::new()
        .plan(Plan::ok("slow").with_latency(3))
        .plan(Plan::ok("mid").with_latency(2))
        .plan(Plan::ok("fast"));

    let mut requester = Requester::with_limit(transport, 3);
    requester.enqueue(get("http://example.com/slow"));
    requester.enqueue(get("http://example.com/mid"));
    requester.enqueue(get("http://example.com/fast"));

    let done = requester.run().unwrap();
    let order: Vec<&str> = done.iter().map(|ex| ex.url().path()).collect();
    assert_eq!(order, vec!["/fast", "/mid", "/slow"]);
}

#[test]
fn multiplexer_fault_aborts_the_whole_run() {
    let transport = ScriptedTransport::new()
        .plan(Plan::ok("a").with_latency(5))
        .plan(Plan::ok("b").with_latency(5))
        .fault_on_step(2);

    let mut requester = Requester::with_limit(transport, 2);
    requester.enqueue(get("http://example.com/a"));
    requester.enqueue(get("http://example.com/b"));

    let err = requester.run().unwrap_err();
    assert!(matches!(err, Error::TransportFault { .. }));
}

#[test]
fn cancellation_surfaces_remaining_exchanges_as_cancelled() {
    // first exchange completes on the first step; the token is cancelled
    // from its callback, so the rest never run
    let transport = ScriptedTransport::new()
        .plan(Plan::ok("a"))
        .plan(Plan::ok("b").with_latency(10))
        .plan(Plan::ok("c").with_latency(10))
        .plan(Plan::ok("d").with_latency(10));

    let mut requester = Requester::with_limit(transport, 2);
    let token: CancelToken = requester.cancel_token();

    let mut first = get("http://example.com/a");
    let cancel = token.clone();
    first.on_complete(move |_| cancel.cancel());
    requester.enqueue(first);
    for path in ["b", "c", "d"] {
        requester.enqueue(get(&format!("http://example.com/{path}")));
    }

    let done = requester.run().unwrap();
    assert_eq!(done.len(), 4);
    assert_eq!(done.iter().filter(|ex| ex.is_completed()).count(), 1);
    assert_eq!(done.iter().filter(|ex| ex.is_cancelled()).count(), 3);
}

#[test]
fn cancelled_exchanges_still_get_their_callback() {
    let transport = ScriptedTransport::new().plan(Plan::ok("a").with_latency(10));
    let mut requester = Requester::with_limit(transport, 1);
    requester.set_wait_timeout(Duration::from_millis(1));
    let token = requester.cancel_token();
    token.cancel();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&observed);
    let mut exchange = get("http://example.com/a");
    exchange.on_complete(move |ex| log.lock().unwrap().push(ex.is_cancelled()));
    requester.enqueue(exchange);

    let done = requester.run().unwrap();
    assert_eq!(done.len(), 1);
    assert!(done[0].is_cancelled());
    assert_eq!(*observed.lock().unwrap(), vec![true]);
}

#[test]
fn fire_one_bypasses_the_queue() {
    let mut requester = Requester::with_limit(
        ScriptedTransport::new().plan(Plan::status(201, "created")),
        0, // a zero limit must not matter for the direct path
    );
    let exchange = requester.fire_one(get("http://example.com/direct")).unwrap();
    assert_eq!(exchange.response().unwrap().status(), 201);
}

#[test]
fn run_drains_queue_across_many_refills() {
    // 25 exchanges through a window of 4
    let mut transport = ScriptedTransport::new();
    for i in 0..25 {
        transport = transport.plan(Plan::ok("x").with_latency(i % 3));
    }
    let mut requester = Requester::with_limit(transport, 4);
    for i in 0..25 {
        requester.enqueue(get(&format!("http://example.com/{i}")));
    }

    let done = requester.run().unwrap();
    assert_eq!(done.len(), 25);
    assert!(done.iter().all(Exchange::is_completed));
    assert!(requester.transport().high_water_mark() <= 4);

    // a second run on the drained queue is a no-op
    assert!(requester.run().unwrap().is_empty());
}
