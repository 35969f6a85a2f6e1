//! Exchange lifecycle coverage: finalization, validation, and outcome
//! delivery through a requester with a scripted transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use volley::base::Error;
use volley::{
    Exchange, FilePart, Plan, Requester, ScriptedTransport, TransportError,
};

#[test]
fn field_file_collision_fails_before_any_submission() {
    let mut exchange = Exchange::post("http://example.com/upload").unwrap();
    exchange.add_field("x", "value").unwrap();
    exchange
        .add_file("x", FilePart::from_bytes("x.bin", b"bytes".as_slice()))
        .unwrap();

    let mut requester = Requester::new(ScriptedTransport::new());
    requester.enqueue(exchange);
    let err = requester.run().unwrap_err();

    match err {
        Error::DuplicateFieldName { names } => assert_eq!(names, vec!["x".to_string()]),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn collision_keeps_transport_untouched() {
    let mut exchange = Exchange::post("http://example.com/upload").unwrap();
    exchange.add_field("x", "value").unwrap();
    exchange
        .add_file("x", FilePart::from_bytes("x.bin", b"bytes".as_slice()))
        .unwrap();

    let mut requester = Requester::new(ScriptedTransport::new());
    assert!(requester.fire_one(exchange).is_err());
    assert!(requester.transport().requests().is_empty());
}

#[test]
fn put_without_payload_raises_synchronously() {
    let exchange = Exchange::put("http://example.com/item").unwrap();
    let mut requester = Requester::new(ScriptedTransport::new());
    let err = requester.fire_one(exchange).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn callback_runs_once_with_outcome_set() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut exchange = Exchange::get("http://example.com/data.txt").unwrap();
    exchange.on_complete(move |ex| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert!(ex.is_completed());
        let response = ex.response().expect("outcome set before callback");
        assert_eq!(response.status(), 200);
    });

    let mut requester =
        Requester::new(ScriptedTransport::new().plan(Plan::status(200, "payload")));
    let exchange = requester.fire_one(exchange).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        exchange.response().unwrap().body().unwrap().as_ref(),
        b"payload"
    );
}

#[test]
fn failed_exchange_reports_error_not_response() {
    let mut requester = Requester::new(
        ScriptedTransport::new().plan(Plan::fail(TransportError::ConnectionRefused)),
    );
    let exchange = requester
        .fire_one(Exchange::get("http://example.com/").unwrap())
        .unwrap();

    assert!(exchange.is_failed());
    assert_eq!(exchange.error(), Some(TransportError::ConnectionRefused));
    assert!(exchange.response().is_none());
}

#[test]
fn body_can_be_released_in_the_callback() {
    let mut exchange = Exchange::get("http://example.com/big.bin").unwrap();
    exchange.on_complete(|ex| {
        if let Some(response) = ex.response_mut() {
            response.release_body();
        }
    });

    let mut requester =
        Requester::new(ScriptedTransport::new().plan(Plan::status(200, "large payload")));
    let exchange = requester.fire_one(exchange).unwrap();

    let response = exchange.response().unwrap();
    assert!(response.body().is_none());
    assert_eq!(response.status(), 200);
    assert_eq!(response.file_name(), Some("big.bin"));
}

#[test]
fn get_fields_travel_in_the_submitted_url() {
    let mut exchange = Exchange::get("http://example.com/search?page=3").unwrap();
    exchange.add_field("q", "volley client").unwrap();

    let mut requester = Requester::new(ScriptedTransport::new());
    let exchange = requester.fire_one(exchange).unwrap();

    // effective URL seen by the transport is echoed back by the scripted
    // engine as the response URL
    assert_eq!(
        exchange.response().unwrap().url().as_str(),
        "http://example.com/search?page=3&q=volley%20client"
    );
}
