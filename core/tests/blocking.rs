/*
 * blocking.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the blocking facade. The mock server runs on its own
 * tokio runtime; the client is driven from plain threads.
 *
 * Run with:
 *   cargo test -p courier_core --test blocking
 */

mod support;

use std::thread;

use courier_core::blocking;
use courier_core::{RequestOptions, SessionBuilder};
use support::{response, MockServer};
use tokio::runtime::Runtime;

fn server_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn blocking_get_reads_text_and_chunks() {
    let rt = server_runtime();
    let server = rt.block_on(MockServer::start(|req| match req.path() {
        "/text" => response(200, &[("Content-Type", "text/plain; charset=utf-8")], "grüße".as_bytes()),
        _ => response(200, &[], &[b'z'; 50_000]),
    }));

    let mut builder = SessionBuilder::new();
    builder.trust_env(false);
    let session = blocking::Session::from_builder(&builder).unwrap();

    let mut r = session.get(&server.url("/text"), RequestOptions::new()).unwrap();
    assert!(r.ok());
    assert_eq!(r.text().unwrap(), "grüße");

    let mut r = session
        .get(&server.url("/big"), RequestOptions::new().stream(true))
        .unwrap();
    let mut total = 0;
    for chunk in r.iter_content() {
        total += chunk.unwrap().len();
    }
    assert_eq!(total, 50_000);
    assert_eq!(r.iter_content().count(), 0);
    assert_eq!(session.idle_connections(), 1);

    session.close();
    assert!(session.is_closed());
}

#[test]
fn blocking_session_is_shared_across_threads() {
    let rt = server_runtime();
    let server = rt.block_on(MockServer::start(|req| response(200, &[], req.path().as_bytes())));

    let mut builder = SessionBuilder::new();
    builder.trust_env(false);
    let session = blocking::Session::from_builder(&builder).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let session = session.clone();
            let url = server.url(&format!("/thread/{}", i));
            thread::spawn(move || {
                let mut r = session.get(&url, RequestOptions::new()).unwrap();
                r.text().unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("/thread/{}", i));
    }
    assert_eq!(server.requests().len(), 8);
}

#[test]
fn blocking_session_can_run_on_a_caller_runtime() {
    let rt = server_runtime();
    let server = rt.block_on(MockServer::start(|_| response(204, &[], b"")));

    let inner = SessionBuilder::new().trust_env(false).build().unwrap();
    let session = blocking::Session::with_runtime_handle(inner, rt.handle().clone());
    let r = session.delete(&server.url("/item/1"), RequestOptions::new()).unwrap();
    assert_eq!(r.status(), 204);
    assert_eq!(server.requests()[0].method, "DELETE");
}

#[test]
fn blocking_one_shot_request() {
    let rt = server_runtime();
    let server = rt.block_on(MockServer::start(|_| response(200, &[], b"once")));
    // One-shot requests honour proxy variables, so only run when none are set.
    if ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]
        .iter()
        .any(|v| std::env::var_os(v).is_some())
    {
        return;
    }
    let mut r = blocking::get(&server.url("/"), RequestOptions::new()).unwrap();
    assert_eq!(r.bytes().unwrap(), &b"once"[..]);
}
