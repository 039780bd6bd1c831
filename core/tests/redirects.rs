/*
 * redirects.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for redirect following: chain limits, method rewriting,
 * credential stripping across origins and cookies set mid-chain.
 *
 * Run with:
 *   cargo test -p courier_core --test redirects
 */

mod support;

use courier_core::{BearerAuth, Error, RequestOptions, Session};
use support::{response, MockServer, Reply};

/// `/hop/N` redirects to `/hop/N-1`; `/hop/0` answers 200.
async fn chain_server() -> MockServer {
    MockServer::start(|req| {
        let n: u32 = req
            .path()
            .strip_prefix("/hop/")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        if n == 0 {
            response(200, &[], b"end")
        } else {
            let location = format!("/hop/{}", n - 1);
            response(302, &[("Location", location.as_str())], b"moved")
        }
    })
    .await
}

fn session(max_redirects: usize) -> Session {
    Session::builder()
        .trust_env(false)
        .max_redirects(max_redirects)
        .build()
        .unwrap()
}

#[tokio::test]
async fn chain_at_the_limit_is_followed() {
    let server = chain_server().await;
    let mut r = session(3).get(&server.url("/hop/3"), RequestOptions::new()).await.unwrap();
    assert_eq!(r.status(), 200);
    assert_eq!(r.text().await.unwrap(), "end");
    assert_eq!(r.url().path(), "/hop/0");
    let statuses: Vec<u16> = r.history().iter().map(|h| h.status()).collect();
    assert_eq!(statuses, vec![302, 302, 302]);
    assert_eq!(r.history()[0].url().path(), "/hop/3");
    // Intermediate bodies were drained, so one connection carried the whole chain.
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn chain_past_the_limit_fails() {
    let server = chain_server().await;
    let err = session(3)
        .get(&server.url("/hop/4"), RequestOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_redirect(), "{:?}", err);
    assert!(matches!(err, Error::TooManyRedirects { max: 3, .. }));
    assert_eq!(server.requests().len(), 4);
}

#[tokio::test]
async fn redirects_can_be_disabled() {
    let server = chain_server().await;
    let r = session(3)
        .get(&server.url("/hop/2"), RequestOptions::new().allow_redirects(false))
        .await
        .unwrap();
    assert_eq!(r.status(), 302);
    assert!(r.is_redirect());
    assert!(r.history().is_empty());
}

#[tokio::test]
async fn head_is_not_followed_by_default() {
    let server = MockServer::start(|req| match (req.method.as_str(), req.path()) {
        ("HEAD", "/") => {
            Reply::Respond(b"HTTP/1.1 301 Moved\r\nLocation: /elsewhere\r\nContent-Length: 0\r\n\r\n".to_vec())
        }
        _ => response(200, &[], b""),
    })
    .await;
    let session = session(5);
    let r = session.head(&server.url("/"), RequestOptions::new()).await.unwrap();
    assert_eq!(r.status(), 301);
    assert_eq!(server.requests().len(), 1);

    let r = session
        .head(&server.url("/"), RequestOptions::new().allow_redirects(true))
        .await
        .unwrap();
    assert_eq!(r.status(), 200);
    assert_eq!(r.history().len(), 1);
    let last = server.requests().pop().unwrap();
    assert_eq!(last.method, "HEAD");
    assert_eq!(last.path(), "/elsewhere");
}

#[tokio::test]
async fn see_other_turns_post_into_get() {
    let server = MockServer::start(|req| match req.path() {
        "/submit" => response(303, &[("Location", "/result")], b""),
        _ => response(200, &[], b"done"),
    })
    .await;
    let r = session(5)
        .post(&server.url("/submit"), RequestOptions::new().form([("a", "1")]))
        .await
        .unwrap();
    assert_eq!(r.status(), 200);

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].body, b"a=1");
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path(), "/result");
    assert!(requests[1].body.is_empty());
    assert_eq!(requests[1].header("content-type"), None);
}

#[tokio::test]
async fn temporary_redirect_replays_method_and_body() {
    let server = MockServer::start(|req| match req.path() {
        "/old" => response(307, &[("Location", "/new")], b""),
        _ => response(200, &[], b""),
    })
    .await;
    session(5)
        .put(&server.url("/old"), RequestOptions::new().body("payload"))
        .await
        .unwrap();
    let requests = server.requests();
    assert_eq!(requests[1].method, "PUT");
    assert_eq!(requests[1].path(), "/new");
    assert_eq!(requests[1].body, b"payload");
}

#[tokio::test]
async fn authorization_is_dropped_for_another_origin() {
    let target = MockServer::start(|_| response(200, &[], b"")).await;
    let elsewhere = target.url("/landing");
    let origin = MockServer::start(move |req| match req.path() {
        "/same" => response(302, &[("Location", "/moved")], b""),
        "/away" => response(302, &[("Location", elsewhere.as_str())], b""),
        _ => response(200, &[], b""),
    })
    .await;
    let session = session(5);
    let auth = || RequestOptions::new().auth(BearerAuth::new("secret"));

    session.get(&origin.url("/same"), auth()).await.unwrap();
    let seen = origin.requests();
    assert_eq!(seen[1].path(), "/moved");
    assert_eq!(seen[1].header("authorization"), Some("Bearer secret"));

    session.get(&origin.url("/away"), auth()).await.unwrap();
    let requests = target.requests();
    let landed = &requests[0];
    assert_eq!(landed.path(), "/landing");
    assert_eq!(landed.header("authorization"), None);
}

#[tokio::test]
async fn cookies_set_during_a_chain_are_sent_on_the_next_hop() {
    let server = MockServer::start(|req| match req.path() {
        "/start" => response(302, &[("Location", "/finish"), ("Set-Cookie", "step=1; Path=/")], b""),
        _ => response(200, &[], b""),
    })
    .await;
    let session = session(5);
    session.get(&server.url("/start"), RequestOptions::new()).await.unwrap();
    assert_eq!(server.requests()[1].header("cookie"), Some("step=1"));
    assert_eq!(session.cookies().get("step"), Some("1"));
}
