//! Keep-alive NOOPs under paused time.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use skiff_imap::{Config, Error, Security};

use common::{logged_in_with, start_with};

fn keepalive_config(max_failures: u32) -> Config {
    Config::builder("localhost")
        .security(Security::None)
        .noop_keepalive_interval(Duration::from_secs(2))
        .keepalive_max_failures(max_failures)
        .build()
}

#[tokio::test(start_paused = true)]
async fn idle_connection_sends_noop() {
    let (client, mut server) = logged_in_with(keepalive_config(3)).await;

    server.expect("A0002 NOOP").await;
    server.send("A0002 OK NOOP completed\r\n").await;
    server.expect("A0003 NOOP").await;
    server.send("A0003 OK NOOP completed\r\n").await;

    assert!(client.is_logged_in());
}

#[tokio::test(start_paused = true)]
async fn no_keepalive_before_login() {
    let (client, mut server) = start_with("* OK ready", keepalive_config(3)).await;
    let client = client.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let (noop, ()) = tokio::join!(client.noop(), async {
        server.expect("A0001 NOOP").await;
        server.send("A0001 OK mine\r\n").await;
    });
    assert_eq!(noop.unwrap().text, "mine");
}

#[tokio::test(start_paused = true)]
async fn user_commands_push_the_deadline_back() {
    let (client, mut server) = logged_in_with(keepalive_config(3)).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let (noop, ()) = tokio::join!(client.noop(), async {
        server.expect("A0002 NOOP").await;
        server.send("A0002 OK user\r\n").await;
    });
    assert_eq!(noop.unwrap().text, "user");

    // The next NOOP is the keep-alive, two seconds after the user's command.
    let started = tokio::time::Instant::now();
    server.expect("A0003 NOOP").await;
    assert!(started.elapsed() >= Duration::from_secs(2));
    server.send("A0003 OK NOOP completed\r\n").await;
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_end_the_connection() {
    let (client, mut server) = logged_in_with(keepalive_config(1)).await;

    server.expect("A0002 NOOP").await;
    server.send("A0002 NO server busy\r\n").await;
    server.expect("A0003 NOOP").await;
    server.send("A0003 BAD try later\r\n").await;

    assert!(matches!(
        client.wait_closed().await,
        Err(Error::KeepAliveFailed(2))
    ));
    assert!(matches!(
        client.noop().await,
        Err(Error::KeepAliveFailed(2))
    ));
}

#[tokio::test(start_paused = true)]
async fn a_success_resets_the_failure_count() {
    let (client, mut server) = logged_in_with(keepalive_config(1)).await;

    server.expect("A0002 NOOP").await;
    server.send("A0002 NO busy\r\n").await;
    server.expect("A0003 NOOP").await;
    server.send("A0003 OK fine\r\n").await;
    server.expect("A0004 NOOP").await;
    server.send("A0004 NO busy\r\n").await;
    server.expect("A0005 NOOP").await;
    server.send("A0005 OK fine\r\n").await;

    assert!(client.is_logged_in());
}
