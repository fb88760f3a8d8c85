#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: sign in, list folders and watch INBOX for new mail
//!
//! Reads the server and credentials from the environment:
//!
//! - `IMAP_HOST` (port 993, implicit TLS)
//! - `IMAP_USER`
//! - `IMAP_PASSWORD`, or `IMAP_TOKEN` for XOAUTH2
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=skiff_imap=debug cargo run --package skiff-imap --example list_folders
//! ```

use std::env;
use std::time::Duration;

use skiff_imap::{AuthType, Client, Config, Credentials, FetchAttribute, FetchItems, OpenMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = env::var("IMAP_HOST")?;
    let user = env::var("IMAP_USER")?;
    let (auth_type, secret) = match env::var("IMAP_TOKEN") {
        Ok(token) => (AuthType::XOAuth2, token),
        Err(_) => (AuthType::Password, env::var("IMAP_PASSWORD")?),
    };

    let config = Config::builder(host)
        .auth_type(auth_type)
        .command_timeout(Duration::from_secs(60))
        .noop_keepalive_interval(Duration::from_secs(300))
        .build();

    println!("Connecting to {}:{}...", config.host, config.port);
    let client = Client::connect(config).await?;
    client.authenticate(&Credentials::new(user, secret)).await?;
    println!("✓ Authenticated");

    println!("\nFolders:");
    let list = client.list("", "*").await?;
    for folder in &list.folders {
        let marker = if folder.is_selectable() { " " } else { "-" };
        println!(" {} {}", marker, folder.name);
    }

    let mailbox = client.mailbox();
    mailbox.on_message_add(|old, new| println!("  {} new message(s)", new - old));
    mailbox.on_expunge(|seq| println!("  message {} expunged", seq));

    let inbox = client.open("INBOX", OpenMode::Read).await?;
    println!("\nINBOX: {} messages, {} recent", inbox.exists, inbox.recent);

    if inbox.exists > 0 {
        let start = inbox.exists.saturating_sub(4).max(1);
        let items = FetchItems::Items(vec![FetchAttribute::Uid, FetchAttribute::Envelope]);
        let subjects = client
            .fetch_streaming(start, None, items, |message| {
                let uid = message.uid().map(|u| u.get()).unwrap_or_default();
                let subject = message
                    .envelope()
                    .ok()
                    .and_then(|e| e.subject.clone())
                    .unwrap_or_default();
                format!("{:>8}  {}", uid, subject)
            })
            .await?;
        for line in subjects.results {
            println!("{line}");
        }
    }

    println!("\nWatching for 60 seconds...");
    tokio::time::sleep(Duration::from_secs(60)).await;
    let _ = client.noop().await?;

    client.close().await?;
    println!("✓ Disconnected");
    Ok(())
}
