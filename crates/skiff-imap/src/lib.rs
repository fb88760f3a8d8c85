//! # skiff-imap
//!
//! An asynchronous IMAP4rev1 (RFC 3501) client core.
//!
//! ## Features
//!
//! - **One task per connection**: a spawned task owns the socket, runs
//!   commands one at a time in submission order, and answers each caller
//!   with a typed response
//! - **Literal-aware framing**: `{N}` literals are read as opaque byte runs
//!   and long or unusual strings are sent as synchronizing literals
//! - **Observable mailbox state**: `EXISTS`, `EXPUNGE`, `FETCH FLAGS` and
//!   UIDVALIDITY changes update a snapshot and fire listeners
//! - **Authentication**: LOGIN and SASL XOAUTH2
//! - **Keep-alive**: optional NOOPs while the connection is idle
//! - **TLS via rustls**: no OpenSSL dependency
//! - **Sans-I/O parser**: framing and parsing are separated from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use skiff_imap::{Client, Config, FetchItems, OpenMode};
//!
//! #[tokio::main]
//! async fn main() -> skiff_imap::Result<()> {
//!     let client = Client::connect(Config::new("imap.example.com")).await?;
//!     client.login("user@example.com", "password").await?;
//!
//!     let folders = client.list("", "*").await?;
//!     for folder in &folders.folders {
//!         println!("Folder: {}", folder.name);
//!     }
//!
//!     let mailbox = client.mailbox();
//!     mailbox.on_message_add(|old, new| println!("{} new messages", new - old));
//!
//!     let inbox = client.open("INBOX", OpenMode::Write).await?;
//!     println!("Messages: {}", inbox.exists);
//!
//!     let messages = client.fetch(1, Some(10), FetchItems::Fast).await?;
//!     println!("fetched {}", messages.len());
//!
//!     client.close().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌─────────────────────┐
//! │  NotAuthenticated   │ ─── login() / authenticate() ───→ Authenticated
//! └─────────────────────┘
//! ┌─────────────────────┐
//! │    Authenticated    │ ─── open() ───→ Selected
//! └─────────────────────┘
//! ┌─────────────────────┐
//! │      Selected       │ ─── unselect() ───→ Authenticated
//! └─────────────────────┘
//!   any state ─── logout() / server BYE ───→ Logout
//! ```
//!
//! A command that is not legal in the state it meets when it reaches the
//! front of the queue fails with [`Error::IllegalInState`] without being
//! sent.

#![forbid(unsafe_code)]

pub mod builder;
mod client;
pub mod command;
pub mod connection;
mod error;
pub mod message;
pub mod parser;
pub mod state;
pub mod types;
pub mod utf7;

pub use builder::{
    CapabilityResponse, CommandResponse, FetchResponse, ListResponse, NoopResponse, OpenMode,
    OpenResponse, SearchResponse, StatusResponse, StreamingFetchResponse,
};
pub use client::Client;
pub use command::{
    Command, CommandKind, FetchAttribute, FetchItems, SearchKey, StatusAttribute, StoreAction,
};
pub use connection::{AuthType, Config, ConfigBuilder, Credentials, Security, xoauth2_token};
pub use error::{Error, Result};
pub use message::ImapMessage;
pub use parser::{Response, ResponseParser, TaggedResponse, UntaggedResponse};
pub use state::{ConnectionState, ListenerId, MailboxHandle, SelectedMailboxState, SelectedState};
pub use types::{
    Capability, Flag, Flags, FolderAttribute, FolderMetadata, Mailbox, MailboxStatus,
    ResponseCode, SeqNum, SequenceSet, Status, Tag, Uid, UidValidity,
};

/// IMAP protocol version spoken by this crate.
pub const IMAP_VERSION: &str = "IMAP4rev1";
