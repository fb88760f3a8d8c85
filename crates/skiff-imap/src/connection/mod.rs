//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Configuration (host, port, security mode, timers)
//! - TLS/plaintext stream abstraction
//! - Framing of the inbound byte stream into response units
//! - The connection task that serializes commands and routes responses
//! - LOGIN and XOAUTH2 authentication
//! - Keep-alive NOOPs

mod auth;
mod config;
pub(crate) mod dispatcher;
mod framed;
mod keepalive;
mod stream;

pub use auth::{
    Credentials, XOAUTH2, decode_challenge, login_command, xoauth2_command, xoauth2_token,
};
pub use config::{AuthType, Config, ConfigBuilder, Security};
pub use framed::{DEFAULT_MAX_LINE_LENGTH, FramedStream, Framer, parse_literal_length};
pub use stream::{ImapStream, connect, create_tls_connector};
