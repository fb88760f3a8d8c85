//! LOGIN and XOAUTH2 authentication.
//!
//! Both are ordinary commands to the connection task. LOGIN credentials are
//! always sent as quoted strings or literals. XOAUTH2 sends the SASL blob
//! after the server's first continuation request; a second continuation
//! carries a base64 JSON error and is answered with an empty line.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::config::AuthType;
use crate::command::Command;

/// SASL mechanism name for XOAUTH2.
pub const XOAUTH2: &str = "XOAUTH2";

/// Builds the XOAUTH2 initial response.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01`, base64 encoded.
#[must_use]
pub fn xoauth2_token(user: &str, access_token: &str) -> String {
    let auth_string = format!("user={user}\x01auth=Bearer {access_token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// Decodes the base64 payload of an XOAUTH2 error challenge for logging.
///
/// Returns the text unchanged if it is not base64.
#[must_use]
pub fn decode_challenge(text: &str) -> String {
    STANDARD.decode(text.trim()).map_or_else(
        |_| text.to_string(),
        |bytes| String::from_utf8_lossy(&bytes).into_owned(),
    )
}

/// Ready-to-use credentials.
///
/// `secret` is a password or an OAuth2 access token, depending on the
/// configured [`AuthType`]. It never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name or email address.
    pub username: String,
    /// Password or access token.
    pub secret: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Builds the command that signs in with these credentials.
    #[must_use]
    pub fn command(&self, auth_type: AuthType) -> Command {
        match auth_type {
            AuthType::Password => login_command(&self.username, &self.secret),
            AuthType::XOAuth2 => xoauth2_command(&self.username, &self.secret),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Builds a LOGIN command.
#[must_use]
pub fn login_command(username: &str, password: &str) -> Command {
    Command::Login {
        username: username.to_string(),
        password: password.to_string(),
    }
}

/// Builds an `AUTHENTICATE XOAUTH2` command carrying the SASL blob.
#[must_use]
pub fn xoauth2_command(user: &str, access_token: &str) -> Command {
    Command::Authenticate {
        mechanism: XOAUTH2.to_string(),
        response: Some(xoauth2_token(user, access_token)),
    }
}
