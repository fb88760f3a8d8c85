//! Connection configuration types.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::framed::DEFAULT_MAX_LINE_LENGTH;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
            Self::Implicit => 993,
        }
    }
}

/// How [`crate::Client::authenticate`] signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// `LOGIN` with a password.
    #[default]
    Password,
    /// `AUTHENTICATE XOAUTH2` with an OAuth2 access token.
    XOAuth2,
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Authentication mechanism.
    pub auth_type: AuthType,
    /// Connect and TLS handshake timeout.
    pub connect_timeout: Duration,
    /// How long a caller waits for each command. `None` waits forever.
    pub command_timeout: Option<Duration>,
    /// Idle time before a keep-alive NOOP. Zero disables keep-alive.
    pub noop_keepalive_interval: Duration,
    /// Consecutive keep-alive failures tolerated before the connection fails.
    pub keepalive_max_failures: u32,
    /// Largest line or literal the framer accepts.
    pub max_line_length: usize,
    /// Split UID fetches into sets of at most this many UIDs.
    pub fetch_batch_size: Option<NonZeroUsize>,
    /// Leave a mailbox with CLOSE (expunging `\Deleted` messages) rather
    /// than UNSELECT.
    pub close_on_expunge: bool,
}

impl Config {
    /// Creates a configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Returns true if keep-alive NOOPs are enabled.
    #[must_use]
    pub const fn keepalive_enabled(&self) -> bool {
        !self.noop_keepalive_interval.is_zero()
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    auth_type: AuthType,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
    noop_keepalive_interval: Duration,
    keepalive_max_failures: u32,
    max_line_length: usize,
    fetch_batch_size: Option<NonZeroUsize>,
    close_on_expunge: bool,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            auth_type: AuthType::Password,
            connect_timeout: Duration::from_secs(30),
            command_timeout: None,
            noop_keepalive_interval: Duration::ZERO,
            keepalive_max_failures: 3,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            fetch_batch_size: None,
            close_on_expunge: true,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the authentication mechanism.
    #[must_use]
    pub const fn auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Sets the keep-alive interval. Zero disables keep-alive.
    #[must_use]
    pub const fn noop_keepalive_interval(mut self, interval: Duration) -> Self {
        self.noop_keepalive_interval = interval;
        self
    }

    /// Sets how many keep-alive failures in a row are tolerated.
    #[must_use]
    pub const fn keepalive_max_failures(mut self, failures: u32) -> Self {
        self.keepalive_max_failures = failures;
        self
    }

    /// Sets the framer's line and literal limit.
    #[must_use]
    pub const fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    /// Splits large UID fetches into batches.
    #[must_use]
    pub const fn fetch_batch_size(mut self, size: NonZeroUsize) -> Self {
        self.fetch_batch_size = Some(size);
        self
    }

    /// Chooses CLOSE (true) or UNSELECT (false) when leaving a mailbox.
    #[must_use]
    pub const fn close_on_expunge(mut self, close: bool) -> Self {
        self.close_on_expunge = close;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            auth_type: self.auth_type,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            noop_keepalive_interval: self.noop_keepalive_interval,
            keepalive_max_failures: self.keepalive_max_failures,
            max_line_length: self.max_line_length,
            fetch_batch_size: self.fetch_batch_size,
            close_on_expunge: self.close_on_expunge,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn config_new_defaults() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.auth_type, AuthType::Password);
        assert_eq!(config.keepalive_max_failures, 3);
        assert_eq!(config.max_line_length, 16 * 1024 * 1024);
        assert!(!config.keepalive_enabled());
        assert!(config.close_on_expunge);
        assert!(config.fetch_batch_size.is_none());
        assert!(config.command_timeout.is_none());
    }

    #[test]
    fn config_builder() {
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .auth_type(AuthType::XOAuth2)
            .connect_timeout(Duration::from_secs(10))
            .command_timeout(Duration::from_secs(5))
            .noop_keepalive_interval(Duration::from_secs(300))
            .fetch_batch_size(NonZeroUsize::new(500).unwrap())
            .close_on_expunge(false)
            .build();

        assert_eq!(config.port, 143);
        assert_eq!(config.auth_type, AuthType::XOAuth2);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Some(Duration::from_secs(5)));
        assert!(config.keepalive_enabled());
        assert_eq!(config.fetch_batch_size.map(NonZeroUsize::get), Some(500));
        assert!(!config.close_on_expunge);
    }

    #[test]
    fn explicit_port_wins() {
        let config = Config::builder("localhost")
            .security(Security::None)
            .port(1143)
            .build();
        assert_eq!(config.port, 1143);
    }
}
