//! Scripted IMAP server over an in-memory duplex pipe.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use skiff_imap::{Client, Config};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

/// The server end of a test connection.
pub struct Server {
    io: BufReader<DuplexStream>,
}

impl Server {
    /// Reads one line the client wrote, without the CRLF.
    pub async fn read_line(&mut self) -> String {
        let mut line = String::new();
        let n = tokio::time::timeout(Duration::from_secs(5), self.io.read_line(&mut line))
            .await
            .expect("client wrote nothing")
            .unwrap();
        assert!(n > 0, "client closed the connection");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Asserts the next client line.
    pub async fn expect(&mut self, expected: &str) {
        assert_eq!(self.read_line().await, expected);
    }

    /// Writes raw server output. Lines must carry their own CRLF.
    pub async fn send(&mut self, text: &str) {
        self.io.get_mut().write_all(text.as_bytes()).await.unwrap();
    }

    /// Writes raw bytes, for output that is not valid UTF-8.
    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.io.get_mut().write_all(bytes).await.unwrap();
    }

    /// Writes each line followed by CRLF.
    pub async fn send_lines(&mut self, lines: &[&str]) {
        for line in lines {
            self.send(&format!("{line}\r\n")).await;
        }
    }

    /// Answers `LOGOUT` as a well-behaved server does.
    pub async fn accept_logout(&mut self, tag: &str) {
        self.expect(&format!("{tag} LOGOUT")).await;
        self.send_lines(&["* BYE logging out", &format!("{tag} OK LOGOUT completed")])
            .await;
    }

    /// Drops the server end, closing the connection.
    pub fn hang_up(self) {
        drop(self);
    }
}

/// Installs a test subscriber once; `RUST_LOG=skiff_imap=trace` shows the
/// wire traffic.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Plaintext test configuration.
pub fn config() -> Config {
    Config::builder("localhost")
        .security(skiff_imap::Security::None)
        .build()
}

/// Connects a client to a scripted server that greets with `greeting`.
pub async fn start_with(greeting: &str, config: Config) -> (skiff_imap::Result<Client>, Server) {
    init_tracing();
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let mut server = Server {
        io: BufReader::new(server_io),
    };
    server.send(&format!("{greeting}\r\n")).await;
    let client = Client::from_stream(client_io, config).await;
    (client, server)
}

/// Connects with a plain `* OK` greeting.
pub async fn start() -> (Client, Server) {
    let (client, server) = start_with("* OK IMAP4rev1 ready", config()).await;
    (client.unwrap(), server)
}

/// Connects and logs in as `user`/`pass` (tag `A0001`).
pub async fn logged_in() -> (Client, Server) {
    logged_in_with(config()).await
}

/// Like [`logged_in`] with a custom configuration.
pub async fn logged_in_with(config: Config) -> (Client, Server) {
    let (client, mut server) = start_with("* OK IMAP4rev1 ready", config).await;
    let client = client.unwrap();
    let (login, ()) = tokio::join!(client.login("user", "pass"), async {
        server.expect("A0001 LOGIN \"user\" \"pass\"").await;
        server.send("A0001 OK LOGIN completed\r\n").await;
    });
    login.unwrap();
    (client, server)
}

/// The SELECT INBOX exchange from RFC 3501 section 6.3.1.
pub const SELECT_INBOX: &[&str] = &[
    "* 172 EXISTS",
    "* 1 RECENT",
    "* OK [UNSEEN 12] Message 12 is first unseen",
    "* OK [UIDVALIDITY 3857529045] UIDs valid",
    "* OK [UIDNEXT 4392] Predicted next UID",
    "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)",
    "* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited",
];

/// Logs in and selects INBOX (tags `A0001`, `A0002`).
pub async fn selected() -> (Client, Server) {
    selected_with(config()).await
}

/// Like [`selected`] with a custom configuration.
pub async fn selected_with(config: Config) -> (Client, Server) {
    let (client, mut server) = logged_in_with(config).await;
    let (open, ()) = tokio::join!(client.select("INBOX"), async {
        server.expect("A0002 SELECT \"INBOX\"").await;
        server.send_lines(SELECT_INBOX).await;
        server.send("A0002 OK [READ-WRITE] SELECT completed\r\n").await;
    });
    open.unwrap();
    (client, server)
}
