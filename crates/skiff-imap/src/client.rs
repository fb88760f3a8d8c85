//! The application-facing client handle.
//!
//! A [`Client`] is a cheap, cloneable handle to one connection task. Every
//! operation submits a command to the task's queue and waits for its typed
//! response. Commands from any number of clones run one at a time, in the
//! order they were submitted.
//!
//! ```ignore
//! use skiff_imap::{Client, Config, FetchItems, OpenMode};
//!
//! let client = Client::connect(Config::new("imap.example.com")).await?;
//! client.login("user@example.com", "password").await?;
//!
//! let inbox = client.open("INBOX", OpenMode::Read).await?;
//! println!("{} messages", inbox.exists);
//!
//! let messages = client.fetch(1, Some(10), FetchItems::Fast).await?;
//! for message in messages.iter() {
//!     println!("{:?}", message.flags()?);
//! }
//!
//! client.close().await?;
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, FixedOffset};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};
use tracing::{debug, instrument};

use crate::builder::{
    CapabilityResponse, CommandResponse, FetchResponse, ListResponse, NoopResponse, OpenMode,
    OpenResponse, ResponseBuilder, SearchResponse, StatusResponse, StreamingFetchResponse,
};
use crate::command::{Command, FetchItems, SearchKey, StatusAttribute, StoreAction};
use crate::connection::dispatcher::{self, Handles, Request};
use crate::connection::{AuthType, Config, Credentials, connect, xoauth2_command};
use crate::message::ImapMessage;
use crate::parser::TaggedResponse;
use crate::state::{ConnectionState, MailboxHandle};
use crate::types::{Capability, Flag, Mailbox, SequenceSet};
use crate::{Error, Result};

/// Handle to an IMAP connection.
#[derive(Debug, Clone)]
pub struct Client {
    handles: Handles,
    config: Arc<Config>,
}

impl Client {
    /// Connects to the server described by `config` and reads the greeting.
    ///
    /// # Errors
    ///
    /// Transport and TLS errors, [`Error::Timeout`] on a slow connect, and
    /// [`Error::ConnectionClosing`] if the server greets with `BYE`.
    #[instrument(skip_all, fields(host = %config.host, port = config.port))]
    pub async fn connect(config: Config) -> Result<Self> {
        let stream = connect(&config).await?;
        Self::from_stream(stream, config).await
    }

    /// Starts a connection task over an already open stream.
    ///
    /// # Errors
    ///
    /// Fails if the greeting is `BYE`, malformed, or never arrives.
    pub async fn from_stream<S>(stream: S, config: Config) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let handles = dispatcher::spawn(stream, &config).await?;
        Ok(Self {
            handles,
            config: Arc::new(config),
        })
    }

    /// Returns the configuration the connection was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.handles.state.borrow().clone()
    }

    /// Returns a receiver that sees every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.handles.state.clone()
    }

    /// Returns true once LOGIN or AUTHENTICATE succeeded (or the server
    /// greeted with `PREAUTH`) and the connection has not logged out.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.handles.state.borrow().is_authenticated()
    }

    /// Capabilities last advertised by the server, from the greeting,
    /// authentication, or a CAPABILITY command.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        self.handles.capabilities.borrow().clone()
    }

    /// Returns the selected-mailbox handle for snapshots and listeners.
    #[must_use]
    pub fn mailbox(&self) -> MailboxHandle {
        self.handles.mailbox.clone()
    }

    /// Submits a command with the builder matching its kind.
    ///
    /// # Errors
    ///
    /// The command's own failure ([`Error::ServerNo`], [`Error::ServerBad`],
    /// [`Error::IllegalInState`], ...) or the connection's root cause.
    pub async fn execute(&self, command: Command) -> Result<CommandResponse> {
        let builder = ResponseBuilder::for_command(&command);
        self.submit(command, builder).await
    }

    /// Sends one command line written by hand, without the tag.
    ///
    /// Lines that [`Command::parse_line`] recognizes run as that command, so
    /// a raw `SELECT` opens the mailbox and a raw `FETCH` gets a typed
    /// response. Anything else is sent verbatim and answered with the tagged
    /// completion.
    ///
    /// # Errors
    ///
    /// The parse error for a malformed LOGIN, AUTHENTICATE, SELECT, EXAMINE,
    /// CLOSE, UNSELECT or LOGOUT line, since sending it verbatim would leave
    /// the tracked state behind the server's. Otherwise as for
    /// [`Client::execute`].
    pub async fn send_raw(&self, line: &str) -> Result<CommandResponse> {
        let command = match Command::parse_line(line) {
            Ok(command) => command,
            Err(err) if changes_state(line) => return Err(err),
            Err(err) => {
                debug!(error = %err, "sending unrecognized line verbatim");
                Command::Raw(line.trim_end_matches(['\r', '\n']).to_string())
            }
        };
        self.execute(command).await
    }

    async fn submit(&self, command: Command, builder: ResponseBuilder) -> Result<CommandResponse> {
        if let Some(cause) = self.exit_cause() {
            return Err(cause);
        }

        let (reply, response) = oneshot::channel();
        let request = Request {
            command,
            builder,
            reply,
        };
        if self.handles.requests.send(request).is_err() {
            return Err(self.root_cause());
        }

        let wait = async {
            match response.await {
                Ok(result) => result,
                Err(_) => Err(self.root_cause()),
            }
        };
        match self.config.command_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => wait.await,
        }
    }

    fn exit_cause(&self) -> Option<Error> {
        match &*self.handles.exit.borrow() {
            Some(Ok(())) => Some(Error::ConnectionClosing("connection closed".to_string())),
            Some(Err(err)) => Some(err.clone()),
            None => None,
        }
    }

    fn root_cause(&self) -> Error {
        self.exit_cause()
            .unwrap_or_else(|| Error::ConnectionClosing("connection task ended".to_string()))
    }

    async fn tagged(&self, command: Command) -> Result<TaggedResponse> {
        match self.execute(command).await? {
            CommandResponse::Tagged(tagged) => Ok(tagged),
            other => Err(unexpected(&other)),
        }
    }

    // --- Authentication ---

    /// Signs in with LOGIN.
    ///
    /// # Errors
    ///
    /// [`Error::AuthFailed`] if the server rejects the credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<TaggedResponse> {
        self.tagged(Credentials::new(username, password).command(AuthType::Password))
            .await
    }

    /// Signs in with `AUTHENTICATE XOAUTH2`.
    ///
    /// # Errors
    ///
    /// [`Error::AuthFailed`] if the token is rejected.
    #[instrument(skip(self, access_token))]
    pub async fn authenticate_xoauth2(
        &self,
        username: &str,
        access_token: &str,
    ) -> Result<TaggedResponse> {
        self.tagged(xoauth2_command(username, access_token)).await
    }

    /// Signs in with the mechanism chosen by [`Config::auth_type`].
    ///
    /// # Errors
    ///
    /// [`Error::AuthFailed`] if the server rejects the credentials.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<TaggedResponse> {
        self.tagged(credentials.command(self.config.auth_type)).await
    }

    /// Sends LOGOUT. The connection task ends after the completion.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn logout(&self) -> Result<TaggedResponse> {
        self.tagged(Command::Logout).await
    }

    // --- Mailboxes ---

    /// Lists mailboxes matching `pattern` under `reference`.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn list(&self, reference: &str, pattern: &str) -> Result<ListResponse> {
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        match self.execute(command).await? {
            CommandResponse::List(list) => Ok(list),
            other => Err(unexpected(&other)),
        }
    }

    /// Lists subscribed mailboxes.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn lsub(&self, reference: &str, pattern: &str) -> Result<ListResponse> {
        let command = Command::Lsub {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        match self.execute(command).await? {
            CommandResponse::List(list) => Ok(list),
            other => Err(unexpected(&other)),
        }
    }

    /// Opens a mailbox with SELECT ([`OpenMode::Write`]) or EXAMINE
    /// ([`OpenMode::Read`]).
    ///
    /// # Errors
    ///
    /// [`Error::IllegalInState`] while another mailbox is being opened, and
    /// [`Error::ServerNo`] if the mailbox does not exist.
    pub async fn open(&self, mailbox: impl Into<Mailbox>, mode: OpenMode) -> Result<OpenResponse> {
        let mailbox = mailbox.into();
        let command = match mode {
            OpenMode::Write => Command::Select { mailbox },
            OpenMode::Read => Command::Examine { mailbox },
        };
        match self.execute(command).await? {
            CommandResponse::Open(open) => Ok(open),
            other => Err(unexpected(&other)),
        }
    }

    /// Opens a mailbox read-write.
    ///
    /// # Errors
    ///
    /// As for [`Client::open`].
    pub async fn select(&self, mailbox: impl Into<Mailbox>) -> Result<OpenResponse> {
        self.open(mailbox, OpenMode::Write).await
    }

    /// Opens a mailbox read-only.
    ///
    /// # Errors
    ///
    /// As for [`Client::open`].
    pub async fn examine(&self, mailbox: impl Into<Mailbox>) -> Result<OpenResponse> {
        self.open(mailbox, OpenMode::Read).await
    }

    /// Leaves the selected mailbox: CLOSE when `close_on_expunge` is set
    /// (expunging `\Deleted` messages), UNSELECT otherwise.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn unselect(&self) -> Result<TaggedResponse> {
        let command = if self.config.close_on_expunge {
            Command::Close
        } else {
            Command::Unselect
        };
        self.tagged(command).await
    }

    /// Creates a mailbox.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn create(&self, mailbox: impl Into<Mailbox>) -> Result<TaggedResponse> {
        self.tagged(Command::Create {
            mailbox: mailbox.into(),
        })
        .await
    }

    /// Deletes a mailbox.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn delete(&self, mailbox: impl Into<Mailbox>) -> Result<TaggedResponse> {
        self.tagged(Command::Delete {
            mailbox: mailbox.into(),
        })
        .await
    }

    /// Asks for a mailbox's counters without selecting it.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn status(
        &self,
        mailbox: impl Into<Mailbox>,
        items: &[StatusAttribute],
    ) -> Result<StatusResponse> {
        let command = Command::Status {
            mailbox: mailbox.into(),
            items: items.to_vec(),
        };
        match self.execute(command).await? {
            CommandResponse::Status(status) => Ok(status),
            other => Err(unexpected(&other)),
        }
    }

    /// Appends a message to a mailbox.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn append(
        &self,
        mailbox: impl Into<Mailbox>,
        flags: &[Flag],
        date: Option<DateTime<FixedOffset>>,
        message: impl Into<Vec<u8>>,
    ) -> Result<TaggedResponse> {
        self.tagged(Command::Append {
            mailbox: mailbox.into(),
            flags: flags.to_vec(),
            date,
            message: message.into(),
        })
        .await
    }

    // --- Any state ---

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn noop(&self) -> Result<NoopResponse> {
        match self.execute(Command::Noop).await? {
            CommandResponse::Noop(noop) => Ok(noop),
            other => Err(unexpected(&other)),
        }
    }

    /// Asks the server for its capabilities.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn capability(&self) -> Result<CapabilityResponse> {
        match self.execute(Command::Capability).await? {
            CommandResponse::Capability(caps) => Ok(caps),
            other => Err(unexpected(&other)),
        }
    }

    // --- Selected ---

    /// Fetches messages `start..=end` by sequence number; `end = None`
    /// means the last message.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn fetch(
        &self,
        start: u32,
        end: Option<u32>,
        items: FetchItems,
    ) -> Result<FetchResponse> {
        self.fetch_set(SequenceSet::span(start, end), items, false).await
    }

    /// Fetches messages by UID, in batches of `fetch_batch_size` UIDs when
    /// one is configured.
    ///
    /// # Errors
    ///
    /// The first batch failure.
    pub async fn uid_fetch(&self, uids: &SequenceSet, items: FetchItems) -> Result<FetchResponse> {
        let Some(size) = self.config.fetch_batch_size else {
            return self.fetch_set(uids.clone(), items, true).await;
        };

        let batches = uids.chunks(size);
        debug!(batches = batches.len(), "split UID FETCH");
        let mut merged: Option<FetchResponse> = None;
        for batch in batches {
            let response = self.fetch_set(batch, items.clone(), true).await?;
            match merged.as_mut() {
                Some(merged) => merged.extend(response),
                None => merged = Some(response),
            }
        }
        match merged {
            Some(merged) => Ok(merged),
            None => self.fetch_set(uids.clone(), items, true).await,
        }
    }

    async fn fetch_set(
        &self,
        sequence: SequenceSet,
        items: FetchItems,
        uid: bool,
    ) -> Result<FetchResponse> {
        let command = Command::Fetch {
            sequence,
            items,
            uid,
        };
        match self.execute(command).await? {
            CommandResponse::Fetch(fetch) => Ok(fetch),
            other => Err(unexpected(&other)),
        }
    }

    /// Fetches messages and hands each one to `callback` as it arrives,
    /// without keeping the messages. The callback runs on the connection
    /// task; its return values are collected in arrival order.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn fetch_streaming<T, F>(
        &self,
        start: u32,
        end: Option<u32>,
        items: FetchItems,
        mut callback: F,
    ) -> Result<StreamingFetchResponse<T>>
    where
        F: FnMut(ImapMessage) -> T + Send + 'static,
        T: Send + 'static,
    {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let builder = ResponseBuilder::streaming(Box::new(move |message| {
            let value = callback(message);
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(value);
        }));

        let command = Command::Fetch {
            sequence: SequenceSet::span(start, end),
            items,
            uid: false,
        };
        let response = match self.submit(command, builder).await? {
            CommandResponse::StreamingFetch(response) => response,
            other => return Err(unexpected(&other)),
        };
        let results =
            std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(response.with_results(results))
    }

    /// Searches by sequence number.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn search(&self, criteria: SearchKey) -> Result<SearchResponse> {
        self.search_with(criteria, false).await
    }

    /// Searches by UID.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn uid_search(&self, criteria: SearchKey) -> Result<SearchResponse> {
        self.search_with(criteria, true).await
    }

    async fn search_with(&self, criteria: SearchKey, uid: bool) -> Result<SearchResponse> {
        match self.execute(Command::Search { criteria, uid }).await? {
            CommandResponse::Search(search) => Ok(search),
            other => Err(unexpected(&other)),
        }
    }

    /// Changes flags by sequence number. Flag updates reported by the
    /// server reach [`MailboxHandle::on_flags_change`] listeners.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn store(
        &self,
        sequence: &SequenceSet,
        action: StoreAction,
    ) -> Result<TaggedResponse> {
        self.store_with(sequence, action, false, false).await
    }

    /// Like [`Client::store`] with `.SILENT`: the server does not echo the
    /// new flags, so listeners only hear of changes made by others.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn store_silent(
        &self,
        sequence: &SequenceSet,
        action: StoreAction,
    ) -> Result<TaggedResponse> {
        self.store_with(sequence, action, false, true).await
    }

    /// Changes flags by UID.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn uid_store(
        &self,
        uids: &SequenceSet,
        action: StoreAction,
    ) -> Result<TaggedResponse> {
        self.store_with(uids, action, true, false).await
    }

    /// Changes flags by UID with `.SILENT`.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn uid_store_silent(
        &self,
        uids: &SequenceSet,
        action: StoreAction,
    ) -> Result<TaggedResponse> {
        self.store_with(uids, action, true, true).await
    }

    async fn store_with(
        &self,
        sequence: &SequenceSet,
        action: StoreAction,
        uid: bool,
        silent: bool,
    ) -> Result<TaggedResponse> {
        self.tagged(Command::Store {
            sequence: sequence.clone(),
            action,
            uid,
            silent,
        })
        .await
    }

    /// Copies messages by sequence number.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn copy(
        &self,
        sequence: &SequenceSet,
        mailbox: impl Into<Mailbox>,
    ) -> Result<TaggedResponse> {
        self.tagged(Command::Copy {
            sequence: sequence.clone(),
            mailbox: mailbox.into(),
            uid: false,
        })
        .await
    }

    /// Copies messages by UID.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn uid_copy(
        &self,
        uids: &SequenceSet,
        mailbox: impl Into<Mailbox>,
    ) -> Result<TaggedResponse> {
        self.tagged(Command::Copy {
            sequence: uids.clone(),
            mailbox: mailbox.into(),
            uid: true,
        })
        .await
    }

    /// Permanently removes `\Deleted` messages. Each removal reaches
    /// [`MailboxHandle::on_expunge`] listeners.
    ///
    /// # Errors
    ///
    /// As for [`Client::execute`].
    pub async fn expunge(&self) -> Result<TaggedResponse> {
        self.tagged(Command::Expunge).await
    }

    // --- Shutdown ---

    /// Waits until the connection task ends.
    ///
    /// # Errors
    ///
    /// The root cause if the connection failed rather than logging out.
    pub async fn wait_closed(&self) -> Result<()> {
        let mut exit = self.handles.exit.clone();
        // The task publishes its outcome before dropping the sender.
        let _ = exit.wait_for(Option::is_some).await;
        let outcome = exit.borrow().clone();
        outcome.unwrap_or(Ok(()))
    }

    /// Logs out if still connected and waits for the task to end.
    ///
    /// # Errors
    ///
    /// The root cause if the connection had already failed.
    pub async fn close(&self) -> Result<()> {
        if self.exit_cause().is_none() && !self.connection_state().is_logout() {
            match self.logout().await {
                Ok(_) | Err(Error::ConnectionClosing(_)) => {}
                Err(err) => debug!(error = %err, "logout during close failed"),
            }
        }
        self.wait_closed().await
    }
}

/// Returns true if the line's verb moves the connection between states.
fn changes_state(line: &str) -> bool {
    let verb = line.split_ascii_whitespace().next().unwrap_or_default();
    ["LOGIN", "AUTHENTICATE", "SELECT", "EXAMINE", "CLOSE", "UNSELECT", "LOGOUT"]
        .iter()
        .any(|v| verb.eq_ignore_ascii_case(v))
}

fn unexpected(response: &CommandResponse) -> Error {
    Error::ProtocolMismatch(format!("unexpected response type: {response:?}"))
}
