//! The connection task.
//!
//! One spawned task owns the socket and every piece of protocol state. It
//! takes commands from an unbounded channel, runs them one at a time in
//! submission order, routes each inbound response, and answers the caller
//! through a oneshot channel. Pipelining is off: the builder for an untagged
//! response is always the active command's builder.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, trace, warn};

use super::auth::decode_challenge;
use super::config::Config;
use super::framed::FramedStream;
use super::keepalive::KeepAlive;
use crate::builder::{CommandResponse, OpenMode, ResponseBuilder};
use crate::command::{Command, CommandKind, TagGenerator};
use crate::parser::{Response, ResponseParser, TaggedResponse, UntaggedResponse};
use crate::state::mailbox::MailboxTracker;
use crate::state::{ConnectionState, MailboxHandle, SelectedState};
use crate::types::{Capability, Mailbox, ResponseCode, Status, Tag};
use crate::{Error, Result};

pub(crate) type Reply = oneshot::Sender<Result<CommandResponse>>;

/// How the connection task ended: `None` while it runs.
pub(crate) type Exit = Option<Result<()>>;

/// A command submitted by the client.
pub(crate) struct Request {
    pub(crate) command: Command,
    pub(crate) builder: ResponseBuilder,
    pub(crate) reply: Reply,
}

/// Channels the client keeps after spawning the task.
#[derive(Debug, Clone)]
pub(crate) struct Handles {
    pub(crate) requests: mpsc::UnboundedSender<Request>,
    pub(crate) state: watch::Receiver<ConnectionState>,
    pub(crate) capabilities: watch::Receiver<Vec<Capability>>,
    pub(crate) exit: watch::Receiver<Exit>,
    pub(crate) mailbox: MailboxHandle,
}

struct Pending {
    command: Command,
    builder: ResponseBuilder,
    /// `None` for the internal keep-alive NOOP.
    reply: Option<Reply>,
}

impl Pending {
    fn reject(self, err: Error) {
        if let Some(reply) = self.reply {
            let _ = reply.send(Err(err));
        }
    }

    const fn is_keepalive(&self) -> bool {
        self.reply.is_none()
    }
}

struct Active {
    tag: Tag,
    pending: Pending,
    /// Segments still waiting for a continuation request.
    segments: VecDeque<Vec<u8>>,
    summary: String,
    sasl_rejected: bool,
    started: Instant,
}

/// Spawns the connection task over `stream` and waits for the greeting.
///
/// # Errors
///
/// Fails if the greeting is `BYE`, malformed, or the stream fails first.
pub(crate) async fn spawn<S>(stream: S, config: &Config) -> Result<Handles>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (requests_tx, requests) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::NotAuthenticated);
    let (capabilities_tx, capabilities_rx) = watch::channel(Vec::new());
    let (exit_tx, exit_rx) = watch::channel(None);
    let (ready_tx, ready_rx) = oneshot::channel();

    let mailbox = MailboxTracker::new();
    let handles = Handles {
        requests: requests_tx,
        state: state_rx,
        capabilities: capabilities_rx,
        exit: exit_rx,
        mailbox: mailbox.handle(),
    };

    let connection = Connection {
        framed: FramedStream::with_max_line_length(stream, config.max_line_length),
        requests,
        requests_open: true,
        queue: VecDeque::new(),
        active: None,
        tags: TagGenerator::default(),
        state: ConnectionState::NotAuthenticated,
        state_tx,
        capabilities_tx,
        mailbox,
        keepalive: KeepAlive::new(config.noop_keepalive_interval, config.keepalive_max_failures),
        exit_tx,
        ready: Some(ready_tx),
    };
    tokio::spawn(connection.run());

    match ready_rx.await {
        Ok(Ok(())) => Ok(handles),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(Error::ConnectionClosing(
            "connection task ended before the greeting".to_string(),
        )),
    }
}

struct Connection<S> {
    framed: FramedStream<S>,
    requests: mpsc::UnboundedReceiver<Request>,
    requests_open: bool,
    queue: VecDeque<Pending>,
    active: Option<Active>,
    tags: TagGenerator,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    capabilities_tx: watch::Sender<Vec<Capability>>,
    mailbox: MailboxTracker,
    keepalive: KeepAlive,
    exit_tx: watch::Sender<Exit>,
    ready: Option<oneshot::Sender<Result<()>>>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn run(mut self) {
        let result = self.serve().await;
        let cause = match &result {
            Ok(()) => {
                debug!("connection closed");
                Error::ConnectionClosing("connection closed".to_string())
            }
            Err(err) => {
                error!(error = %err, "connection failed");
                err.clone()
            }
        };

        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(cause.clone()));
        }
        self.set_state(ConnectionState::Logout);
        self.mailbox.close();
        self.exit_tx.send_replace(Some(result));
        self.fail_all(&cause);
        let _ = self.framed.shutdown().await;
    }

    async fn serve(&mut self) -> Result<()> {
        self.greeting().await?;

        loop {
            self.activate_next().await?;

            if self.state.is_logout() && self.active.is_none() {
                return Ok(());
            }
            if !self.requests_open && self.active.is_none() && self.queue.is_empty() {
                return Ok(());
            }
            self.arm_keepalive();

            let deadline = self.keepalive.deadline();
            tokio::select! {
                request = self.requests.recv(), if self.requests_open => match request {
                    Some(request) => self.enqueue(request),
                    None => self.requests_open = false,
                },
                unit = self.framed.read_unit() => {
                    let unit = unit?;
                    self.handle_unit(&unit).await?;
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.keepalive.cancel();
                    debug!("sending keep-alive NOOP");
                    self.queue.push_back(Pending {
                        command: Command::Noop,
                        builder: ResponseBuilder::Noop,
                        reply: None,
                    });
                }
            }
        }
    }

    async fn greeting(&mut self) -> Result<()> {
        let unit = self.framed.read_unit().await?;
        trace!(unit = %String::from_utf8_lossy(&unit).trim_end(), "IMAP RECV");
        let (state, code) = match ResponseParser::parse(&unit)? {
            Response::Untagged(UntaggedResponse::Ok { code, .. }) => {
                (ConnectionState::NotAuthenticated, code)
            }
            Response::Untagged(UntaggedResponse::PreAuth { code, .. }) => {
                (ConnectionState::Authenticated, code)
            }
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                return Err(Error::ConnectionClosing(text));
            }
            other => {
                return Err(Error::ProtocolMismatch(format!(
                    "unexpected greeting: {other:?}"
                )));
            }
        };
        if let Some(ResponseCode::Capability(caps)) = code {
            self.capabilities_tx.send_replace(caps);
        }
        debug!(state = %state, "greeting received");
        self.set_state(state);
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Ok(()));
        }
        Ok(())
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "connection state changed");
            self.state = state.clone();
            self.state_tx.send_replace(state);
        }
    }

    fn arm_keepalive(&mut self) {
        if self.active.is_none()
            && self.queue.is_empty()
            && self.keepalive.deadline().is_none()
            && self.state.is_authenticated()
        {
            self.keepalive.schedule(Instant::now());
        }
    }

    /// Mailbox a queued or active SELECT/EXAMINE is opening.
    fn opening_mailbox(&self) -> Option<&Mailbox> {
        self.active
            .iter()
            .map(|a| &a.pending.command)
            .chain(self.queue.iter().map(|p| &p.command))
            .find_map(Command::opened_mailbox)
    }

    fn enqueue(&mut self, request: Request) {
        self.keepalive.cancel();

        if let Some(target) = request.command.opened_mailbox()
            && let Some(opening) = self.opening_mailbox()
            && opening != target
        {
            let err = Error::IllegalInState {
                command: request.command.kind().verb().to_string(),
                state: format!("{} while opening {opening}", self.state.name()),
            };
            debug!(error = %err, "rejecting overlapping open");
            let _ = request.reply.send(Err(err));
            return;
        }

        self.queue.push_back(Pending {
            command: request.command,
            builder: request.builder,
            reply: Some(request.reply),
        });
    }

    /// Writes the next queued command if none is active.
    async fn activate_next(&mut self) -> Result<()> {
        while self.active.is_none() {
            let Some(pending) = self.queue.pop_front() else {
                return Ok(());
            };
            let kind = pending.command.kind();
            if self.state.is_logout() {
                pending.reject(Error::ConnectionClosing("logged out".to_string()));
                continue;
            }
            if !self.state.permits(kind) {
                let err = Error::IllegalInState {
                    command: kind.verb().to_string(),
                    state: self.state.name().to_string(),
                };
                debug!(error = %err, "command rejected");
                pending.reject(err);
                continue;
            }

            let tag = self.tags.next_tag();
            let encoded = match pending.command.encode(&tag) {
                Ok(encoded) => encoded,
                Err(err) => {
                    pending.reject(err);
                    continue;
                }
            };
            let summary = encoded.summary().to_string();
            let (first, segments) = match encoded.split_first() {
                Ok(split) => split,
                Err(err) => {
                    warn!(error = %err, "command rejected");
                    pending.reject(err);
                    continue;
                }
            };

            debug!(command = %summary, literals = segments.len(), "IMAP SEND");
            if let Some(mailbox) = pending.command.opened_mailbox() {
                self.mailbox.begin_open(mailbox.clone());
            }
            self.active = Some(Active {
                tag,
                pending,
                segments,
                summary,
                sasl_rejected: false,
                started: Instant::now(),
            });
            self.framed.write_all(&first).await?;
            self.framed.flush().await?;
        }
        Ok(())
    }

    async fn handle_unit(&mut self, unit: &[u8]) -> Result<()> {
        if tracing::enabled!(tracing::Level::TRACE) {
            let first_line = unit.split(|&b| b == b'\n').next().unwrap_or_default();
            trace!(
                len = unit.len(),
                line = %String::from_utf8_lossy(first_line).trim_end(),
                "IMAP RECV"
            );
        }
        match ResponseParser::parse(unit)? {
            Response::Continuation { text } => self.on_continuation(&text).await,
            Response::Untagged(untagged) => self.on_untagged(untagged),
            Response::Tagged(tagged) => self.on_tagged(tagged),
        }
    }

    async fn on_continuation(&mut self, text: &str) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            warn!(text, "continuation request with no command in flight");
            return Ok(());
        };

        if let Some(segment) = active.segments.pop_front() {
            trace!(tag = %active.tag, remaining = active.segments.len(), "sending literal");
            self.framed.write_all(&segment).await?;
            return self.framed.flush().await;
        }

        if active.pending.command.kind() == CommandKind::Authenticate {
            warn!(
                tag = %active.tag,
                challenge = %decode_challenge(text),
                "authentication challenge rejected"
            );
            active.sasl_rejected = true;
            self.framed.write_all(b"\r\n").await?;
            return self.framed.flush().await;
        }

        warn!(tag = %active.tag, text, "unexpected continuation request");
        Ok(())
    }

    fn on_untagged(&mut self, response: UntaggedResponse) -> Result<()> {
        if let UntaggedResponse::Bye { text, .. } = &response {
            let logging_out = self
                .active
                .as_ref()
                .is_some_and(|a| a.pending.command.kind() == CommandKind::Logout);
            self.set_state(ConnectionState::Logout);
            if logging_out {
                debug!(text = %text, "server acknowledged logout");
                return Ok(());
            }
            warn!(text = %text, "server closed the connection");
            return Err(Error::ConnectionClosing(text.clone()));
        }

        self.mailbox.observe(&response);
        if let UntaggedResponse::Capability(caps) = &response {
            self.capabilities_tx.send_replace(caps.clone());
        }
        if let UntaggedResponse::Ok {
            code: Some(ResponseCode::Alert),
            text,
        } = &response
        {
            warn!(alert = %text, "server alert");
        }

        match self.active.as_mut() {
            Some(active) => active.pending.builder.on_untagged(response),
            None => trace!(?response, "unsolicited response"),
        }
        Ok(())
    }

    fn on_tagged(&mut self, tagged: TaggedResponse) -> Result<()> {
        let Some(active) = self.active.take() else {
            warn!(tag = %tagged.tag, "tagged response with no command in flight");
            return Err(Error::ProtocolMismatch(format!(
                "tagged response {} with no command in flight",
                tagged.tag
            )));
        };
        if tagged.tag != active.tag {
            warn!(expected = %active.tag, got = %tagged.tag, "tag mismatch");
            let err = Error::ProtocolMismatch(format!(
                "expected completion for {}, got {}",
                active.tag, tagged.tag
            ));
            active.pending.reject(err.clone());
            return Err(err);
        }

        let Active {
            tag,
            pending,
            summary,
            sasl_rejected,
            started,
            ..
        } = active;
        let kind = pending.command.kind();
        let status = tagged.status;
        debug!(
            %tag,
            command = %summary,
            ?status,
            elapsed_ms = started.elapsed().as_millis(),
            "IMAP DONE"
        );

        let failure = match status {
            Status::Ok => None,
            Status::No if kind.is_auth() || sasl_rejected => {
                Some(Error::AuthFailed(tagged.text.clone()))
            }
            Status::No => Some(Error::ServerNo {
                text: tagged.text.clone(),
                code: tagged.code.clone(),
            }),
            _ => Some(Error::ServerBad {
                text: tagged.text.clone(),
                code: tagged.code.clone(),
            }),
        };

        if failure.is_none()
            && kind.is_auth()
            && let Some(ResponseCode::Capability(caps)) = &tagged.code
        {
            self.capabilities_tx.send_replace(caps.clone());
        }

        let keepalive = pending.is_keepalive();
        let response = pending.builder.finish(tagged);
        self.apply_transition(kind, failure.is_none(), &response);

        let result = match failure {
            Some(err) => Err(err),
            None => Ok(response),
        };

        if keepalive {
            match &result {
                Ok(_) => self.keepalive.record_success(),
                Err(err) => {
                    self.keepalive.record_failure(err)?;
                    debug!(failures = self.keepalive.failures(), "keep-alive will retry");
                }
            }
        } else if let Some(reply) = pending.reply {
            if reply.send(result).is_err() {
                debug!(%tag, "caller went away; response discarded");
            }
        }
        Ok(())
    }

    fn apply_transition(&mut self, kind: CommandKind, ok: bool, response: &CommandResponse) {
        match (kind, ok, response) {
            (CommandKind::Login | CommandKind::Authenticate, true, _) => {
                self.set_state(ConnectionState::Authenticated);
            }
            (CommandKind::Select | CommandKind::Examine, true, CommandResponse::Open(open)) => {
                self.mailbox.finish_open(open);
                self.set_state(ConnectionState::Selected(SelectedState::new(
                    open.mailbox.clone(),
                    open.mode == OpenMode::Read,
                )));
            }
            (CommandKind::Select | CommandKind::Examine, false, _) => {
                self.mailbox.abort_open();
                if self.state.is_selected() {
                    self.set_state(ConnectionState::Authenticated);
                }
            }
            (CommandKind::Close | CommandKind::Unselect, true, _) => {
                self.mailbox.close();
                self.set_state(ConnectionState::Authenticated);
            }
            (CommandKind::Logout, true, _) => {
                self.mailbox.close();
                self.set_state(ConnectionState::Logout);
            }
            _ => {}
        }
    }

    /// Fails the active command, the queue and anything still in the channel.
    fn fail_all(&mut self, cause: &Error) {
        if let Some(active) = self.active.take() {
            active.pending.reject(cause.clone());
        }
        for pending in self.queue.drain(..) {
            pending.reject(cause.clone());
        }
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            let _ = request.reply.send(Err(cause.clone()));
        }
    }
}
