//! Selected-mailbox tracking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::builder::{OpenMode, OpenResponse};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Flag, Flags, Mailbox, ResponseCode, Uid, UidValidity};

use super::listeners::{MailboxEvent, MailboxHandle, SharedRegistry, emit};

/// What the client knows about the open mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMailboxState {
    /// Mailbox name.
    pub name: Mailbox,
    /// Message count, from `EXISTS` and `EXPUNGE`.
    pub message_count: u32,
    /// Count from `RECENT`.
    pub recent: u32,
    /// UIDVALIDITY.
    pub uid_validity: Option<UidValidity>,
    /// Predicted next UID.
    pub uid_next: Option<Uid>,
    /// Flags defined in the mailbox.
    pub flags: Flags,
    /// Flags that can be stored permanently.
    pub permanent_flags: Vec<Flag>,
    /// Access mode.
    pub mode: OpenMode,
}

impl SelectedMailboxState {
    fn from_open(response: &OpenResponse) -> Self {
        Self {
            name: response.mailbox.clone(),
            message_count: response.exists,
            recent: response.recent,
            uid_validity: response.uid_validity,
            uid_next: response.uid_next,
            flags: response.flags.clone(),
            permanent_flags: response.permanent_flags.clone(),
            mode: response.mode,
        }
    }
}

/// Absorbs untagged responses into the selected mailbox state and fires
/// listeners. Owned by the connection task.
pub(crate) struct MailboxTracker {
    current: Option<SelectedMailboxState>,
    opening: Option<Mailbox>,
    validity: HashMap<Mailbox, UidValidity>,
    registry: SharedRegistry,
    snapshots: watch::Sender<Option<SelectedMailboxState>>,
}

impl MailboxTracker {
    pub(crate) fn new() -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            current: None,
            opening: None,
            validity: HashMap::new(),
            registry: SharedRegistry::default(),
            snapshots,
        }
    }

    /// Returns a handle for the application.
    pub(crate) fn handle(&self) -> MailboxHandle {
        MailboxHandle::new(Arc::clone(&self.registry), self.snapshots.subscribe())
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Option<&SelectedMailboxState> {
        self.current.as_ref()
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.current.clone());
    }

    /// Marks the start of a SELECT or EXAMINE.
    ///
    /// Until [`finish_open`](Self::finish_open), `EXISTS` and `RECENT` belong
    /// to the open builder and no listener fires. The previous mailbox is
    /// deselected, as a server does on a new SELECT.
    pub(crate) fn begin_open(&mut self, mailbox: Mailbox) {
        self.opening = Some(mailbox);
        if self.current.take().is_some() {
            self.publish();
        }
    }

    /// Records a successful open and fires `on_open`.
    pub(crate) fn finish_open(&mut self, response: &OpenResponse) {
        self.opening = None;
        let state = SelectedMailboxState::from_open(response);
        debug!(
            mailbox = %state.name,
            exists = state.message_count,
            mode = ?state.mode,
            "mailbox opened"
        );
        if let Some(new) = state.uid_validity {
            self.check_validity(&state.name, new);
        }
        self.current = Some(state);
        self.publish();
        emit(&self.registry, MailboxEvent::Open(response));
    }

    /// Forgets a failed open.
    pub(crate) fn abort_open(&mut self) {
        self.opening = None;
    }

    /// Forgets the open mailbox after CLOSE, UNSELECT or logout.
    pub(crate) fn close(&mut self) {
        self.opening = None;
        if self.current.take().is_some() {
            debug!("mailbox closed");
            self.publish();
        }
    }

    fn check_validity(&mut self, name: &Mailbox, new: UidValidity) {
        if let Some(old) = self.validity.insert(name.clone(), new)
            && old != new
        {
            debug!(mailbox = %name, old = old.get(), new = new.get(), "UIDVALIDITY changed");
            emit(
                &self.registry,
                MailboxEvent::UidValidityChange { old, new },
            );
        }
    }

    /// Offers an untagged response to the mailbox state.
    pub(crate) fn observe(&mut self, response: &UntaggedResponse) {
        if self.opening.is_some() {
            return;
        }
        let Some(state) = self.current.as_mut() else {
            return;
        };

        match response {
            UntaggedResponse::Exists(n) => {
                let old = state.message_count;
                state.message_count = *n;
                self.publish();
                if *n > old {
                    debug!(old, new = *n, "new messages");
                    emit(&self.registry, MailboxEvent::MessageAdd { old, new: *n });
                }
            }
            UntaggedResponse::Recent(n) => {
                state.recent = *n;
                self.publish();
            }
            UntaggedResponse::Expunge(seq) => {
                state.message_count = state.message_count.saturating_sub(1);
                self.publish();
                emit(&self.registry, MailboxEvent::Expunge(*seq));
            }
            UntaggedResponse::Flags(flags) => {
                state.flags = flags.clone();
                self.publish();
            }
            UntaggedResponse::Fetch { seq, items } => {
                for item in items {
                    if let FetchItem::Flags(flags) = item {
                        emit(&self.registry, MailboxEvent::FlagsChange(*seq, flags));
                    }
                }
            }
            UntaggedResponse::Ok {
                code: Some(code), ..
            } => match code {
                ResponseCode::UidNext(uid) => {
                    state.uid_next = Some(*uid);
                    self.publish();
                }
                ResponseCode::PermanentFlags(flags) => {
                    state.permanent_flags.clone_from(flags);
                    self.publish();
                }
                ResponseCode::UidValidity(new) => {
                    state.uid_validity = Some(*new);
                    let name = state.name.clone();
                    self.publish();
                    self.check_validity(&name, *new);
                }
                _ => {}
            },
            _ => {}
        }
    }
}
