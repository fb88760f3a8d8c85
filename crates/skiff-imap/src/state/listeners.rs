//! Mailbox listeners.
//!
//! Listeners are plain callbacks held in a registry shared between the
//! connection task, which fires them, and [`MailboxHandle`], which adds and
//! removes them. They run on the connection task, so they must not wait on
//! a command of the same connection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::builder::OpenResponse;
use crate::types::{Flags, SeqNum, UidValidity};

use super::SelectedMailboxState;

/// Token returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type MessageAddFn = dyn Fn(u32, u32) + Send + Sync;
type OpenFn = dyn Fn(&OpenResponse) + Send + Sync;
type ExpungeFn = dyn Fn(SeqNum) + Send + Sync;
type FlagsChangeFn = dyn Fn(SeqNum, &Flags) + Send + Sync;
type UidValidityFn = dyn Fn(UidValidity, UidValidity) + Send + Sync;

#[derive(Clone)]
enum Listener {
    MessageAdd(Arc<MessageAddFn>),
    Open(Arc<OpenFn>),
    Expunge(Arc<ExpungeFn>),
    FlagsChange(Arc<FlagsChangeFn>),
    UidValidityChange(Arc<UidValidityFn>),
}

/// A change in the selected mailbox.
#[derive(Debug, Clone, Copy)]
pub(crate) enum MailboxEvent<'a> {
    MessageAdd { old: u32, new: u32 },
    Open(&'a OpenResponse),
    Expunge(SeqNum),
    FlagsChange(SeqNum, &'a Flags),
    UidValidityChange { old: UidValidity, new: UidValidity },
}

#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl Registry {
    fn add(&mut self, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Calls every listener interested in `event`.
///
/// The listeners are cloned out first so a callback may register or remove
/// listeners without deadlocking.
pub(crate) fn emit(registry: &Mutex<Registry>, event: MailboxEvent<'_>) {
    let listeners: Vec<Listener> = lock(registry)
        .listeners
        .iter()
        .map(|(_, l)| l.clone())
        .collect();

    for listener in listeners {
        match (listener, event) {
            (Listener::MessageAdd(f), MailboxEvent::MessageAdd { old, new }) => f(old, new),
            (Listener::Open(f), MailboxEvent::Open(response)) => f(response),
            (Listener::Expunge(f), MailboxEvent::Expunge(seq)) => f(seq),
            (Listener::FlagsChange(f), MailboxEvent::FlagsChange(seq, flags)) => f(seq, flags),
            (Listener::UidValidityChange(f), MailboxEvent::UidValidityChange { old, new }) => {
                f(old, new);
            }
            _ => {}
        }
    }
}

/// Application view of the selected mailbox.
///
/// Cloning is cheap; every clone observes the same connection.
#[derive(Clone)]
pub struct MailboxHandle {
    registry: SharedRegistry,
    snapshots: watch::Receiver<Option<SelectedMailboxState>>,
}

impl std::fmt::Debug for MailboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxHandle")
            .field("listeners", &lock(&self.registry).len())
            .field("selected", &*self.snapshots.borrow())
            .finish()
    }
}

impl MailboxHandle {
    pub(crate) const fn new(
        registry: SharedRegistry,
        snapshots: watch::Receiver<Option<SelectedMailboxState>>,
    ) -> Self {
        Self {
            registry,
            snapshots,
        }
    }

    /// Returns a copy of the selected mailbox state, if a mailbox is open.
    #[must_use]
    pub fn snapshot(&self) -> Option<SelectedMailboxState> {
        self.snapshots.borrow().clone()
    }

    /// Returns the message count of the open mailbox.
    #[must_use]
    pub fn message_count(&self) -> Option<u32> {
        self.snapshots.borrow().as_ref().map(|s| s.message_count)
    }

    /// Waits until the mailbox state changes.
    ///
    /// # Errors
    ///
    /// Returns `Err` once the connection task has ended.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.snapshots.changed().await
    }

    /// Called with `(old, new)` when a later `EXISTS` raises the count.
    /// Never called while a mailbox is being opened.
    pub fn on_message_add(&self, f: impl Fn(u32, u32) + Send + Sync + 'static) -> ListenerId {
        lock(&self.registry).add(Listener::MessageAdd(Arc::new(f)))
    }

    /// Called when SELECT or EXAMINE completes.
    pub fn on_open(&self, f: impl Fn(&OpenResponse) + Send + Sync + 'static) -> ListenerId {
        lock(&self.registry).add(Listener::Open(Arc::new(f)))
    }

    /// Called for every untagged `EXPUNGE`.
    pub fn on_expunge(&self, f: impl Fn(SeqNum) + Send + Sync + 'static) -> ListenerId {
        lock(&self.registry).add(Listener::Expunge(Arc::new(f)))
    }

    /// Called for every untagged FETCH carrying FLAGS.
    pub fn on_flags_change(
        &self,
        f: impl Fn(SeqNum, &Flags) + Send + Sync + 'static,
    ) -> ListenerId {
        lock(&self.registry).add(Listener::FlagsChange(Arc::new(f)))
    }

    /// Called with `(old, new)` when a mailbox reports a different UIDVALIDITY.
    pub fn on_uid_validity_change(
        &self,
        f: impl Fn(UidValidity, UidValidity) + Send + Sync + 'static,
    ) -> ListenerId {
        lock(&self.registry).add(Listener::UidValidityChange(Arc::new(f)))
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        lock(&self.registry).remove(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn handle() -> (MailboxHandle, SharedRegistry) {
        let registry = SharedRegistry::default();
        let (_tx, rx) = watch::channel(None);
        (MailboxHandle::new(Arc::clone(&registry), rx), registry)
    }

    #[test]
    fn emit_reaches_matching_listeners_only() {
        let (handle, registry) = handle();
        let adds = Arc::new(AtomicU32::new(0));
        let expunges = Arc::new(AtomicU32::new(0));

        let a = Arc::clone(&adds);
        handle.on_message_add(move |old, new| {
            a.fetch_add(new - old, Ordering::SeqCst);
        });
        let e = Arc::clone(&expunges);
        handle.on_expunge(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        emit(&registry, MailboxEvent::MessageAdd { old: 3, new: 5 });
        assert_eq!(adds.load(Ordering::SeqCst), 2);
        assert_eq!(expunges.load(Ordering::SeqCst), 0);

        emit(&registry, MailboxEvent::Expunge(SeqNum::new(1).unwrap()));
        assert_eq!(expunges.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let (handle, registry) = handle();
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let id = handle.on_message_add(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.remove_listener(id));
        assert!(!handle.remove_listener(id));
        assert!(!handle.remove_listener(id));

        emit(&registry, MailboxEvent::MessageAdd { old: 1, new: 2 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removing_one_keeps_others() {
        let (handle, registry) = handle();
        let calls = Arc::new(AtomicU32::new(0));
        let first = handle.on_expunge(|_| {});
        let c = Arc::clone(&calls);
        handle.on_expunge(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(handle.remove_listener(first));
        emit(&registry, MailboxEvent::Expunge(SeqNum::new(4).unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_register_during_emit() {
        let (handle, registry) = handle();
        let inner = handle.clone();
        handle.on_expunge(move |_| {
            inner.on_expunge(|_| {});
        });
        emit(&registry, MailboxEvent::Expunge(SeqNum::new(1).unwrap()));
        assert_eq!(lock(&registry).len(), 2);
    }

    #[test]
    fn no_snapshot_before_open() {
        let (handle, _) = handle();
        assert!(handle.snapshot().is_none());
        assert_eq!(handle.message_count(), None);
    }
}
