//! Connection phase and selected-mailbox state.
//!
//! [`ConnectionState`] follows the four IMAP phases and decides which
//! commands may run. The selected-mailbox tracker and its listeners live in
//! [`mailbox`] and [`listeners`].

pub(crate) mod listeners;
pub(crate) mod mailbox;

use std::fmt;

use crate::command::CommandKind;
use crate::types::Mailbox;

pub use listeners::{ListenerId, MailboxHandle};
pub use mailbox::SelectedMailboxState;

/// Connection phase, per RFC 3501 section 3.
///
/// - `NotAuthenticated`: only CAPABILITY, NOOP, LOGOUT, LOGIN and AUTHENTICATE
/// - `Authenticated`: mailbox commands such as LIST, SELECT and APPEND
/// - `Selected`: message commands such as FETCH, SEARCH and STORE
/// - `Logout`: nothing; the connection is going away
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Waiting for credentials.
    #[default]
    NotAuthenticated,
    /// Logged in, no mailbox open.
    Authenticated,
    /// A mailbox is open.
    Selected(SelectedState),
    /// The server said BYE or LOGOUT completed.
    Logout,
}

impl ConnectionState {
    /// Returns `true` when authenticated or selected.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a mailbox is open.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns `true` once the connection is logging out.
    #[must_use]
    pub const fn is_logout(&self) -> bool {
        matches!(self, Self::Logout)
    }

    /// Returns the open mailbox, if any.
    #[must_use]
    pub const fn selected_mailbox(&self) -> Option<&Mailbox> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// Returns `true` if the open mailbox was opened with EXAMINE.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }

    /// Short name used in errors and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NotAuthenticated",
            Self::Authenticated => "Authenticated",
            Self::Selected(_) => "Selected",
            Self::Logout => "Logout",
        }
    }

    /// Returns `true` if a command of this kind may run in this state.
    #[must_use]
    pub const fn permits(&self, kind: CommandKind) -> bool {
        use CommandKind as K;
        match self {
            Self::Logout => false,
            _ if matches!(kind, K::Capability | K::Noop | K::Logout | K::Other) => true,
            Self::NotAuthenticated => matches!(kind, K::Login | K::Authenticate),
            Self::Authenticated => matches!(
                kind,
                K::List
                    | K::Lsub
                    | K::Select
                    | K::Examine
                    | K::Status
                    | K::Append
                    | K::Create
                    | K::Delete
            ),
            Self::Selected(_) => !matches!(kind, K::Login | K::Authenticate),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selected(state) => write!(f, "Selected({})", state.mailbox),
            other => f.write_str(other.name()),
        }
    }
}

/// The open mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Mailbox name.
    pub mailbox: Mailbox,
    /// Opened with EXAMINE or reported read-only.
    pub read_only: bool,
}

impl SelectedState {
    /// Creates a selected state.
    #[must_use]
    pub const fn new(mailbox: Mailbox, read_only: bool) -> Self {
        Self { mailbox, read_only }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_authenticated() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::NotAuthenticated);
        assert!(!state.is_authenticated());
        assert!(!state.is_selected());
    }

    #[test]
    fn selected_accessors() {
        let state = ConnectionState::Selected(SelectedState::new(Mailbox::new("Drafts"), true));
        assert!(state.is_authenticated());
        assert!(state.is_selected());
        assert!(state.is_read_only());
        assert_eq!(state.selected_mailbox(), Some(&Mailbox::new("Drafts")));
        assert_eq!(state.to_string(), "Selected(Drafts)");
    }

    #[test]
    fn not_authenticated_gating() {
        let state = ConnectionState::NotAuthenticated;
        assert!(state.permits(CommandKind::Login));
        assert!(state.permits(CommandKind::Authenticate));
        assert!(state.permits(CommandKind::Capability));
        assert!(state.permits(CommandKind::Logout));
        assert!(!state.permits(CommandKind::List));
        assert!(!state.permits(CommandKind::Fetch));
    }

    #[test]
    fn authenticated_gating() {
        let state = ConnectionState::Authenticated;
        assert!(state.permits(CommandKind::Select));
        assert!(state.permits(CommandKind::Append));
        assert!(!state.permits(CommandKind::Login));
        assert!(!state.permits(CommandKind::Fetch));
        assert!(!state.permits(CommandKind::UidSearch));
        assert!(!state.permits(CommandKind::Close));
    }

    #[test]
    fn selected_gating() {
        let state = ConnectionState::Selected(SelectedState::new(Mailbox::inbox(), false));
        assert!(state.permits(CommandKind::Fetch));
        assert!(state.permits(CommandKind::UidStore));
        assert!(state.permits(CommandKind::Examine));
        assert!(state.permits(CommandKind::Unselect));
        assert!(!state.permits(CommandKind::Login));
    }

    #[test]
    fn logout_permits_nothing() {
        let state = ConnectionState::Logout;
        assert!(!state.permits(CommandKind::Noop));
        assert!(!state.permits(CommandKind::Logout));
        assert!(state.is_logout());
    }
}
