//! Server capabilities and response status.

/// Status word of a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol or syntax error).
    Bad,
    /// Greeting of an already authenticated connection.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Parses a status atom, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }

    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        })
    }
}

/// Server capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// IDLE command support (RFC 2177)
    Idle,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// UNSELECT command (RFC 3691)
    Unselect,
    /// LITERAL+ extension (RFC 7888)
    LiteralPlus,
    /// STARTTLS support
    StartTls,
    /// LOGIN disabled
    LoginDisabled,
    /// SASL mechanism, e.g. `AUTH=XOAUTH2`
    Auth(String),
    /// SASL initial response (RFC 4959)
    SaslIr,
    /// Unknown capability
    Other(String),
}

impl Capability {
    /// Parses a capability atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IDLE" => Self::Idle,
            "UIDPLUS" => Self::UidPlus,
            "UNSELECT" => Self::Unselect,
            "LITERAL+" => Self::LiteralPlus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SASL-IR" => Self::SaslIr,
            _ => match upper.strip_prefix("AUTH=") {
                Some(mech) => Self::Auth(mech.to_string()),
                None => Self::Other(s.to_string()),
            },
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => f.write_str("IMAP4rev1"),
            Self::Idle => f.write_str("IDLE"),
            Self::UidPlus => f.write_str("UIDPLUS"),
            Self::Unselect => f.write_str("UNSELECT"),
            Self::LiteralPlus => f.write_str("LITERAL+"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::LoginDisabled => f.write_str("LOGINDISABLED"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::SaslIr => f.write_str("SASL-IR"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod status_tests {
        use super::*;

        #[test]
        fn parse_ignores_case() {
            assert_eq!(Status::parse("ok"), Some(Status::Ok));
            assert_eq!(Status::parse("PREAUTH"), Some(Status::PreAuth));
            assert_eq!(Status::parse("EXISTS"), None);
        }

        #[test]
        fn is_ok() {
            assert!(Status::Ok.is_ok());
            assert!(Status::PreAuth.is_ok());
            assert!(!Status::No.is_ok());
            assert!(!Status::Bad.is_ok());
            assert!(!Status::Bye.is_ok());
        }
    }

    mod capability_parse_tests {
        use super::*;

        #[test]
        fn known_capabilities() {
            assert_eq!(Capability::parse("imap4rev1"), Capability::Imap4Rev1);
            assert_eq!(Capability::parse("IDLE"), Capability::Idle);
            assert_eq!(Capability::parse("UIDPLUS"), Capability::UidPlus);
            assert_eq!(Capability::parse("SASL-IR"), Capability::SaslIr);
        }

        #[test]
        fn auth_mechanisms() {
            assert_eq!(
                Capability::parse("AUTH=XOAUTH2"),
                Capability::Auth("XOAUTH2".to_string())
            );
            assert_eq!(
                Capability::parse("auth=plain"),
                Capability::Auth("PLAIN".to_string())
            );
        }

        #[test]
        fn unknown_is_kept() {
            assert_eq!(
                Capability::parse("X-GM-EXT-1"),
                Capability::Other("X-GM-EXT-1".to_string())
            );
        }

        #[test]
        fn display_round_trips() {
            for raw in ["IMAP4rev1", "IDLE", "AUTH=XOAUTH2", "X-GM-EXT-1"] {
                assert_eq!(Capability::parse(raw).to_string(), raw);
            }
        }
    }
}
