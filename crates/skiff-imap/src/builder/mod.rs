//! Response builders.
//!
//! A builder is chosen for the active command and folds the untagged
//! responses that arrive before its tagged completion into one typed
//! [`CommandResponse`]. Builders only fold what they recognize: an
//! `EXISTS` arriving in the middle of a FETCH is left to the mailbox state.

mod responses;

use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::command::Command;
use crate::message::ImapMessage;
use crate::parser::{TaggedResponse, UntaggedResponse};
use crate::types::{Capability, Flag, Flags, FolderMetadata, Mailbox, MailboxStatus, ResponseCode};

pub use responses::{
    CapabilityResponse, CommandResponse, FetchResponse, ListResponse, NoopResponse, OpenMode,
    OpenResponse, SearchResponse, StatusResponse, StreamingFetchResponse,
};

/// Callback invoked once per streamed FETCH response.
pub type FetchCallback = Box<dyn FnMut(ImapMessage) + Send>;

/// Folds untagged LIST or LSUB lines.
#[derive(Debug, Default)]
pub struct ListBuilder {
    lsub: bool,
    folders: Vec<FolderMetadata>,
}

impl ListBuilder {
    fn on_untagged(&mut self, response: UntaggedResponse) {
        match response {
            UntaggedResponse::List(folder) if !self.lsub => self.folders.push(folder),
            UntaggedResponse::Lsub(folder) if self.lsub => self.folders.push(folder),
            _ => {}
        }
    }

    fn finish(self, tagged: TaggedResponse) -> ListResponse {
        ListResponse {
            code: tagged.code,
            text: tagged.text,
            folders: self.folders,
        }
    }
}

/// Folds the data a server sends while opening a mailbox.
#[derive(Debug)]
pub struct OpenBuilder {
    mailbox: Mailbox,
    examine: bool,
    exists: u32,
    recent: u32,
    flags: Flags,
    permanent_flags: Vec<Flag>,
    status: MailboxStatus,
    mode: Option<OpenMode>,
}

impl OpenBuilder {
    fn new(mailbox: Mailbox, examine: bool) -> Self {
        Self {
            mailbox,
            examine,
            exists: 0,
            recent: 0,
            flags: Flags::new(),
            permanent_flags: Vec::new(),
            status: MailboxStatus::default(),
            mode: None,
        }
    }

    fn on_code(&mut self, code: ResponseCode) {
        match code {
            ResponseCode::UidValidity(v) => self.status.uid_validity = Some(v),
            ResponseCode::UidNext(v) => self.status.uid_next = Some(v),
            ResponseCode::Unseen(v) => self.status.unseen = Some(v),
            ResponseCode::PermanentFlags(flags) => self.permanent_flags = flags,
            ResponseCode::ReadOnly => self.mode = Some(OpenMode::Read),
            ResponseCode::ReadWrite => self.mode = Some(OpenMode::Write),
            _ => {}
        }
    }

    fn on_untagged(&mut self, response: UntaggedResponse) {
        match response {
            UntaggedResponse::Exists(n) => self.exists = n,
            UntaggedResponse::Recent(n) => self.recent = n,
            UntaggedResponse::Flags(flags) => self.flags = flags,
            UntaggedResponse::Ok {
                code: Some(code), ..
            } => self.on_code(code),
            _ => {}
        }
    }

    fn finish(mut self, tagged: TaggedResponse) -> OpenResponse {
        if let Some(code) = tagged.code.clone() {
            self.on_code(code);
        }
        let mode = self.mode.unwrap_or(if self.examine {
            OpenMode::Read
        } else {
            OpenMode::Write
        });
        OpenResponse {
            mailbox: self.mailbox,
            code: tagged.code,
            text: tagged.text,
            exists: self.exists,
            recent: self.recent,
            flags: self.flags,
            permanent_flags: self.permanent_flags,
            uid_validity: self.status.uid_validity,
            uid_next: self.status.uid_next,
            unseen: self.status.unseen,
            mode,
        }
    }
}

/// Folds FETCH lines into messages keyed by sequence number.
#[derive(Debug, Default)]
pub struct FetchBuilder {
    messages: BTreeMap<crate::types::SeqNum, ImapMessage>,
}

impl FetchBuilder {
    fn on_untagged(&mut self, response: UntaggedResponse) {
        if let UntaggedResponse::Fetch { seq, items } = response {
            self.messages
                .entry(seq)
                .or_insert_with(|| ImapMessage::new(seq))
                .apply(items);
        }
    }

    fn finish(self, tagged: TaggedResponse) -> FetchResponse {
        FetchResponse {
            code: tagged.code,
            text: tagged.text,
            messages: self.messages,
        }
    }
}

/// Hands each FETCH line to a callback as it arrives.
pub struct StreamingFetchBuilder {
    callback: FetchCallback,
    delivered: usize,
}

impl fmt::Debug for StreamingFetchBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingFetchBuilder")
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}

impl StreamingFetchBuilder {
    fn on_untagged(&mut self, response: UntaggedResponse) {
        if let UntaggedResponse::Fetch { seq, items } = response {
            self.delivered += 1;
            trace!(seq = seq.get(), delivered = self.delivered, "streaming fetch item");
            (self.callback)(ImapMessage::from_items(seq, items));
        }
    }

    fn finish(self, tagged: TaggedResponse) -> StreamingFetchResponse<()> {
        StreamingFetchResponse {
            code: tagged.code,
            text: tagged.text,
            delivered: self.delivered,
            results: Vec::new(),
        }
    }
}

/// Concatenates SEARCH results.
#[derive(Debug, Default)]
pub struct SearchBuilder {
    ids: Vec<u32>,
}

impl SearchBuilder {
    fn on_untagged(&mut self, response: UntaggedResponse) {
        if let UntaggedResponse::Search(ids) = response {
            self.ids.extend(ids);
        }
    }

    fn finish(self, tagged: TaggedResponse) -> SearchResponse {
        SearchResponse {
            code: tagged.code,
            text: tagged.text,
            ids: self.ids,
        }
    }
}

/// Picks up the STATUS line.
#[derive(Debug)]
pub struct StatusBuilder {
    status: MailboxStatus,
}

impl StatusBuilder {
    fn on_untagged(&mut self, response: UntaggedResponse) {
        if let UntaggedResponse::Status(status) = response
            && status.mailbox == self.status.mailbox
        {
            self.status = status;
        }
    }

    fn finish(self, tagged: TaggedResponse) -> StatusResponse {
        StatusResponse {
            code: tagged.code,
            text: tagged.text,
            status: self.status,
        }
    }
}

/// Picks up the CAPABILITY line, or the code on the completion.
#[derive(Debug, Default)]
pub struct CapabilityBuilder {
    capabilities: Option<Vec<Capability>>,
}

impl CapabilityBuilder {
    fn on_untagged(&mut self, response: UntaggedResponse) {
        if let UntaggedResponse::Capability(caps) = response {
            self.capabilities = Some(caps);
        }
    }

    fn finish(self, tagged: TaggedResponse) -> CapabilityResponse {
        let capabilities = match (self.capabilities, &tagged.code) {
            (Some(caps), _) => caps,
            (None, Some(ResponseCode::Capability(caps))) => caps.clone(),
            (None, _) => Vec::new(),
        };
        CapabilityResponse {
            code: tagged.code,
            text: tagged.text,
            capabilities,
        }
    }
}

/// The builder attached to the active command.
#[derive(Debug)]
pub enum ResponseBuilder {
    /// LIST or LSUB.
    List(ListBuilder),
    /// SELECT or EXAMINE.
    Open(OpenBuilder),
    /// FETCH collected in memory.
    Fetch(FetchBuilder),
    /// FETCH handed to a callback.
    StreamingFetch(StreamingFetchBuilder),
    /// SEARCH.
    Search(SearchBuilder),
    /// NOOP.
    Noop,
    /// STATUS.
    Status(StatusBuilder),
    /// CAPABILITY.
    Capability(CapabilityBuilder),
    /// Anything else: the tagged completion is passed through.
    Default,
}

impl ResponseBuilder {
    /// Selects the builder for a command.
    #[must_use]
    pub fn for_command(command: &Command) -> Self {
        match command {
            Command::List { .. } => Self::List(ListBuilder::default()),
            Command::Lsub { .. } => Self::List(ListBuilder {
                lsub: true,
                folders: Vec::new(),
            }),
            Command::Select { mailbox } => Self::Open(OpenBuilder::new(mailbox.clone(), false)),
            Command::Examine { mailbox } => Self::Open(OpenBuilder::new(mailbox.clone(), true)),
            Command::Fetch { .. } => Self::Fetch(FetchBuilder::default()),
            Command::Search { .. } => Self::Search(SearchBuilder::default()),
            Command::Noop => Self::Noop,
            Command::Status { mailbox, .. } => Self::Status(StatusBuilder {
                status: MailboxStatus {
                    mailbox: mailbox.clone(),
                    ..MailboxStatus::default()
                },
            }),
            Command::Capability => Self::Capability(CapabilityBuilder::default()),
            _ => Self::Default,
        }
    }

    /// Creates a streaming FETCH builder around a callback.
    #[must_use]
    pub fn streaming(callback: FetchCallback) -> Self {
        Self::StreamingFetch(StreamingFetchBuilder {
            callback,
            delivered: 0,
        })
    }

    /// Folds one untagged response. Unrecognized responses are ignored.
    pub fn on_untagged(&mut self, response: UntaggedResponse) {
        match self {
            Self::List(b) => b.on_untagged(response),
            Self::Open(b) => b.on_untagged(response),
            Self::Fetch(b) => b.on_untagged(response),
            Self::StreamingFetch(b) => b.on_untagged(response),
            Self::Search(b) => b.on_untagged(response),
            Self::Status(b) => b.on_untagged(response),
            Self::Capability(b) => b.on_untagged(response),
            Self::Noop | Self::Default => {}
        }
    }

    /// Finishes the builder with the tagged completion.
    #[must_use]
    pub fn finish(self, tagged: TaggedResponse) -> CommandResponse {
        match self {
            Self::List(b) => CommandResponse::List(b.finish(tagged)),
            Self::Open(b) => CommandResponse::Open(b.finish(tagged)),
            Self::Fetch(b) => CommandResponse::Fetch(b.finish(tagged)),
            Self::StreamingFetch(b) => CommandResponse::StreamingFetch(b.finish(tagged)),
            Self::Search(b) => CommandResponse::Search(b.finish(tagged)),
            Self::Noop => CommandResponse::Noop(NoopResponse {
                code: tagged.code,
                text: tagged.text,
            }),
            Self::Status(b) => CommandResponse::Status(b.finish(tagged)),
            Self::Capability(b) => CommandResponse::Capability(b.finish(tagged)),
            Self::Default => CommandResponse::Tagged(tagged),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::command::{FetchAttribute, FetchItems, SearchKey};
    use crate::parser::{FetchItem, Response, ResponseParser};
    use crate::types::{SeqNum, SequenceSet, Status, Tag, Uid};

    fn feed(builder: &mut ResponseBuilder, lines: &[&str]) {
        for line in lines {
            match ResponseParser::parse(line.as_bytes()).unwrap() {
                Response::Untagged(untagged) => builder.on_untagged(untagged),
                other => panic!("not untagged: {other:?}"),
            }
        }
    }

    fn tagged(line: &str) -> TaggedResponse {
        match ResponseParser::parse(line.as_bytes()).unwrap() {
            Response::Tagged(tagged) => tagged,
            other => panic!("not tagged: {other:?}"),
        }
    }

    fn fetch_command() -> Command {
        Command::Fetch {
            sequence: SequenceSet::range(1, 2),
            items: FetchItems::Fast,
            uid: false,
        }
    }

    mod open_tests {
        use super::*;

        #[test]
        fn select_folds_codes_and_counts() {
            let mut builder = ResponseBuilder::for_command(&Command::Select {
                mailbox: Mailbox::inbox(),
            });
            feed(
                &mut builder,
                &[
                    "* 172 EXISTS\r\n",
                    "* 1 RECENT\r\n",
                    "* OK [UIDVALIDITY 3857529045] UIDs valid\r\n",
                    "* OK [UIDNEXT 4392] Predicted next UID\r\n",
                    "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n",
                    "* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n",
                ],
            );
            let CommandResponse::Open(open) =
                builder.finish(tagged("A0001 OK [READ-WRITE] SELECT completed\r\n"))
            else {
                panic!("expected open response");
            };
            assert_eq!(open.exists, 172);
            assert_eq!(open.recent, 1);
            assert_eq!(open.uid_validity.unwrap().get(), 3_857_529_045);
            assert_eq!(open.uid_next.unwrap().get(), 4392);
            assert_eq!(open.mode, OpenMode::Write);
            assert!(open.allows_new_keywords());
            assert_eq!(open.flags.len(), 5);
            assert_eq!(open.code, Some(ResponseCode::ReadWrite));
            assert_eq!(open.mailbox, Mailbox::inbox());
        }

        #[test]
        fn examine_defaults_to_read() {
            let builder = ResponseBuilder::for_command(&Command::Examine {
                mailbox: Mailbox::new("Archive"),
            });
            let CommandResponse::Open(open) = builder.finish(tagged("A1 OK done\r\n")) else {
                panic!("expected open response");
            };
            assert_eq!(open.mode, OpenMode::Read);
        }

        #[test]
        fn read_only_code_wins() {
            let builder = ResponseBuilder::for_command(&Command::Select {
                mailbox: Mailbox::inbox(),
            });
            let CommandResponse::Open(open) =
                builder.finish(tagged("A1 OK [READ-ONLY] done\r\n"))
            else {
                panic!("expected open response");
            };
            assert_eq!(open.mode, OpenMode::Read);
        }
    }

    mod fetch_tests {
        use super::*;

        #[test]
        fn fetch_collects_by_sequence() {
            let mut builder = ResponseBuilder::for_command(&fetch_command());
            feed(
                &mut builder,
                &[
                    "* 1 FETCH (FLAGS (\\Seen) RFC822.SIZE 100)\r\n",
                    "* 2 FETCH (FLAGS () RFC822.SIZE 200)\r\n",
                ],
            );
            let CommandResponse::Fetch(fetch) = builder.finish(tagged("A2 OK done\r\n")) else {
                panic!("expected fetch response");
            };
            assert_eq!(fetch.len(), 2);
            let first = fetch.get(SeqNum::new(1).unwrap()).unwrap();
            assert_eq!(first.size().unwrap(), 100);
            assert!(first.envelope().is_err());
        }

        #[test]
        fn later_fetch_overrides_fields() {
            let mut builder = ResponseBuilder::for_command(&fetch_command());
            feed(
                &mut builder,
                &[
                    "* 1 FETCH (UID 7 FLAGS ())\r\n",
                    "* 1 FETCH (FLAGS (\\Flagged))\r\n",
                ],
            );
            let CommandResponse::Fetch(fetch) = builder.finish(tagged("A2 OK done\r\n")) else {
                panic!("expected fetch response");
            };
            let message = fetch.get(SeqNum::new(1).unwrap()).unwrap();
            assert_eq!(message.uid().unwrap(), Uid::new(7).unwrap());
            assert!(message.flags().unwrap().is_flagged());
        }

        #[test]
        fn unrelated_untagged_are_ignored() {
            let mut builder = ResponseBuilder::for_command(&fetch_command());
            feed(
                &mut builder,
                &[
                    "* 1 FETCH (RFC822.SIZE 10)\r\n",
                    "* 5 EXISTS\r\n",
                    "* 3 EXPUNGE\r\n",
                    "* OK [ALERT] hello\r\n",
                ],
            );
            let CommandResponse::Fetch(fetch) = builder.finish(tagged("A2 OK done\r\n")) else {
                panic!("expected fetch response");
            };
            assert_eq!(fetch.len(), 1);
        }

        #[test]
        fn streaming_invokes_callback_per_line() {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let mut builder = ResponseBuilder::streaming(Box::new(move |message| {
                sink.lock().unwrap().push(message.uid().unwrap().get());
            }));
            feed(
                &mut builder,
                &[
                    "* 1 FETCH (UID 10)\r\n",
                    "* 4 EXISTS\r\n",
                    "* 2 FETCH (UID 11)\r\n",
                    "* 3 FETCH (UID 12)\r\n",
                ],
            );
            let CommandResponse::StreamingFetch(done) = builder.finish(tagged("A3 OK done\r\n"))
            else {
                panic!("expected streaming response");
            };
            assert_eq!(done.delivered, 3);
            assert_eq!(*seen.lock().unwrap(), vec![10, 11, 12]);
        }

        #[test]
        fn fetch_response_extend_merges() {
            let seq = SeqNum::new(1).unwrap();
            let mut first = FetchResponse {
                code: None,
                text: "one".into(),
                messages: BTreeMap::from([(
                    seq,
                    ImapMessage::from_items(seq, vec![FetchItem::Uid(Uid::new(3).unwrap())]),
                )]),
            };
            let second = FetchResponse {
                code: None,
                text: "two".into(),
                messages: BTreeMap::from([(
                    seq,
                    ImapMessage::from_items(seq, vec![FetchItem::Rfc822Size(9)]),
                )]),
            };
            first.extend(second);
            let message = first.get(seq).unwrap();
            assert_eq!(message.uid().unwrap().get(), 3);
            assert_eq!(message.size().unwrap(), 9);
            assert_eq!(first.text, "two");
        }
    }

    mod other_builder_tests {
        use super::*;

        #[test]
        fn list_collects_folders() {
            let mut builder = ResponseBuilder::for_command(&Command::List {
                reference: String::new(),
                pattern: "*".into(),
            });
            feed(
                &mut builder,
                &[
                    "* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n",
                    "* LIST (\\HasChildren \\Noselect) \"/\" \"Work\"\r\n",
                    "* LSUB () \"/\" \"Ignored\"\r\n",
                ],
            );
            let CommandResponse::List(list) = builder.finish(tagged("A3 OK LIST done\r\n")) else {
                panic!("expected list response");
            };
            assert_eq!(list.folders.len(), 2);
            assert!(list.folder("INBOX").is_some());
            assert!(!list.folder("Work").unwrap().is_selectable());
        }

        #[test]
        fn lsub_only_takes_lsub_lines() {
            let mut builder = ResponseBuilder::for_command(&Command::Lsub {
                reference: String::new(),
                pattern: "*".into(),
            });
            feed(
                &mut builder,
                &[
                    "* LIST () \"/\" \"Skipped\"\r\n",
                    "* LSUB () \"/\" \"Subscribed\"\r\n",
                ],
            );
            let CommandResponse::List(list) = builder.finish(tagged("A3 OK done\r\n")) else {
                panic!("expected list response");
            };
            assert_eq!(list.folders.len(), 1);
            assert_eq!(list.folders[0].name.as_str(), "Subscribed");
        }

        #[test]
        fn search_concatenates_in_order() {
            let mut builder = ResponseBuilder::for_command(&Command::Search {
                criteria: SearchKey::All,
                uid: false,
            });
            feed(&mut builder, &["* SEARCH 4 2\r\n", "* SEARCH 2 9\r\n"]);
            let CommandResponse::Search(search) = builder.finish(tagged("A4 OK done\r\n")) else {
                panic!("expected search response");
            };
            assert_eq!(search.ids, vec![4, 2, 2, 9]);
        }

        #[test]
        fn noop_keeps_completion() {
            let mut builder = ResponseBuilder::for_command(&Command::Noop);
            feed(&mut builder, &["* 3 EXISTS\r\n"]);
            let CommandResponse::Noop(noop) = builder.finish(tagged("A5 OK NOOP done\r\n")) else {
                panic!("expected noop response");
            };
            assert_eq!(noop.text, "NOOP done");
        }

        #[test]
        fn capability_from_untagged_or_code() {
            let mut builder = ResponseBuilder::for_command(&Command::Capability);
            feed(&mut builder, &["* CAPABILITY IMAP4rev1 IDLE\r\n"]);
            let CommandResponse::Capability(caps) = builder.finish(tagged("A6 OK done\r\n"))
            else {
                panic!("expected capability response");
            };
            assert!(caps.has(&Capability::Idle));

            let builder = ResponseBuilder::for_command(&Command::Capability);
            let CommandResponse::Capability(caps) =
                builder.finish(tagged("A7 OK [CAPABILITY IMAP4rev1 UIDPLUS] done\r\n"))
            else {
                panic!("expected capability response");
            };
            assert!(caps.has(&Capability::UidPlus));
        }

        #[test]
        fn status_matches_mailbox() {
            let mut builder = ResponseBuilder::for_command(&Command::Status {
                mailbox: Mailbox::new("Sent"),
                items: vec![],
            });
            feed(
                &mut builder,
                &[
                    "* STATUS \"Other\" (MESSAGES 1)\r\n",
                    "* STATUS \"Sent\" (MESSAGES 12 UNSEEN 2)\r\n",
                ],
            );
            let CommandResponse::Status(status) = builder.finish(tagged("A8 OK done\r\n")) else {
                panic!("expected status response");
            };
            assert_eq!(status.status.messages, Some(12));
            assert_eq!(status.status.unseen, Some(2));
        }

        #[test]
        fn default_passes_tagged_through() {
            let builder = ResponseBuilder::for_command(&Command::Fetch {
                sequence: SequenceSet::single(1),
                items: vec![FetchAttribute::Uid].into(),
                uid: false,
            });
            assert!(matches!(builder, ResponseBuilder::Fetch(_)));

            let builder = ResponseBuilder::for_command(&Command::Expunge);
            let response = builder.finish(tagged("A9 NO [TRYCREATE] nope\r\n"));
            let CommandResponse::Tagged(tagged) = response else {
                panic!("expected passthrough");
            };
            assert_eq!(tagged.tag, Tag::new("A9"));
            assert_eq!(tagged.status, Status::No);
            assert_eq!(tagged.code, Some(ResponseCode::TryCreate));
        }
    }
}
