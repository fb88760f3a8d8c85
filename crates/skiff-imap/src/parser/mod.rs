//! IMAP response parser.
//!
//! A sans-I/O parser for server responses. It works on one complete
//! response unit at a time, as produced by the framer, so literals never
//! have to be resumed across reads.
//!
//! - **Lexer**: tokenizes raw bytes into atoms, strings, literals and numbers
//! - **Response parser**: builds typed responses from tokens
//!
//! # Example
//!
//! ```
//! use skiff_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let input = b"* OK IMAP4rev1 server ready\r\n";
//! let response = ResponseParser::parse(input).unwrap();
//!
//! match response {
//!     Response::Untagged(UntaggedResponse::Ok { text, .. }) => {
//!         assert!(text.contains("IMAP4rev1"));
//!     }
//!     _ => panic!("expected untagged OK"),
//! }
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyFields, BodyStructure, Envelope, FetchItem, Response, ResponseParser,
    TaggedResponse, UntaggedResponse,
};
