//! Portal provisioning and mail verification for end-to-end tests
//!
//! Two collaborators a test suite needs around a cloud document
//! portal:
//!
//! - [`MailChecker`] waits over IMAPS (implicit TLS) for a message
//!   matching a subject, sender or embedded portal link, then flags or
//!   moves it.
//! - [`PortalSetup`] registers a throwaway tenant through the REST API,
//!   authenticates, optionally activates payment with an HMAC-SHA1
//!   signed token, and deletes everything afterwards.
//!
//! Configuration comes from the environment via [`MailConfig`] and
//! [`PortalConfig`].

mod checker;
pub mod clock;
mod config;
mod connection;
mod error;
mod message;
pub mod portal;
mod search;
mod store;

pub use checker::MailChecker;
pub use clock::{Clock, TokioClock};
pub use config::{Credentials, MailConfig, PortalConfig};
pub use error::{Error, Result};
pub use message::{EmailMatch, decode_quoted_printable, find_confirmation_link};
pub use portal::{PortalRecord, PortalSetup};
pub use search::{DEFAULT_SENDER_TIMEOUT, DEFAULT_TIMEOUT, PollSettings, SearchOptions};
