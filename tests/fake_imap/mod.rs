//! In-process IMAPS server for end-to-end tests
//!
//! TCP -> TLS handshake -> greeting -> LOGIN -> commands -> LOGOUT
//!
//! - `server`: listener, self-signed TLS, command dispatch, delivery
//!   of new mail while a client is polling
//! - `handlers/`: one module per IMAP command
//! - `mailbox`: folders, messages and flags shared with the server
//! - `io`: write helpers

pub mod mailbox;

pub use mailbox::{MailboxBuilder, message};
pub use server::FakeImapServer;
