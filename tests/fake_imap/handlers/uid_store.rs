//! UID STORE: `\Seen` and `\Deleted` are tracked, other flags ignored.

use super::{expand_uids, no_folder};
use crate::fake_imap::io::respond;
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::flag::{Flag, StoreResponse, StoreType};
use imap_codec::imap_types::sequence::SequenceSet;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub struct StoreArgs<'a> {
    pub sequence_set: &'a SequenceSet,
    pub kind: &'a StoreType,
    pub response: &'a StoreResponse,
    pub flags: &'a [Flag<'a>],
}

pub async fn handle_uid_store<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    args: &StoreArgs<'_>,
    mailbox: &Mutex<Mailbox>,
    selected: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = selected else {
        respond(stream, &[], &no_folder(tag)).await;
        return;
    };

    let seen = args.flags.iter().any(|f| matches!(f, Flag::Seen));
    let deleted = args.flags.iter().any(|f| matches!(f, Flag::Deleted));

    let mut lines = Vec::new();
    if let Some(folder) = mailbox.lock().unwrap().get_folder_mut(folder) {
        let max_uid = folder.emails.iter().map(|e| e.uid).max().unwrap_or(0);
        for uid in expand_uids(args.sequence_set, max_uid) {
            let Some(idx) = folder.emails.iter().position(|e| e.uid == uid) else {
                continue;
            };
            let email = &mut folder.emails[idx];
            match args.kind {
                StoreType::Add => {
                    email.seen |= seen;
                    email.deleted |= deleted;
                }
                StoreType::Remove => {
                    email.seen &= !seen;
                    email.deleted &= !deleted;
                }
                StoreType::Replace => {
                    email.seen = seen;
                    email.deleted = deleted;
                }
            }
            lines.push(format!(
                "* {} FETCH (UID {uid} FLAGS ({}))\r\n",
                idx + 1,
                email.flags()
            ));
        }
    }

    if matches!(args.response, StoreResponse::Silent) {
        lines.clear();
    }
    respond(stream, &lines, &format!("{tag} OK STORE completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{raw, uid_set};
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    fn inbox() -> Mutex<Mailbox> {
        Mutex::new(
            MailboxBuilder::new()
                .folder("INBOX")
                .email(1, &raw("a"))
                .email(2, &raw("b"))
                .build(),
        )
    }

    async fn store(mb: &Mutex<Mailbox>, uid: u32, kind: StoreType, flags: &[Flag<'_>]) -> String {
        let set = uid_set(uid);
        let args = StoreArgs {
            sequence_set: &set,
            kind: &kind,
            response: &StoreResponse::Answer,
            flags,
        };
        capture(async |s| handle_uid_store("A7", &args, mb, Some("INBOX"), s).await).await
    }

    #[tokio::test]
    async fn add_seen() {
        let mb = inbox();

        let output = store(&mb, 2, StoreType::Add, &[Flag::Seen]).await;

        assert_eq!(
            output,
            "* 2 FETCH (UID 2 FLAGS (\\Seen))\r\nA7 OK STORE completed\r\n"
        );
        let locked = mb.lock().unwrap();
        assert!(locked.email("INBOX", 2).unwrap().seen);
        assert!(!locked.email("INBOX", 1).unwrap().seen);
    }

    #[tokio::test]
    async fn add_deleted_keeps_seen() {
        let mb = inbox();
        store(&mb, 1, StoreType::Add, &[Flag::Seen]).await;

        let output = store(&mb, 1, StoreType::Add, &[Flag::Deleted]).await;

        assert!(output.contains("FLAGS (\\Seen \\Deleted)"));
    }

    #[tokio::test]
    async fn remove_seen() {
        let mb = inbox();
        store(&mb, 1, StoreType::Add, &[Flag::Seen]).await;

        store(&mb, 1, StoreType::Remove, &[Flag::Seen]).await;

        assert!(!mb.lock().unwrap().email("INBOX", 1).unwrap().seen);
    }
}
