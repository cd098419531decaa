//! EXPUNGE and UID EXPUNGE: drop `\Deleted` messages, reporting each
//! removal by its sequence number at the time it is removed.

use super::{expand_uids, no_folder};
use crate::fake_imap::io::respond;
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::SequenceSet;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_expunge<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mutex<Mailbox>,
    selected: Option<&str>,
    stream: &mut BufReader<S>,
) {
    expunge_matching(tag, mailbox, selected, stream, |_| true).await;
}

/// UID EXPUNGE (UIDPLUS): only `\Deleted` messages inside `set`.
pub async fn handle_uid_expunge<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    set: &SequenceSet,
    mailbox: &Mutex<Mailbox>,
    selected: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let max_uid = selected
        .and_then(|f| mailbox.lock().unwrap().uids(f).into_iter().max())
        .unwrap_or(0);
    let uids = expand_uids(set, max_uid);
    expunge_matching(tag, mailbox, selected, stream, |uid| uids.contains(&uid)).await;
}

async fn expunge_matching<S, F>(
    tag: &str,
    mailbox: &Mutex<Mailbox>,
    selected: Option<&str>,
    stream: &mut BufReader<S>,
    in_scope: F,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(u32) -> bool,
{
    let Some(folder) = selected else {
        respond(stream, &[], &no_folder(tag)).await;
        return;
    };

    let mut lines = Vec::new();
    if let Some(folder) = mailbox.lock().unwrap().get_folder_mut(folder) {
        let mut seq = 1;
        folder.emails.retain(|email| {
            if email.deleted && in_scope(email.uid) {
                lines.push(format!("* {seq} EXPUNGE\r\n"));
                false
            } else {
                seq += 1;
                true
            }
        });
    }

    respond(stream, &lines, &format!("{tag} OK EXPUNGE completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{raw, uid_set};
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[tokio::test]
    async fn sequence_numbers_shift_after_each_removal() {
        let mut mb = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, &raw("a"))
            .email(2, &raw("b"))
            .email(3, &raw("c"))
            .build();
        let inbox = mb.get_folder_mut("INBOX").unwrap();
        inbox.emails[0].deleted = true;
        inbox.emails[2].deleted = true;
        let mb = Mutex::new(mb);

        let output = capture(async |s| handle_expunge("A9", &mb, Some("INBOX"), s).await).await;

        assert_eq!(
            output,
            "* 1 EXPUNGE\r\n* 2 EXPUNGE\r\nA9 OK EXPUNGE completed\r\n"
        );
        assert_eq!(mb.lock().unwrap().uids("INBOX"), vec![2]);
    }

    #[tokio::test]
    async fn nothing_deleted() {
        let mb = Mutex::new(MailboxBuilder::new().folder("INBOX").email(1, &raw("a")).build());

        let output = capture(async |s| handle_expunge("A9", &mb, Some("INBOX"), s).await).await;

        assert_eq!(output, "A9 OK EXPUNGE completed\r\n");
    }

    #[tokio::test]
    async fn uid_expunge_leaves_other_deleted_messages() {
        let mut mb = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, &raw("a"))
            .email(2, &raw("b"))
            .build();
        for email in &mut mb.get_folder_mut("INBOX").unwrap().emails {
            email.deleted = true;
        }
        let mb = Mutex::new(mb);

        let output = capture(async |s| {
            handle_uid_expunge("A9", &uid_set(2), &mb, Some("INBOX"), s).await;
        })
        .await;

        assert_eq!(output, "* 2 EXPUNGE\r\nA9 OK EXPUNGE completed\r\n");
        assert_eq!(mb.lock().unwrap().uids("INBOX"), vec![1]);
    }
}
