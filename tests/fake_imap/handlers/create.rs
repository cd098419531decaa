//! CREATE: add an empty folder; `NO` if it exists.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_create<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    name: &str,
    mailbox: &Mutex<Mailbox>,
    stream: &mut BufReader<S>,
) {
    let created = mailbox.lock().unwrap().create_folder(name);
    let resp = if created {
        format!("{tag} OK CREATE completed\r\n")
    } else {
        format!("{tag} NO [ALREADYEXISTS] Mailbox exists\r\n")
    };
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[tokio::test]
    async fn creates_missing_folder() {
        let mb = Mutex::new(MailboxBuilder::new().folder("INBOX").build());

        let output =
            capture(async |s| handle_create("A3", "checked", &mb, s).await).await;

        assert_eq!(output, "A3 OK CREATE completed\r\n");
        assert!(mb.lock().unwrap().get_folder("checked").is_some());
    }

    #[tokio::test]
    async fn existing_folder_is_no() {
        let mb = Mutex::new(MailboxBuilder::new().folder("checked").build());

        let output =
            capture(async |s| handle_create("A3", "checked", &mb, s).await).await;

        assert!(output.starts_with("A3 NO"));
        assert_eq!(mb.lock().unwrap().folders.len(), 1);
    }
}
