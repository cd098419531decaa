//! Mailbox state shared between a test and the fake server
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!     .email(1, &message("a@example.io", "Hi", "Mon, 01 Jan 2024 10:00:00 +0000", "Body"))
//!     .folder("checked")
//!     .build();
//! ```

#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
}

impl Mailbox {
    /// Case-sensitive, except `INBOX`.
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| same_folder(&f.name, name))
    }

    pub fn get_folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| same_folder(&f.name, name))
    }

    /// Returns `false` if the folder already exists.
    pub fn create_folder(&mut self, name: &str) -> bool {
        if self.get_folder(name).is_some() {
            return false;
        }
        self.folders.push(Folder {
            name: name.to_string(),
            emails: Vec::new(),
        });
        true
    }

    /// Append an unseen message to `folder` under the next free UID.
    pub fn deliver(&mut self, folder: &str, raw: &[u8]) -> Option<u32> {
        let folder = self.get_folder_mut(folder)?;
        let uid = folder.emails.iter().map(|e| e.uid).max().unwrap_or(0) + 1;
        folder.emails.push(TestEmail::new(uid, raw));
        Some(uid)
    }

    pub fn uids(&self, folder: &str) -> Vec<u32> {
        self.get_folder(folder)
            .map(|f| f.emails.iter().map(|e| e.uid).collect())
            .unwrap_or_default()
    }

    pub fn email(&self, folder: &str, uid: u32) -> Option<&TestEmail> {
        self.get_folder(folder)?.emails.iter().find(|e| e.uid == uid)
    }
}

fn same_folder(a: &str, b: &str) -> bool {
    a == b || (a.eq_ignore_ascii_case("INBOX") && b.eq_ignore_ascii_case("INBOX"))
}

#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub emails: Vec<TestEmail>,
}

/// A stored message with the two flags the client can change.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub seen: bool,
    pub deleted: bool,
    pub raw: Vec<u8>,
}

impl TestEmail {
    pub fn new(uid: u32, raw: &[u8]) -> Self {
        Self {
            uid,
            seen: false,
            deleted: false,
            raw: raw.to_vec(),
        }
    }

    pub fn flags(&self) -> String {
        let mut flags = Vec::new();
        if self.seen {
            flags.push("\\Seen");
        }
        if self.deleted {
            flags.push("\\Deleted");
        }
        flags.join(" ")
    }
}

pub struct MailboxBuilder {
    folders: Vec<Folder>,
}

impl MailboxBuilder {
    pub const fn new() -> Self {
        Self {
            folders: Vec::new(),
        }
    }

    /// Start a folder; following `.email()` calls fill it.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            emails: Vec::new(),
        });
        self
    }

    /// # Panics
    ///
    /// Panics if no folder was started.
    pub fn email(mut self, uid: u32, raw: &[u8]) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .emails
            .push(TestEmail::new(uid, raw));
        self
    }

    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
        }
    }
}

/// A minimal RFC 2822 message with a quoted-printable body.
pub fn message(from: &str, subject: &str, date: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\n\
         To: qa@example.io\r\n\
         Subject: {subject}\r\n\
         Date: {date}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Transfer-Encoding: quoted-printable\r\n\
         \r\n\
         {body}"
    )
    .into_bytes()
}
