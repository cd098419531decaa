//! [`MailStore`] over a live IMAP session

use crate::connection::ImapSession;
use crate::error::{Error, Result};
use crate::search::MailStore;
use futures::StreamExt;
use std::collections::HashSet;
use tracing::{debug, info};

const SEEN: &str = "\\Seen";
const DELETED: &str = "\\Deleted";

/// How a single message leaves the inbox, by advertised capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSupport {
    /// `UID MOVE` (RFC 6851).
    Move,
    /// COPY, flag, then `UID EXPUNGE` of that one UID (RFC 4315).
    UidPlus,
    /// COPY, flag, then a plain EXPUNGE with every other `\Deleted`
    /// message temporarily unflagged.
    Plain,
}

impl MoveSupport {
    /// Pick the narrowest move a server offers.
    #[must_use]
    pub fn detect(has: impl Fn(&str) -> bool) -> Self {
        if has("MOVE") {
            Self::Move
        } else if has("UIDPLUS") {
            Self::UidPlus
        } else {
            Self::Plain
        }
    }
}

/// Mailbox operations on a session with INBOX selected.
pub struct ImapStore<'a> {
    session: &'a mut ImapSession,
    move_support: Option<MoveSupport>,
}

impl<'a> ImapStore<'a> {
    pub const fn new(session: &'a mut ImapSession) -> Self {
        Self {
            session,
            move_support: None,
        }
    }

    async fn store_flag(&mut self, uid_set: &str, query: &str) -> Result<()> {
        let updates = self
            .session
            .uid_store(uid_set, query)
            .await
            .map_err(|e| Error::Imap(format!("Store {query} failed: {e}")))?;
        let mut updates = Box::pin(updates);
        while let Some(item) = updates.next().await {
            item.map_err(|e| Error::Imap(format!("Store error: {e}")))?;
        }
        Ok(())
    }

    async fn folder_exists(&mut self, folder: &str) -> Result<bool> {
        let listing = self
            .session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| Error::Imap(format!("List folders failed: {e}")))?;
        let mut listing = Box::pin(listing);

        let mut found = false;
        while let Some(item) = listing.next().await {
            if let Ok(name) = item
                && name.name() == folder
            {
                found = true;
            }
        }
        Ok(found)
    }

    async fn move_support(&mut self) -> Result<MoveSupport> {
        if let Some(support) = self.move_support {
            return Ok(support);
        }
        let capabilities = self
            .session
            .capabilities()
            .await
            .map_err(|e| Error::Imap(format!("Capability failed: {e}")))?;
        let support = MoveSupport::detect(|cap| capabilities.has_str(cap));
        debug!("Server move support: {:?}", support);
        self.move_support = Some(support);
        Ok(support)
    }

    async fn copy(&mut self, uid_set: &str, folder: &str) -> Result<()> {
        self.session
            .uid_copy(uid_set, folder)
            .await
            .map_err(|e| Error::Imap(format!("Copy to {folder} failed: {e}")))
    }

    async fn uid_expunge(&mut self, uid_set: &str) -> Result<()> {
        let expunged = self
            .session
            .uid_expunge(uid_set)
            .await
            .map_err(|e| Error::Imap(format!("UID EXPUNGE failed: {e}")))?;
        let mut expunged = Box::pin(expunged);
        while let Some(item) = expunged.next().await {
            item.map_err(|e| Error::Imap(format!("Expunge error: {e}")))?;
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let expunged = self
            .session
            .expunge()
            .await
            .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?;
        let mut expunged = Box::pin(expunged);
        while let Some(item) = expunged.next().await {
            item.map_err(|e| Error::Imap(format!("Expunge error: {e}")))?;
        }
        Ok(())
    }

    /// EXPUNGE that only removes `uid`: other `\Deleted` messages lose
    /// the flag for the duration and get it back afterwards.
    async fn expunge_only(&mut self, uid: u32) -> Result<()> {
        let others: HashSet<u32> = self
            .session
            .uid_search("DELETED")
            .await
            .map_err(|e| Error::Imap(format!("Search failed: {e}")))?
            .into_iter()
            .filter(|&other| other != uid)
            .collect();
        let others = uid_set(&others);

        if let Some(set) = &others {
            self.store_flag(set, &format!("-FLAGS ({DELETED})")).await?;
        }
        self.store_flag(&uid.to_string(), &format!("+FLAGS ({DELETED})"))
            .await?;
        let result = self.expunge().await;
        if let Some(set) = &others {
            self.store_flag(set, &format!("+FLAGS ({DELETED})")).await?;
        }
        result
    }
}

/// Comma-separated UID set, `None` when empty.
fn uid_set(uids: &HashSet<u32>) -> Option<String> {
    let mut sorted: Vec<u32> = uids.iter().copied().collect();
    sorted.sort_unstable();
    let joined = sorted
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    (!joined.is_empty()).then_some(joined)
}

impl MailStore for ImapStore<'_> {
    async fn ensure_folder(&mut self, folder: &str) -> Result<()> {
        if self.folder_exists(folder).await? {
            return Ok(());
        }
        self.session
            .create(folder)
            .await
            .map_err(|e| Error::Imap(format!("Create {folder} failed: {e}")))?;
        info!("Created folder {}", folder);
        Ok(())
    }

    async fn list_uids(&mut self) -> Result<Vec<u32>> {
        let uids = self
            .session
            .uid_search("ALL")
            .await
            .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;
        Ok(uids.into_iter().collect())
    }

    async fn fetch_source(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let uid_set = uid.to_string();
        let messages = self
            .session
            .uid_fetch(&uid_set, "(BODY.PEEK[])")
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;
        let mut messages = Box::pin(messages);

        let mut source = None;
        while let Some(item) = messages.next().await {
            let msg = item.map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;
            if source.is_none() {
                source = msg.body().map(<[u8]>::to_vec);
            }
        }
        Ok(source)
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<()> {
        self.store_flag(&uid.to_string(), &format!("+FLAGS ({SEEN})"))
            .await
    }

    async fn move_to(&mut self, uid: u32, folder: &str) -> Result<()> {
        let uid_set = uid.to_string();

        match self.move_support().await? {
            MoveSupport::Move => self
                .session
                .uid_mv(&uid_set, folder)
                .await
                .map_err(|e| Error::Imap(format!("Move to {folder} failed: {e}")))?,
            MoveSupport::UidPlus => {
                self.copy(&uid_set, folder).await?;
                self.store_flag(&uid_set, &format!("+FLAGS ({DELETED})"))
                    .await?;
                self.uid_expunge(&uid_set).await?;
            }
            MoveSupport::Plain => {
                self.copy(&uid_set, folder).await?;
                self.expunge_only(uid).await?;
            }
        }

        debug!("Moved UID {} to {}", uid, folder);
        Ok(())
    }
}
