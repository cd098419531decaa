//! Mailbox poller
//!
//! Every search opens its own IMAPS session, selects INBOX, polls until
//! a match or the timeout, then logs out. Searches on one checker are
//! serialised by an inbox lock so two tests never race on the same
//! message.

use crate::clock::{Clock, TokioClock};
use crate::config::MailConfig;
use crate::connection;
use crate::error::Result;
use crate::message::{EmailMatch, decode_quoted_printable, find_confirmation_link};
use crate::search::{self, PollSettings, SearchCriteria, SearchOptions};
use crate::store::ImapStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const INBOX: &str = "INBOX";

/// Waits for product-generated mail in one IMAP account
pub struct MailChecker<C: Clock = TokioClock> {
    config: MailConfig,
    settings: PollSettings,
    clock: C,
    lock: Mutex<()>,
}

impl MailChecker {
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        Self::with_clock(config, TokioClock)
    }
}

impl<C: Clock> MailChecker<C> {
    #[must_use]
    pub fn with_clock(config: MailConfig, clock: C) -> Self {
        Self {
            config,
            settings: PollSettings::default(),
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Override the recency window and poll intervals.
    #[must_use]
    pub const fn with_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &MailConfig {
        &self.config
    }

    /// Wait for a message whose subject contains `subject`
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, login, SELECT, SEARCH or the
    /// post-match side effect fails. A timeout is `Ok(None)`.
    pub async fn find_by_subject(
        &self,
        subject: &str,
        options: SearchOptions,
    ) -> Result<Option<EmailMatch>> {
        self.search(SearchCriteria::subject(subject, options)).await
    }

    /// Wait for a message from `sender` whose subject contains `subject`
    ///
    /// `sender` is matched against the From display name.
    ///
    /// # Errors
    ///
    /// See [`MailChecker::find_by_subject`].
    pub async fn find_by_sender_and_subject(
        &self,
        subject: &str,
        sender: &str,
        options: SearchOptions,
    ) -> Result<Option<EmailMatch>> {
        self.search(SearchCriteria::subject(subject, options).with_sender(sender))
            .await
    }

    /// Wait for a message whose body links to `portal_name`
    ///
    /// # Errors
    ///
    /// See [`MailChecker::find_by_subject`].
    pub async fn find_by_subject_with_link(
        &self,
        subject: &str,
        portal_name: &str,
        options: SearchOptions,
    ) -> Result<Option<EmailMatch>> {
        self.search(SearchCriteria::subject(subject, options).with_portal_link(portal_name))
            .await
    }

    /// Wait for a portal mail and return its confirmation link
    ///
    /// Returns `Ok(None)` when no mail arrives in time or the matching
    /// mail carries no `https://<host>/s/<token>` link.
    ///
    /// # Errors
    ///
    /// See [`MailChecker::find_by_subject`].
    pub async fn extract_link(
        &self,
        subject: &str,
        portal_name: &str,
        options: SearchOptions,
    ) -> Result<Option<String>> {
        let Some(found) = self
            .find_by_subject_with_link(subject, portal_name, options)
            .await?
        else {
            return Ok(None);
        };

        let decoded = decode_quoted_printable(found.body.as_deref().unwrap_or_default());
        let link = find_confirmation_link(&decoded);
        if link.is_none() {
            warn!("Message UID {} has no confirmation link", found.uid);
        }
        Ok(link)
    }

    async fn search(&self, criteria: SearchCriteria) -> Result<Option<EmailMatch>> {
        let _guard = self.lock.lock().await;
        debug!("Searching INBOX for '{}'", criteria.subject);

        let mut session = connection::connect(&self.config).await?;

        let result = match connection::select(&mut session, INBOX).await {
            Ok(()) => {
                let mut store = ImapStore::new(&mut session);
                search::poll(
                    &mut store,
                    &self.clock,
                    &criteria,
                    &self.settings,
                    &self.config.checked_folder,
                )
                .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = session.logout().await {
            warn!("Logout failed: {}", e);
        }

        if let Ok(Some(found)) = &result {
            info!("Matched '{}' (UID {})", found.subject, found.uid);
        }
        result
    }
}
