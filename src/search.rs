//! Mailbox polling
//!
//! [`poll`] implements the search loop shared by every `MailChecker`
//! method. It is written against the [`MailStore`] trait so the loop
//! can run on a live IMAP session or an in-memory store, and against
//! [`Clock`] so its timeout can be exercised without waiting.
//!
//! Each iteration looks at the `window` highest UIDs only. A matching
//! message older than that window is never seen, even well before the
//! deadline; callers awaiting freshly delivered mail are unaffected.

use crate::clock::Clock;
use crate::error::Result;
use crate::message::{
    Candidate, EmailMatch, contains_ignore_case, decode_quoted_printable, has_portal_link,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for subject and link searches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Default timeout for sender-qualified searches.
pub const DEFAULT_SENDER_TIMEOUT: Duration = Duration::from_secs(600);

/// Storage operations the polling loop needs from a mailbox.
///
/// Implementations operate on an already selected INBOX.
pub trait MailStore: Send {
    /// Create `folder` unless it already exists.
    fn ensure_folder(&mut self, folder: &str) -> impl Future<Output = Result<()>> + Send;

    /// UIDs of every message in the inbox, seen or not.
    fn list_uids(&mut self) -> impl Future<Output = Result<Vec<u32>>> + Send;

    /// Raw RFC 2822 source of a message, `None` if it vanished.
    fn fetch_source(&mut self, uid: u32) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    fn mark_seen(&mut self, uid: u32) -> impl Future<Output = Result<()>> + Send;

    /// Relocate a message out of the inbox into `folder`.
    fn move_to(&mut self, uid: u32, folder: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Caller-facing knobs of a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub timeout: Duration,
    /// Move the match to the checked folder instead of flagging it
    /// `\Seen`.
    pub move_out: bool,
}

impl SearchOptions {
    #[must_use]
    pub const fn new(timeout: Duration, move_out: bool) -> Self {
        Self { timeout, move_out }
    }

    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            move_out: false,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

/// Loop tuning shared by all searches of one checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// How many of the most recent messages are inspected per pass.
    pub window: usize,
    pub interval: Duration,
    /// Pause between passes when the body has to be inspected.
    pub link_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            window: 5,
            interval: Duration::from_secs(1),
            link_interval: Duration::from_secs(5),
        }
    }
}

/// What a message has to look like to be returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub subject: String,
    pub sender: Option<String>,
    /// Portal whose host must appear in an HTTPS link in the body.
    pub portal_name: Option<String>,
    pub timeout: Duration,
    pub move_out: bool,
}

impl SearchCriteria {
    #[must_use]
    pub fn subject(subject: &str, options: SearchOptions) -> Self {
        Self {
            subject: subject.to_string(),
            sender: None,
            portal_name: None,
            timeout: options.timeout,
            move_out: options.move_out,
        }
    }

    #[must_use]
    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = Some(sender.to_string());
        self
    }

    #[must_use]
    pub fn with_portal_link(mut self, portal_name: &str) -> Self {
        self.portal_name = Some(portal_name.to_string());
        self
    }

    /// Whether `candidate` satisfies every configured condition.
    #[must_use]
    pub fn matches(&self, candidate: &Candidate) -> bool {
        if !contains_ignore_case(&candidate.subject, &self.subject) {
            return false;
        }
        if let Some(sender) = &self.sender
            && !contains_ignore_case(&candidate.sender, sender)
        {
            return false;
        }
        if let Some(portal) = &self.portal_name {
            let body = decode_quoted_printable(&candidate.body);
            return has_portal_link(&body, portal);
        }
        true
    }

    fn interval(&self, settings: &PollSettings) -> Duration {
        if self.portal_name.is_some() {
            settings.link_interval
        } else {
            settings.interval
        }
    }

    fn to_match(&self, candidate: Candidate) -> EmailMatch {
        EmailMatch {
            uid: candidate.uid,
            subject: candidate.subject,
            sender: self.sender.as_ref().map(|_| candidate.sender),
            body: self.portal_name.as_ref().map(|_| candidate.source),
        }
    }
}

/// Poll `store` until a message satisfies `criteria` or the timeout
/// elapses.
///
/// Matches are moved to `checked_folder` when `criteria.move_out` is
/// set, flagged `\Seen` otherwise. Returns `Ok(None)` on timeout.
/// Store failures propagate, except that a single message which cannot
/// be fetched or parsed is skipped.
pub async fn poll<S, C>(
    store: &mut S,
    clock: &C,
    criteria: &SearchCriteria,
    settings: &PollSettings,
    checked_folder: &str,
) -> Result<Option<EmailMatch>>
where
    S: MailStore,
    C: Clock,
{
    if criteria.move_out {
        store.ensure_folder(checked_folder).await?;
    }

    let start = clock.now();
    let interval = criteria.interval(settings);
    let mut pass = 0_u32;

    while clock.now().duration_since(start) < criteria.timeout {
        pass += 1;
        let candidates = recent_candidates(store, settings.window).await?;
        debug!(
            "Pass {}: inspecting {} message(s) for '{}'",
            pass,
            candidates.len(),
            criteria.subject
        );

        if let Some(candidate) = candidates.into_iter().find(|c| criteria.matches(c)) {
            let uid = candidate.uid;
            if criteria.move_out {
                store.move_to(uid, checked_folder).await?;
            } else {
                store.mark_seen(uid).await?;
            }
            info!("Found message UID {} matching '{}'", uid, criteria.subject);
            return Ok(Some(criteria.to_match(candidate)));
        }

        let remaining = criteria
            .timeout
            .saturating_sub(clock.now().duration_since(start));
        if remaining.is_zero() {
            break;
        }
        clock.sleep(interval.min(remaining)).await;
    }

    info!(
        "No message matching '{}' within {:?}",
        criteria.subject, criteria.timeout
    );
    Ok(None)
}

/// Fetch the `window` highest UIDs, oldest date first.
async fn recent_candidates<S: MailStore>(store: &mut S, window: usize) -> Result<Vec<Candidate>> {
    let mut uids = store.list_uids().await?;
    uids.sort_unstable();
    let start = uids.len().saturating_sub(window);

    let mut candidates = Vec::with_capacity(uids.len() - start);
    for &uid in &uids[start..] {
        match store.fetch_source(uid).await {
            Ok(Some(raw)) => match Candidate::parse(uid, &raw) {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => warn!("Skipping UID {}: {}", uid, e),
            },
            Ok(None) => debug!("UID {} disappeared before fetch", uid),
            Err(e) => warn!("Failed to fetch UID {}: {}", uid, e),
        }
    }

    candidates.sort_by_key(|c| c.date);
    Ok(candidates)
}
