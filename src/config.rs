//! Environment-driven configuration
//!
//! Both structs are built once at process entry and handed to the
//! collaborators that need them. `from_env()` reads a `.env` file if
//! present; `from_lookup()` accepts any variable source so parsing can
//! be tested without touching the process environment.

use crate::error::{Error, Result};
use std::env;

const DEFAULT_IMAP_PORT: u16 = 993;
const DEFAULT_CHECKED_FOLDER: &str = "checked";

/// IMAP mailbox used to receive product mail
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Folder that matched messages are moved into when a search asks
    /// for `move_out`.
    pub checked_folder: String,
    /// Skip certificate verification (self-signed test servers).
    pub accept_invalid_certs: bool,
}

impl MailConfig {
    /// Load the mail configuration from environment variables
    ///
    /// Required:
    /// - `QA_MAIL_DOMAIN` (IMAP host)
    /// - `QA_MAIL_LOGIN`
    /// - `QA_MAIL_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_PORT` (default: `993`)
    /// - `MAIL_CHECKED_FOLDER` (default: `checked`)
    /// - `IMAP_ACCEPT_INVALID_CERTS` (default: `false`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("IMAP_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            None => DEFAULT_IMAP_PORT,
        };

        Ok(Self {
            host: required(&lookup, "QA_MAIL_DOMAIN")?,
            port,
            username: required(&lookup, "QA_MAIL_LOGIN")?,
            password: required(&lookup, "QA_MAIL_PASSWORD")?,
            checked_folder: lookup("MAIL_CHECKED_FOLDER")
                .unwrap_or_else(|| DEFAULT_CHECKED_FOLDER.to_string()),
            accept_invalid_certs: flag(&lookup, "IMAP_ACCEPT_INVALID_CERTS")?,
        })
    }
}

/// Login for one portal account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Portal provisioning and payment settings
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base domain of the environment under test, e.g. `example.io`.
    pub test_domain: String,
    pub registration_url: String,
    pub admin: Credentials,
    pub user: Option<Credentials>,
    /// Standalone installation: plain `http://` portal URLs and a
    /// pre-shared token on registration.
    pub local: bool,
    pub local_auth_token: Option<String>,
    pub aws_region: Option<String>,
    pub machine_key: Option<String>,
    pub public_key: Option<String>,
    pub payment_url: String,
}

impl PortalConfig {
    /// Load the portal configuration from environment variables
    ///
    /// `TEST_DOMAIN`, `DOCSPACE_ADMIN_EMAIL` and
    /// `DOCSPACE_ADMIN_PASSWORD` are required. Everything else is
    /// optional, see the field docs.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let test_domain = required(&lookup, "TEST_DOMAIN")?;

        let user = match (
            lookup("DOCSPACE_USER_EMAIL"),
            lookup("DOCSPACE_USER_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        Ok(Self {
            registration_url: lookup("PORTAL_REGISTRATION_URL")
                .unwrap_or_else(|| format!("https://{test_domain}/apisystem/portal")),
            admin: Credentials {
                email: required(&lookup, "DOCSPACE_ADMIN_EMAIL")?,
                password: required(&lookup, "DOCSPACE_ADMIN_PASSWORD")?,
            },
            user,
            local: flag(&lookup, "DOCSPACE_LOCAL")?,
            local_auth_token: lookup("DOCSPACE_AUTH_TOKEN"),
            aws_region: lookup("AWS_REGION"),
            machine_key: lookup("MACHINEKEY"),
            public_key: lookup("PKEY"),
            payment_url: lookup("PAYMENT_URL")
                .unwrap_or_else(|| format!("https://payments.{test_domain}")),
            test_domain,
        })
    }

    /// URL scheme used to reach provisioned portals.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        if self.local { "http" } else { "https" }
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{key} not set")))
}

fn flag<F>(lookup: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref() {
        None | Some("" | "0" | "false") => Ok(false),
        Some("1" | "true") => Ok(true),
        Some(other) => Err(Error::Config(format!("Invalid {key}: {other}"))),
    }
}
