//! Portal lifecycle over the REST API
//!
//! [`PortalSetup`] registers a fresh tenant, authenticates its owner,
//! activates it and, at the end of a run, tears everything down again.
//! The sub-APIs ([`FilesApi`], [`RoomsApi`], [`PeopleApi`],
//! [`PaymentApi`]) are handed out once a token is available.

pub mod files;
pub mod http;
pub mod payment;
pub mod people;
pub mod rooms;

pub use files::{Contents, Entry, FilesApi, RetryPolicy};
pub use http::PortalApi;
pub use payment::{PaymentApi, PaymentOutcome, create_token, sign};
pub use people::{NewUser, PeopleApi, Profile, UserType};
pub use rooms::{Room, RoomType, RoomsApi};

use crate::clock::{Clock, TokioClock};
use crate::config::{Credentials, PortalConfig};
use crate::error::{Error, Result};
use chrono::Utc;
use http::{Envelope, ensure_success, read_json};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

pub const DEFAULT_PREFIX: &str = "test-portal";

/// A tenant provisioned by this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalRecord {
    pub name: String,
    /// Host (and port) the tenant is served on.
    pub domain: String,
    pub admin_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl PortalRecord {
    /// Value sent as `reference` when deleting the tenant: the portal
    /// name followed by the domain minus its first label.
    #[must_use]
    pub fn deletion_reference(&self) -> String {
        match self.domain.split_once('.') {
            Some((_, parent)) => format!("{}.{parent}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tenant {
    domain: String,
    owner_id: String,
}

#[derive(Debug, Deserialize)]
struct Registration {
    tenant: Tenant,
}

#[derive(Debug, Deserialize)]
struct Token {
    token: String,
}

/// Drives one tenant through register → authenticate → activate and
/// back to deletion
pub struct PortalSetup<C: Clock = TokioClock> {
    client: Client,
    config: PortalConfig,
    clock: C,
    record: Option<PortalRecord>,
}

impl PortalSetup {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: PortalConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_clock(config, client, TokioClock))
    }
}

impl<C: Clock> PortalSetup<C> {
    #[must_use]
    pub const fn with_clock(config: PortalConfig, client: Client, clock: C) -> Self {
        Self {
            client,
            config,
            clock,
            record: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PortalConfig {
        &self.config
    }

    #[must_use]
    pub const fn record(&self) -> Option<&PortalRecord> {
        self.record.as_ref()
    }

    /// Take over a tenant provisioned earlier, e.g. by another process.
    pub fn attach(&mut self, record: PortalRecord) {
        self.record = Some(record);
    }

    fn created(&self) -> Result<&PortalRecord> {
        self.record
            .as_ref()
            .ok_or_else(|| Error::Api("Portal has not been created".to_string()))
    }

    /// `scheme://domain` of the provisioned tenant.
    ///
    /// # Errors
    ///
    /// Returns an error before [`PortalSetup::create_portal`].
    pub fn portal_url(&self) -> Result<String> {
        Ok(format!("{}://{}", self.config.scheme(), self.created()?.domain))
    }

    /// `Authorization` header value for the admin session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] before a successful
    /// [`PortalSetup::authenticate`].
    pub fn auth_header(&self) -> Result<String> {
        self.record
            .as_ref()
            .and_then(|r| r.token.as_deref())
            .map(|token| format!("Bearer {token}"))
            .ok_or(Error::NotAuthenticated)
    }

    /// Authenticated API handle for the admin session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] before authentication.
    pub fn api(&self) -> Result<PortalApi> {
        let token = self
            .record
            .as_ref()
            .and_then(|r| r.token.as_deref())
            .ok_or(Error::NotAuthenticated)?;
        Ok(PortalApi::new(self.client.clone(), &self.portal_url()?, token))
    }

    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] before authentication.
    pub fn files(&self) -> Result<FilesApi<&C>> {
        Ok(FilesApi::with_clock(self.api()?, &self.clock))
    }

    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] before authentication.
    pub fn rooms(&self) -> Result<RoomsApi> {
        Ok(RoomsApi::new(self.api()?))
    }

    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] before authentication.
    pub fn people(&self) -> Result<PeopleApi> {
        Ok(PeopleApi::new(self.api()?))
    }

    /// # Errors
    ///
    /// Returns an error before authentication or when the payment keys
    /// are not configured.
    pub fn payment(&self) -> Result<PaymentApi> {
        PaymentApi::new(self.api()?, &self.config)
    }

    /// Register a tenant named `{prefix}-{UTC timestamp}`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if registration is rejected.
    pub async fn create_portal(&mut self, prefix: &str) -> Result<&PortalRecord> {
        let name = format!("{prefix}-{}", Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ"));
        info!("Creating portal: {}", name);

        let mut request = self
            .client
            .post(format!("{}/register", self.config.registration_url))
            .json(&json!({
                "portalName": name,
                "firstName": "admin-zero",
                "lastName": "admin-zero",
                "email": self.config.admin.email,
                "password": self.config.admin.password,
                "language": "en",
                "awsRegion": self.config.aws_region,
            }));
        if self.config.local
            && let Some(token) = &self.config.local_auth_token
        {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let registration: Registration =
            read_json(request.send().await?, "Failed to create portal").await?;

        info!(
            "Portal created: {} ({})",
            name, registration.tenant.domain
        );
        Ok(self.record.insert(PortalRecord {
            name,
            domain: registration.tenant.domain,
            admin_user_id: registration.tenant.owner_id,
            token: None,
        }))
    }

    /// Log in as the configured admin and keep the token
    ///
    /// # Errors
    ///
    /// Returns an error before [`PortalSetup::create_portal`] or if the
    /// credentials are rejected.
    pub async fn authenticate(&mut self) -> Result<String> {
        let admin = self.config.admin.clone();
        let token = self.authenticate_as(&admin).await?;
        if let Some(record) = self.record.as_mut() {
            record.token = Some(token.clone());
        }
        info!("Authenticated successfully");
        Ok(token)
    }

    /// Log in as any account of the tenant; the admin token is left
    /// untouched
    ///
    /// # Errors
    ///
    /// Returns an error before [`PortalSetup::create_portal`] or if the
    /// credentials are rejected.
    pub async fn authenticate_as(&self, credentials: &Credentials) -> Result<String> {
        let url = format!("{}/api/2.0/authentication", self.portal_url()?);
        debug!("Authenticating {}", credentials.email);

        let response = self
            .client
            .post(url)
            .json(&json!({
                "userName": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await?;
        let body: Envelope<Token> = read_json(response, "Authentication failed").await?;
        Ok(body.response.token)
    }

    /// # Errors
    ///
    /// Returns an error before authentication or on a non-2xx response.
    pub async fn activate_admin(&self) -> Result<()> {
        let admin_id = self.created()?.admin_user_id.clone();
        self.people()?.activate(&[admin_id.as_str()]).await?;
        info!("Admin user activated");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error before authentication or on a non-2xx response.
    pub async fn create_user(&self, user: &NewUser) -> Result<Profile> {
        self.people()?.create_user(user).await
    }

    /// Register, authenticate and activate; also creates the
    /// configured secondary user, if any
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; later steps do not run.
    pub async fn setup_portal(&mut self, prefix: &str) -> Result<PortalRecord> {
        self.create_portal(prefix).await?;
        self.authenticate().await?;
        self.activate_admin().await?;

        if let Some(user) = self.config.user.clone() {
            self.create_user(&NewUser::from_credentials(&user, UserType::User))
                .await?;
        }

        self.created().cloned()
    }

    /// Delete the tenant immediately
    ///
    /// # Errors
    ///
    /// Returns an error before authentication or on a non-2xx response.
    pub async fn delete_portal(&self) -> Result<()> {
        let record = self.created()?;
        let response = self
            .api()?
            .delete("portal/deleteportalimmediately")
            .json(&json!({ "reference": record.deletion_reference() }))
            .send()
            .await?;
        ensure_success(response, "Failed to delete portal").await?;

        info!("Portal deleted: {}", record.name);
        Ok(())
    }

    /// Remove rooms, files and folders, then delete the tenant
    ///
    /// Room, file and folder failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant deletion itself fails.
    pub async fn teardown(&self) -> Result<()> {
        if let Err(e) = self.delete_rooms().await {
            warn!("Room cleanup failed: {}", e);
        }

        match self.files() {
            Ok(files) => {
                if let Err(e) = files.purge_files().await {
                    warn!("File cleanup failed: {}", e);
                }
                if let Err(e) = files.purge_folders().await {
                    warn!("Folder cleanup failed: {}", e);
                }
            }
            Err(e) => warn!("Skipping file cleanup: {}", e),
        }

        self.delete_portal().await
    }

    /// Archive every room, then delete it. A room the portal refuses to
    /// archive is still deleted.
    async fn delete_rooms(&self) -> Result<()> {
        let rooms = self.rooms()?;
        for room in rooms.list_rooms().await? {
            if let Err(e) = rooms.archive_room(room.id, false).await {
                warn!("Failed to archive room {}: {}", room.id, e);
            }
            if let Err(e) = rooms.delete_room(room.id, true).await {
                warn!("Failed to delete room {}: {}", room.id, e);
            }
        }
        Ok(())
    }
}
