//! People API

use super::http::{Envelope, PortalApi, ensure_success, read_json};
use crate::config::Credentials;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::{debug, info};

/// Portal role of a user, sent by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    DocSpaceAdmin,
    RoomAdmin,
    User,
    Guest,
}

impl FromStr for UserType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DocSpaceAdmin" => Ok(Self::DocSpaceAdmin),
            "RoomAdmin" => Ok(Self::RoomAdmin),
            "User" => Ok(Self::User),
            "Guest" => Ok(Self::Guest),
            other => Err(Error::Parse(format!("Invalid user type: {other}"))),
        }
    }
}

/// Body of a user-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
}

impl NewUser {
    /// A user with placeholder names for the given login.
    #[must_use]
    pub fn from_credentials(credentials: &Credentials, user_type: UserType) -> Self {
        Self {
            first_name: "qa".to_string(),
            last_name: "user".to_string(),
            email: credentials.email.clone(),
            password: credentials.password.clone(),
            user_type,
        }
    }
}

/// A user profile as returned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

pub struct PeopleApi {
    api: PortalApi,
}

impl PeopleApi {
    #[must_use]
    pub const fn new(api: PortalApi) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn create_user(&self, user: &NewUser) -> Result<Profile> {
        let response = self.api.post("people").json(user).send().await?;
        let created: Envelope<Profile> = read_json(response, "Failed to create user").await?;

        info!("User created: {} ({:?})", created.response.email, user.user_type);
        Ok(created.response)
    }

    /// Mark the given users as activated
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn activate(&self, user_ids: &[&str]) -> Result<()> {
        let response = self
            .api
            .put("people/activationstatus/Activated")
            .json(&json!({ "userIds": user_ids }))
            .send()
            .await?;
        ensure_success(response, "Failed to activate admin user").await?;
        debug!("Activated {} user(s)", user_ids.len());
        Ok(())
    }
}
