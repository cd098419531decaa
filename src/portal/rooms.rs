//! Rooms API

use super::http::{Envelope, PortalApi, ensure_success, read_json};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Kind of room, sent as its numeric API code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomType {
    FormFilling,
    Collaboration,
    Custom,
    Public,
    VirtualData,
}

impl RoomType {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::FormFilling => 1,
            Self::Collaboration => 2,
            Self::Custom => 5,
            Self::Public => 6,
            Self::VirtualData => 8,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FormFilling => "form_filling",
            Self::Collaboration => "collaboration",
            Self::Custom => "custom",
            Self::Public => "public",
            Self::VirtualData => "virtual_data",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "form_filling" => Ok(Self::FormFilling),
            "collaboration" => Ok(Self::Collaboration),
            "custom" => Ok(Self::Custom),
            "public" => Ok(Self::Public),
            "virtual_data" => Ok(Self::VirtualData),
            other => Err(Error::Parse(format!("Invalid room type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: u64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
struct RoomList {
    #[serde(default)]
    folders: Vec<Room>,
}

pub struct RoomsApi {
    api: PortalApi,
}

impl RoomsApi {
    #[must_use]
    pub const fn new(api: PortalApi) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn create_room(&self, title: &str, room_type: RoomType) -> Result<Room> {
        let response = self
            .api
            .post("files/rooms")
            .json(&json!({ "title": title, "roomType": room_type.code() }))
            .send()
            .await?;
        let created: Envelope<Room> = read_json(response, "Failed to create room").await?;

        info!("Room created: \"{}\" ({})", created.response.title, created.response.id);
        Ok(created.response)
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        let response = self.api.get("files/rooms").send().await?;
        let list: Envelope<Option<RoomList>> =
            read_json(response, "Failed to fetch rooms").await?;
        Ok(list.response.unwrap_or_default().folders)
    }

    /// Move a room to the archive
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn archive_room(&self, id: u64, delete_after: bool) -> Result<()> {
        let response = self
            .api
            .put(&format!("files/rooms/{id}/archive"))
            .json(&json!({ "deleteAfter": delete_after }))
            .send()
            .await?;
        ensure_success(response, "Failed to archive room").await?;
        debug!("Room {} archived", id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn pin_room(&self, id: u64) -> Result<()> {
        let response = self
            .api
            .put(&format!("files/rooms/{id}/pin"))
            .send()
            .await?;
        ensure_success(response, "Failed to pin room").await?;
        info!("Room {} pinned", id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn delete_room(&self, id: u64, delete_after: bool) -> Result<()> {
        let response = self
            .api
            .delete(&format!("files/rooms/{id}"))
            .json(&json!({ "deleteAfter": delete_after }))
            .send()
            .await?;
        ensure_success(response, "Failed to delete room").await?;
        info!("Room {} deleted", id);
        Ok(())
    }
}
