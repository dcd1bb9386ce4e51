use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

pub type RoomId = String;

/// Whether a room is listed openly or guarded by a password.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// Who sits in the second seat.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum GameMode {
    #[serde(rename = "pvp")]
    PlayerVsPlayer,
    #[serde(rename = "bot")]
    PlayerVsBot,
}

/// Persisted room metadata, owned by the directory.
///
/// Immutable after creation; the only mutation is deletion when a room is
/// dissolved or abandoned. The raw password never leaves this module;
/// callers see [`RoomListing`] instead.
#[derive(Debug, Clone)]
pub struct RoomDescriptor {
    pub id: RoomId,
    pub name: String,
    pub visibility: Visibility,
    pub password: Option<String>,
    pub mode: GameMode,
    pub created_by: String,
    pub created_at: String,
}

impl RoomDescriptor {
    /// Checks a join attempt's password. Public rooms accept anything;
    /// the creator is exempt.
    pub fn allows(&self, identity: &str, password: Option<&str>) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private => {
                identity == self.created_by || password == self.password.as_deref()
            }
        }
    }
}

/// Public projection of a room for lobby listings and events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomListing {
    pub id: RoomId,
    pub name: String,
    pub visibility: Visibility,
    pub mode: GameMode,
    pub created_by: String,
    pub created_at: String,
}

impl From<&RoomDescriptor> for RoomListing {
    fn from(room: &RoomDescriptor) -> Self {
        Self {
            id: room.id.clone(),
            name: room.name.clone(),
            visibility: room.visibility,
            mode: room.mode,
            created_by: room.created_by.clone(),
            created_at: room.created_at.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("room name must not be empty")]
    NameRequired,
    #[error("private rooms require a password")]
    PasswordRequired,
    #[error("room storage poisoned")]
    StoragePoisoned,
}

/// Read access the session manager needs from the directory.
pub trait RoomDirectory: Send + Sync {
    fn lookup(&self, room_id: &str) -> Result<Option<RoomDescriptor>, RegistryError>;

    /// Removes the room. Returns whether it existed.
    fn delete(&self, room_id: &str) -> Result<bool, RegistryError>;
}

/// In-memory room directory.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomDescriptor>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new room and returns its descriptor.
    pub fn create(
        &self,
        name: &str,
        visibility: Visibility,
        password: Option<String>,
        mode: GameMode,
        created_by: &str,
    ) -> Result<RoomDescriptor, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::NameRequired);
        }
        let password = password.filter(|p| !p.is_empty());
        if visibility == Visibility::Private && password.is_none() {
            return Err(RegistryError::PasswordRequired);
        }

        let room = RoomDescriptor {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            visibility,
            password: match visibility {
                Visibility::Private => password,
                Visibility::Public => None,
            },
            mode,
            created_by: created_by.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!(
            room_id = %room.id,
            name = %room.name,
            visibility = ?room.visibility,
            mode = ?room.mode,
            created_by = %room.created_by,
            "room created"
        );

        let mut guard = self
            .rooms
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        guard.insert(room.id.clone(), room.clone());
        Ok(room)
    }

    /// All rooms, oldest first.
    pub fn list(&self) -> Result<Vec<RoomListing>, RegistryError> {
        let guard = self
            .rooms
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        let mut listings: Vec<RoomListing> = guard.values().map(RoomListing::from).collect();
        listings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(listings)
    }

    pub fn len(&self) -> usize {
        self.rooms.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RoomDirectory for RoomRegistry {
    fn lookup(&self, room_id: &str) -> Result<Option<RoomDescriptor>, RegistryError> {
        let guard = self
            .rooms
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(guard.get(room_id).cloned())
    }

    fn delete(&self, room_id: &str) -> Result<bool, RegistryError> {
        let mut guard = self
            .rooms
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        let removed = guard.remove(room_id).is_some();
        if removed {
            tracing::info!(room_id = %room_id, "room deleted");
        }
        Ok(removed)
    }
}

impl crate::errors::IntoErrorResponse for RegistryError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            RegistryError::NameRequired | RegistryError::PasswordRequired => {
                StatusCode::BAD_REQUEST
            }
            RegistryError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RegistryError::NameRequired => "room_name_required",
            RegistryError::PasswordRequired => "room_password_required",
            RegistryError::StoragePoisoned => "room_storage_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        match self {
            RegistryError::StoragePoisoned => crate::errors::ErrorSeverity::Critical,
            _ => crate::errors::ErrorSeverity::Client,
        }
    }
}
