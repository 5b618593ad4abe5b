// used for persistence
use rusqlite::{params, Connection, OptionalExtension};

use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use crate::entity::Entity;
use crate::error::{Result, Soft7Error};

/// Where the entity store keeps its data.
#[derive(Debug, Clone)]
pub enum PersistenceMode {
    InMemory,
    File(PathBuf),
}

/// A store of entity schemas keyed by identity.
///
/// `create` refuses an identity that is already stored; `update` replaces an
/// existing document and refuses an unknown identity. Both record timestamps.
pub struct EntityStore {
    connection: Connection,
}

impl EntityStore {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let connection = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS \"Entity\" (
                identity TEXT NOT NULL PRIMARY KEY,
                document TEXT NOT NULL,
                created  TEXT NOT NULL,
                modified TEXT NOT NULL
            );",
        )?;
        Ok(Self { connection })
    }

    /// Insert an entity. Refuses an identity that already exists.
    pub fn create(&self, entity: &Entity) -> Result<()> {
        let identity = entity.identity().iri();
        if self.contains(identity)? {
            return Err(Soft7Error::EntityExists(format!(
                "entity with identity '{}' already exists; use update() to modify.",
                identity
            )));
        }
        let document = serde_json::to_string(entity)?;
        let now = Utc::now().to_rfc3339();
        self.connection.execute(
            "INSERT INTO \"Entity\" (identity, document, created, modified) \
             VALUES (?1, ?2, ?3, ?4)",
            params![identity, document, now, now],
        )?;
        info!(identity, "entity stored");
        Ok(())
    }

    /// Fetch an entity by identity.
    pub fn read(&self, identity: &str) -> Result<Option<Entity>> {
        let document: Option<String> = self
            .connection
            .query_row(
                "SELECT document FROM \"Entity\" WHERE identity = ?1",
                params![identity],
                |row| row.get(0),
            )
            .optional()?;
        match document {
            Some(text) => Ok(Some(Entity::from_json(serde_json::from_str(&text)?)?)),
            None => Ok(None),
        }
    }

    /// All stored identities.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut statement = self
            .connection
            .prepare("SELECT identity FROM \"Entity\" ORDER BY identity")?;
        let identities = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(identities)
    }

    /// Replace a stored entity. Refuses an identity that does not exist.
    pub fn update(&self, entity: &Entity) -> Result<()> {
        let identity = entity.identity().iri();
        if !self.contains(identity)? {
            return Err(Soft7Error::EntityNotFound(format!(
                "entity with identity '{}' does not exist; use create() first.",
                identity
            )));
        }
        let document = serde_json::to_string(entity)?;
        self.connection.execute(
            "UPDATE \"Entity\" SET document = ?1, modified = ?2 WHERE identity = ?3",
            params![document, Utc::now().to_rfc3339(), identity],
        )?;
        info!(identity, "entity replaced");
        Ok(())
    }

    pub fn contains(&self, identity: &str) -> Result<bool> {
        let found = self
            .connection
            .query_row(
                "SELECT 1 FROM \"Entity\" WHERE identity = ?1",
                params![identity],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
