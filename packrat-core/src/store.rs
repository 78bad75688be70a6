//! Card collection storage.
//!
//! The store is the single source of truth for what a user owns. Nothing is
//! cached in-process; every [`CollectionStore::load`] goes back to storage.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use derive_more::{Display, Error, From};

use packrat_model::{UserId, collection::UserCollection};

use tokio::{fs, io::AsyncWriteExt as _};

use crate::sync::KeyedLocks;

/// Durable, per-user collection storage.
pub trait CollectionStore: Send + Sync {
    /// Loads a user's collection.
    ///
    /// Never fails: missing or unreadable records come back as an empty
    /// collection, and the problem is logged.
    fn load(&self, user_id: UserId) -> impl Future<Output = UserCollection> + Send;

    /// Persists a collection, replacing the previous record for its user.
    fn save(
        &self,
        collection: &UserCollection,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes every record of a user. Deleting a missing user succeeds.
    fn delete(&self, user_id: UserId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A storage error.
#[derive(Debug, Display, Error, From)]
pub enum StoreError {
    #[display("storage io failed: {_0}")]
    Io(std::io::Error),
    #[display("failed to serialize collection: {_0}")]
    Json(serde_json::Error),
}

/// Stores each collection as a pretty-printed JSON file named after the user.
///
/// Writes land in a temporary sibling first and are renamed over the record,
/// so a concurrent load sees either the old or the new record, never half of
/// one.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    writes: KeyedLocks<UserId>,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<FileStore, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        Ok(FileStore {
            dir,
            writes: KeyedLocks::new(),
        })
    }

    /// The directory the store writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The record path of a user.
    pub fn path(&self, user_id: UserId) -> PathBuf {
        self.dir.join(format!("{}.json", user_id))
    }

    async fn read(&self, user_id: UserId) -> Result<Option<UserCollection>, StoreError> {
        let json = match fs::read_to_string(self.path(user_id)).await {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_str(&json)?))
    }
}

impl CollectionStore for FileStore {
    async fn load(&self, user_id: UserId) -> UserCollection {
        match self.read(user_id).await {
            Ok(Some(mut collection)) => {
                if collection.user_id != user_id {
                    tracing::warn!(
                        %user_id,
                        found = %collection.user_id,
                        "record belongs to another user, rekeying"
                    );
                    collection.user_id = user_id;
                }
                collection
            }
            Ok(None) => UserCollection::new(user_id),
            Err(err) => {
                tracing::error!(%user_id, %err, "failed to load collection, using empty");
                UserCollection::new(user_id)
            }
        }
    }

    async fn save(&self, collection: &UserCollection) -> Result<(), StoreError> {
        let user_id = collection.user_id;
        let json = serde_json::to_string_pretty(collection)?;

        let path = self.path(user_id);
        let tmp = path.with_extension("json.tmp");

        let _guard = self.writes.lock(user_id).await;

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &path).await?;

        tracing::debug!(%user_id, cards = collection.cards.len(), "saved collection");

        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        let _guard = self.writes.lock(user_id).await;

        match fs::remove_file(self.path(user_id)).await {
            Ok(()) => {
                tracing::info!(%user_id, "deleted collection");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps collections in memory.
///
/// Counts writes, which makes it handy for checking that an operation did or
/// did not persist anything.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<UserId, UserCollection>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// How many saves and deletes have gone through the store.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CollectionStore for MemoryStore {
    async fn load(&self, user_id: UserId) -> UserCollection {
        self.collections
            .get(&user_id)
            .map(|collection| collection.clone())
            .unwrap_or_else(|| UserCollection::new(user_id))
    }

    async fn save(&self, collection: &UserCollection) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.collections
            .insert(collection.user_id, collection.clone());
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.collections.remove(&user_id);
        Ok(())
    }
}
