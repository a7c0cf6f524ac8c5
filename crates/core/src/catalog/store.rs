use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::task;
use uuid::Uuid;

use super::Catalog;
use crate::domain::{Dimensions, Entry, Folder};
use crate::error::{Error, Result};

/// Async handle to the catalog.
///
/// All calls funnel through one lock and run on the blocking pool, so a
/// multi-step operation never interleaves with another caller's. Once
/// dispatched, an operation runs to completion even if the awaiting future
/// is dropped.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Mutex<Catalog>>,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(catalog)),
        }
    }

    pub async fn open(path: PathBuf) -> Result<Self> {
        let catalog = task::spawn_blocking(move || Catalog::open(&path)).await??;
        Ok(Self::new(catalog))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Catalog::open_in_memory()?))
    }

    async fn read<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Catalog) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let catalog = inner.lock().map_err(|_| Error::StorePoisoned)?;
            op(&catalog)
        })
        .await?
    }

    async fn write<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Catalog) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let mut catalog = inner.lock().map_err(|_| Error::StorePoisoned)?;
            op(&mut catalog)
        })
        .await?
    }

    // ── Entries ──────────────────────────────────────────────────────

    pub async fn list_all(&self) -> Result<Vec<Entry>> {
        self.read(|c| c.list_all_entries()).await
    }

    pub async fn list_by_folder(&self, folder_id: Uuid) -> Result<Vec<Entry>> {
        self.read(move |c| c.list_entries_by_folder(folder_id)).await
    }

    pub async fn get_entry(&self, id: Uuid) -> Result<Option<Entry>> {
        self.read(move |c| c.get_entry(id)).await
    }

    pub async fn count_entries(&self) -> Result<usize> {
        self.read(|c| c.count_entries()).await
    }

    pub async fn insert_entry(&self, entry: Entry) -> Result<()> {
        self.write(move |c| c.insert_entry(&entry)).await
    }

    pub async fn delete_entry(&self, id: Uuid) -> Result<Option<Entry>> {
        self.write(move |c| c.delete_entry(id)).await
    }

    pub async fn update_memo(&self, id: Uuid, memo: impl Into<String>) -> Result<Entry> {
        let memo = memo.into();
        self.write(move |c| c.update_memo(id, &memo)).await
    }

    pub async fn move_entry_to_folder(&self, id: Uuid, folder_id: Option<Uuid>) -> Result<Entry> {
        self.write(move |c| c.move_entry_to_folder(id, folder_id)).await
    }

    pub async fn entries_missing_dimensions(&self) -> Result<Vec<Entry>> {
        self.read(|c| c.entries_missing_dimensions()).await
    }

    pub async fn update_dimensions_batch(&self, updates: Vec<(Uuid, Dimensions)>) -> Result<usize> {
        self.write(move |c| c.update_dimensions_batch(&updates)).await
    }

    // ── Folders ──────────────────────────────────────────────────────

    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.read(|c| c.list_folders()).await
    }

    pub async fn get_folder(&self, id: Uuid) -> Result<Option<Folder>> {
        self.read(move |c| c.get_folder(id)).await
    }

    pub async fn add_folder(&self, name: impl Into<String>) -> Result<Folder> {
        let name = name.into();
        self.write(move |c| c.add_folder(&name)).await
    }

    pub async fn rename_folder(&self, id: Uuid, name: impl Into<String>) -> Result<Folder> {
        let name = name.into();
        self.write(move |c| c.rename_folder(id, &name)).await
    }

    pub async fn delete_folder(&self, id: Uuid) -> Result<Option<(Folder, usize)>> {
        self.write(move |c| c.delete_folder(id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[tokio::test]
    async fn test_store_round_trip() {
        let store = CatalogStore::open_in_memory().unwrap();
        let entry = Entry::new("a.jpg", "first");
        store.insert_entry(entry.clone()).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![entry.clone()]);

        let updated = store.update_memo(entry.id, "second").await.unwrap();
        assert_eq!(updated.memo, "second");
        assert!(updated.updated_at >= entry.updated_at);
    }

    #[tokio::test]
    async fn test_store_delete_twice() {
        let store = CatalogStore::open_in_memory().unwrap();
        let entry = Entry::new("a.jpg", "");
        store.insert_entry(entry.clone()).await.unwrap();
        assert!(store.delete_entry(entry.id).await.unwrap().is_some());
        assert!(store.delete_entry(entry.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_folder_yields_distinct_orders() {
        let store = CatalogStore::open_in_memory().unwrap();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.add_folder(format!("F{i}")).await })
            })
            .collect();

        let mut orders = HashSet::new();
        for handle in handles {
            let folder = handle.await.unwrap().unwrap();
            orders.insert(folder.sort_order);
        }
        assert_eq!(orders, (1..=16).collect::<HashSet<i64>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_move_and_folder_delete_never_dangles() {
        let store = CatalogStore::open_in_memory().unwrap();
        let folder = store.add_folder("Target").await.unwrap();
        let mut ids = Vec::new();
        for i in 0..20 {
            let mut entry = Entry::new(format!("{i}.jpg"), "");
            entry.folder_id = Some(folder.id);
            ids.push(entry.id);
            store.insert_entry(entry).await.unwrap();
        }

        let deleter = {
            let store = store.clone();
            tokio::spawn(async move { store.delete_folder(folder.id).await })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.list_by_folder(folder.id).await })
            })
            .collect();

        deleter.await.unwrap().unwrap();
        for reader in readers {
            let seen = reader.await.unwrap().unwrap();
            // A reader sees either the whole folder or none of it.
            assert!(seen.is_empty() || seen.len() == 20);
        }
        assert!(store.list_by_folder(folder.id).await.unwrap().is_empty());
        for id in ids {
            assert!(store.get_entry(id).await.unwrap().unwrap().folder_id.is_none());
        }
    }

    #[tokio::test]
    async fn test_store_not_found_errors() {
        let store = CatalogStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        assert!(store.update_memo(id, "x").await.unwrap_err().is_not_found());
        assert!(store.rename_folder(id, "x").await.unwrap_err().is_not_found());
        assert!(store.delete_folder(id).await.unwrap().is_none());
    }
}
