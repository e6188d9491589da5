use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Entity, Repository, RepositoryError};

/// Process-local repository backed by an ordered map.
pub struct InMemoryRepository<E: Entity> {
    records: Arc<Mutex<BTreeMap<E::Key, E>>>,
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl<E: Entity> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<E::Key, E>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))
    }
}

impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    fn fetch(&self, key: &E::Key) -> Result<Option<E>, RepositoryError> {
        let guard = self.records()?;
        Ok(guard.get(key).cloned())
    }

    fn insert(&self, entity: E) -> Result<E, RepositoryError> {
        let mut guard = self.records()?;
        let key = entity.key();
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(key, entity.clone());
        Ok(entity)
    }

    fn update(&self, entity: E) -> Result<(), RepositoryError> {
        let mut guard = self.records()?;
        match guard.get_mut(&entity.key()) {
            Some(slot) => {
                *slot = entity;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete(&self, key: &E::Key) -> Result<E, RepositoryError> {
        let mut guard = self.records()?;
        guard.remove(key).ok_or(RepositoryError::NotFound)
    }

    fn list(&self) -> Result<Vec<E>, RepositoryError> {
        let guard = self.records()?;
        Ok(guard.values().cloned().collect())
    }
}
