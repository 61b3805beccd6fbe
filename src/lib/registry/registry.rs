use uuid::Uuid;

use super::types::Registry;
use crate::tasks::types::{State, Task};

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &Uuid) -> Option<Task> {
        self.db.read().await.get(id).cloned()
    }

    /// Replaces the whole record for `task.id`, returning the previous one.
    pub async fn put(&self, task: Task) -> Option<Task> {
        self.db.write().await.insert(task.id, task)
    }

    pub async fn list(&self) -> Vec<Task> {
        self.db.read().await.values().cloned().collect()
    }

    pub async fn count_in(&self, state: State) -> usize {
        self.db
            .read()
            .await
            .values()
            .filter(|task| task.state == state)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.db.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.db.read().await.is_empty()
    }
}
