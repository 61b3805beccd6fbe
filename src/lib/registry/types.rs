use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::tasks::types::Task;

/// Last known record of every task, keyed by id.
///
/// Clones share the same map, so several workers can report into one
/// registry. Reads run concurrently; writes are exclusive.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub(super) db: Arc<RwLock<HashMap<Uuid, Task>>>,
}
