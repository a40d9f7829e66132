//! Render task persistence.
//!
//! The pipeline writes every state transition through the repository as
//! it happens, so status pollers observe progress in near real time. The
//! in-memory store backs tests and single-process deployments; a durable
//! backend implements the same trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use reel_models::{RenderTask, TaskId};

use crate::error::StoreError;

/// Persistence seam for render tasks.
#[async_trait]
pub trait RenderTaskRepository: Send + Sync {
    /// Persist a newly created task. Fails if the ID is already taken.
    async fn create(&self, task: &RenderTask) -> Result<(), StoreError>;

    /// Write through the current state of an existing task.
    async fn update(&self, task: &RenderTask) -> Result<(), StoreError>;

    /// Fetch a task by ID.
    async fn get(&self, id: &TaskId) -> Result<Option<RenderTask>, StoreError>;
}

/// In-memory task store keyed by task ID.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, RenderTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl RenderTaskRepository for InMemoryTaskStore {
    async fn create(&self, task: &RenderTask) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists(task.id.to_string()));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &RenderTask) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(task.id.to_string())),
        }
    }

    async fn get(&self, id: &TaskId) -> Result<Option<RenderTask>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(id).cloned())
    }
}
