//! 缓存队列内存实现

use crate::error::StorageError;
use crate::models::{BufferedEntry, BufferedOperation};
use crate::traits::BufferQueue;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct QueueState {
    next_id: i64,
    entries: VecDeque<BufferedEntry>,
}

#[derive(Default)]
pub struct InMemoryBufferQueue {
    state: Mutex<QueueState>,
}

impl InMemoryBufferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前队列中的操作（按顺序，测试用）。
    pub fn operations(&self) -> Vec<BufferedOperation> {
        self.state
            .lock()
            .map(|s| s.entries.iter().map(|e| e.operation.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl BufferQueue for InMemoryBufferQueue {
    async fn enqueue(&self, operation: &BufferedOperation) -> Result<i64, StorageError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        state.next_id += 1;
        let id = state.next_id;
        state.entries.push_back(BufferedEntry {
            id,
            operation: operation.clone(),
        });
        Ok(id)
    }

    async fn peek_batch(&self, limit: usize) -> Result<Vec<BufferedEntry>, StorageError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(state.entries.iter().take(limit).cloned().collect())
    }

    async fn remove(&self, id: i64) -> Result<(), StorageError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        state.entries.retain(|e| e.id != id);
        Ok(())
    }

    async fn len(&self) -> Result<usize, StorageError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(state.entries.len())
    }
}
