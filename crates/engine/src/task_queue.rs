// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO pull-queue with a pending-set for tasks a worker has pulled but
//! not yet resolved.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use wfe_core::{Task, TaskId, WorkflowId};

#[derive(Default)]
struct Inner {
    ready: VecDeque<Task>,
    pending: HashMap<TaskId, Task>,
    next_task_seq: u64,
}

/// Single-writer owner of the ready/pending task state.
#[derive(Default)]
pub struct TaskQueue {
    inner: Mutex<Inner>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(
        &self,
        workflow_id: WorkflowId,
        step: impl Into<String>,
        attempt: u32,
        priority: i32,
        enqueued_at: u64,
    ) -> TaskId {
        let mut inner = self.inner.lock();
        inner.next_task_seq += 1;
        let task_id = TaskId::new(format!("task-{}", inner.next_task_seq));
        inner.ready.push_back(Task {
            task_id: task_id.clone(),
            workflow_id,
            step: step.into(),
            attempt,
            priority,
            enqueued_at,
        });
        task_id
    }

    /// Remove and return the head of the ready queue, moving it to pending.
    pub fn pull(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        let task = inner.ready.pop_front()?;
        inner.pending.insert(task.task_id.clone(), task.clone());
        Some(task)
    }

    pub fn complete(&self, task_id: &TaskId) {
        self.inner.lock().pending.remove(task_id);
    }

    /// Pop a pulled-but-unresolved task from pending, bump its attempt, and
    /// push it back onto the tail of the ready queue. Used when a lease
    /// acquisition fails after a successful pull, or when a worker goes
    /// silent past its timeout.
    pub fn requeue(&self, task_id: &TaskId) -> Option<Task> {
        let mut inner = self.inner.lock();
        let mut task = inner.pending.remove(task_id)?;
        task.attempt += 1;
        inner.ready.push_back(task.clone());
        Some(task)
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().ready.len()
    }

    pub fn list_pending(&self) -> Vec<Task> {
        self.inner.lock().pending.values().cloned().collect()
    }
}
