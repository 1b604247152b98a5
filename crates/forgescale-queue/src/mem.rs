//! In-memory build queue for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{BuildQueue, QueueError, Stage};

/// An in-memory [`BuildQueue`] holding a mutable stage list.
///
/// Tracks pause state and per-operation call counts so tests can assert
/// how the planner and engine drove the port.
#[derive(Default)]
pub struct MemQueue {
    stages: Mutex<Vec<Stage>>,
    paused: AtomicBool,
    fetch_calls: AtomicUsize,
    pause_calls: AtomicUsize,
    resume_calls: AtomicUsize,
}

impl MemQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stages(stages: Vec<Stage>) -> Self {
        let queue = Self::new();
        queue.set_stages(stages);
        queue
    }

    pub fn push(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    pub fn set_stages(&self, stages: Vec<Stage>) {
        *self.stages.lock().unwrap() = stages;
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn pause_calls(&self) -> usize {
        self.pause_calls.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildQueue for MemQueue {
    async fn fetch(&self) -> Result<Vec<Stage>, QueueError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stages.lock().unwrap().clone())
    }

    async fn pause(&self) -> Result<(), QueueError> {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), QueueError> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }
}
