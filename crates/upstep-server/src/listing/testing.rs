//! Scripted listing source for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use upstep_core::{FileInfo, ListingKey};

use super::source::{ListingSource, UpstreamError};

pub(crate) struct FakeSource {
    pub files: Vec<&'static str>,
    pub delay: Duration,
    pub fail: AtomicBool,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
}

impl FakeSource {
    pub fn new(files: &[&'static str]) -> Self {
        Self {
            files: files.to_vec(),
            delay: Duration::ZERO,
            fail: AtomicBool::new(false),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn fetch(&self, key: &ListingKey) -> Result<Vec<FileInfo>, UpstreamError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status { status: 503 });
        }
        Ok(self
            .files
            .iter()
            .map(|f| FileInfo::new(format!("https://files.test/{key}/{f}"), *f))
            .collect())
    }
}
