//! Shared test doubles

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::fetcher::Fetcher;

/// Fetcher that counts calls and can be told to fail or stall
#[derive(Clone)]
pub struct FakeFetcher {
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    delay: Duration,
    data: Vec<u32>,
}

impl FakeFetcher {
    pub fn new(data: Vec<u32>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
            delay: Duration::ZERO,
            data,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    type Output = Vec<u32>;

    async fn fetch(&self) -> FetchResult<Vec<u32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            Err(FetchError::SourceUnavailable("listing down".to_string()))
        } else {
            Ok(self.data.clone())
        }
    }
}
