//! Scripted in-memory transport shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use vaimm::error::FetchError;
use vaimm::fetch::{DownloadTask, ResponseBody, RetryPolicy, Transport};

pub const PREFIX: &str = "https://cdn.test/";

/// What the mock answers to one GET
#[derive(Debug, Clone)]
pub enum Reply {
    /// Full body, advertised length, split into `chunks` pieces
    Body { data: Vec<u8>, chunks: usize },
    /// Advertises `advertised` bytes but sends only `data`
    Truncated { data: Vec<u8>, advertised: u64 },
    Status { status: u16, retry_after: Option<Duration> },
    /// Full body, first byte after `delay`
    Slow { data: Vec<u8>, delay: Duration },
    /// Sends `data`, then the connection drops
    Reset { data: Vec<u8> },
    /// Sends `data`, then never finishes
    Hang { data: Vec<u8> },
}

impl Reply {
    pub fn ok(data: &[u8]) -> Self {
        Self::Body {
            data: data.to_vec(),
            chunks: 1,
        }
    }

    pub fn status(status: u16) -> Self {
        Self::Status {
            status,
            retry_after: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Transport answering from per-URL scripts; unscripted URLs get `fallback`
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
    chunk_delay: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    counters: Arc<Counters>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Reply::ok(b"model-bytes"),
            chunk_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Queue replies for `file`, consumed one per request
    pub fn script(self, file: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(format!("{PREFIX}{file}"), replies.into());
        self
    }

    pub fn calls_for(&self, file: &str) -> Vec<Instant> {
        let url = format!("{PREFIX}{file}");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| *called == url)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<Box<dyn ResponseBody>, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());

        let mut first_delay = Duration::ZERO;
        let (data, chunks, advertised, ending) = match reply {
            Reply::Status {
                status,
                retry_after,
            } => {
                return Err(FetchError::Status {
                    status,
                    retry_after,
                })
            }
            Reply::Body { data, chunks } => {
                let len = data.len() as u64;
                (data, chunks, Some(len), Ending::Done)
            }
            Reply::Slow { data, delay } => {
                first_delay = delay;
                let len = data.len() as u64;
                (data, 1, Some(len), Ending::Done)
            }
            Reply::Truncated { data, advertised } => (data, 1, Some(advertised), Ending::Done),
            Reply::Reset { data } => (data, 1, None, Ending::Reset),
            Reply::Hang { data } => (data, 1, None, Ending::Hang),
        };

        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let size = data.len().div_ceil(chunks.max(1)).max(1);
        let pieces = data.chunks(size).map(Bytes::copy_from_slice).collect();

        Ok(Box::new(MockBody {
            pieces,
            advertised,
            ending,
            first_delay,
            delay: self.chunk_delay,
            counters: Arc::clone(&self.counters),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Ending {
    Done,
    Reset,
    Hang,
}

struct MockBody {
    pieces: VecDeque<Bytes>,
    advertised: Option<u64>,
    ending: Ending,
    first_delay: Duration,
    delay: Duration,
    counters: Arc<Counters>,
}

impl Drop for MockBody {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResponseBody for MockBody {
    fn content_length(&self) -> Option<u64> {
        self.advertised
    }

    async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        let first_delay = std::mem::take(&mut self.first_delay);
        if !first_delay.is_zero() {
            tokio::time::sleep(first_delay).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(piece) = self.pieces.pop_front() {
            return Ok(Some(piece));
        }
        match self.ending {
            Ending::Done => Ok(None),
            Ending::Reset => Err(FetchError::Transport("connection reset".to_string())),
            Ending::Hang => {
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }
}

/// Retry policy with millisecond waits
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        initial_wait: Duration::from_millis(1),
        backoff_factor: 2,
        max_attempts,
    }
}

pub fn tasks(root: &Path, files: &[&str]) -> Vec<DownloadTask> {
    files
        .iter()
        .map(|file| DownloadTask::new(PREFIX, root.join(file)))
        .collect()
}
