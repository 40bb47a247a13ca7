//! Image Decode Worker Pool.
//!
//! A fixed pool of OS threads decode images off the main thread. The main
//! thread never awaits mid-frame: it submits requests and
//! polls [`ImageWorkerPool::poll_completed`] once per tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::platform::{DecodeOptions, DecodedBitmap, Platform};

/// What a decode request supplies: either a URL to fetch-then-decode, or
/// already-fetched bytes to decode directly.
pub enum ImageSource {
    Url(String),
    Bytes(Vec<u8>),
}

struct Request {
    id: u64,
    source: ImageSource,
    options: DecodeOptions,
}

pub struct ImageWorkerError {
    pub request_id: u64,
    pub message: String,
}

pub enum WorkerResult {
    Ok { request_id: u64, bitmap: DecodedBitmap },
    Err(ImageWorkerError),
}

enum RoutedMessage {
    Request(Request),
    Shutdown,
}

/// Capability flags negotiated at construction: which
/// decode paths a worker supports. Every worker here shares the same
/// `Platform`, so the flags are uniform, but the pool still threads them
/// through the request so future heterogeneous pools can specialize.
#[derive(Debug, Clone, Copy)]
pub struct DecoderCapabilities {
    pub supports_options: bool,
    pub supports_clip: bool,
}

struct Worker {
    handle: Option<JoinHandle<()>>,
    sender: Sender<RoutedMessage>,
    /// Outstanding (submitted but not yet completed) request count, used for
    /// least-loaded routing.
    outstanding: Arc<AtomicU64>,
}

/// A fixed-size pool of decode worker threads.
pub struct ImageWorkerPool {
    workers: Vec<Worker>,
    completed_rx: Receiver<WorkerResult>,
    next_request_id: AtomicU64,
    capabilities: DecoderCapabilities,
}

impl ImageWorkerPool {
    pub fn new(num_workers: usize, platform: Arc<dyn Platform>) -> Self {
        let num_workers = num_workers.max(1);
        let (completed_tx, completed_rx) = channel::<WorkerResult>();
        let mut workers = Vec::with_capacity(num_workers);

        for index in 0..num_workers {
            let (req_tx, req_rx) = channel::<RoutedMessage>();
            let outstanding = Arc::new(AtomicU64::new(0));
            let worker_outstanding = outstanding.clone();
            let worker_platform = platform.clone();
            let worker_completed_tx = completed_tx.clone();

            let handle = std::thread::Builder::new()
                .name(format!("tvscene-image-worker-{index}"))
                .spawn(move || {
                    for message in req_rx {
                        let request = match message {
                            RoutedMessage::Request(r) => r,
                            RoutedMessage::Shutdown => break,
                        };
                        let result = decode_one(worker_platform.as_ref(), &request);
                        worker_outstanding.fetch_sub(1, Ordering::SeqCst);
                        // The receiving end may already be gone if the pool was
                        // dropped mid-flight; a dropped result is harmless.
                        let _ = worker_completed_tx.send(result);
                    }
                })
                .expect("failed to spawn image decode worker thread");

            workers.push(Worker { handle: Some(handle), sender: req_tx, outstanding });
        }

        ImageWorkerPool {
            workers,
            completed_rx,
            next_request_id: AtomicU64::new(1),
            capabilities: DecoderCapabilities { supports_options: true, supports_clip: true },
        }
    }

    pub fn capabilities(&self) -> DecoderCapabilities {
        self.capabilities
    }

    /// Submits a decode request, routed to the least-loaded worker by
    /// outstanding count, and returns its `request_id`.
    pub fn submit(&self, source: ImageSource, options: DecodeOptions) -> u64 {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let worker = self
            .workers
            .iter()
            .min_by_key(|w| w.outstanding.load(Ordering::SeqCst))
            .expect("pool has at least one worker");
        worker.outstanding.fetch_add(1, Ordering::SeqCst);
        // A send only fails if the worker thread panicked and dropped its
        // receiver; the outstanding counter is left incremented so the
        // caller observes a permanently-loaded worker rather than silently
        // losing the request count.
        let _ = worker.sender.send(RoutedMessage::Request(Request { id, source, options }));
        id
    }

    /// Drains every decode that finished since the last call. Called once
    /// per frame tick; never blocks.
    pub fn poll_completed(&self) -> Vec<WorkerResult> {
        self.completed_rx.try_iter().collect()
    }
}

impl Drop for ImageWorkerPool {
    fn drop(&mut self) {
        for worker in &self.workers {
            let _ = worker.sender.send(RoutedMessage::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn decode_one(platform: &dyn Platform, request: &Request) -> WorkerResult {
    let bytes = match &request.source {
        ImageSource::Bytes(b) => Ok(b.clone()),
        ImageSource::Url(url) => platform.fetch_bytes(url),
    };

    let bytes = match bytes {
        Ok(b) => b,
        Err(e) => return WorkerResult::Err(ImageWorkerError { request_id: request.id, message: e.to_string() }),
    };

    match platform.decode_blob(&bytes, request.options) {
        Ok(bitmap) => WorkerResult::Ok { request_id: request.id, bitmap },
        Err(e) => WorkerResult::Err(ImageWorkerError { request_id: request.id, message: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NullPlatform;
    use std::time::{Duration, Instant};

    fn rgba_bytes(pixels: usize) -> Vec<u8> {
        vec![255u8; pixels * 4]
    }

    fn wait_for(pool: &ImageWorkerPool, count: usize) -> Vec<WorkerResult> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut results = Vec::new();
        while results.len() < count && Instant::now() < deadline {
            results.extend(pool.poll_completed());
            if results.len() < count {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        results
    }

    #[test]
    fn submitted_request_completes_and_reports_request_id() {
        let pool = ImageWorkerPool::new(2, Arc::new(NullPlatform::default()));
        let id = pool.submit(ImageSource::Bytes(rgba_bytes(4)), DecodeOptions::default());
        let results = wait_for(&pool, 1);
        assert_eq!(results.len(), 1);
        match &results[0] {
            WorkerResult::Ok { request_id, bitmap } => {
                assert_eq!(*request_id, id);
                assert_eq!(bitmap.rgba8.len(), 16);
            }
            WorkerResult::Err(e) => panic!("expected Ok, got {}", e.message),
        }
    }

    #[test]
    fn decode_failure_is_reported_with_request_id() {
        let pool = ImageWorkerPool::new(1, Arc::new(NullPlatform::default()));
        // Odd byte length isn't a multiple of 4: NullPlatform rejects it.
        let id = pool.submit(ImageSource::Bytes(vec![1, 2, 3]), DecodeOptions::default());
        let results = wait_for(&pool, 1);
        assert_eq!(results.len(), 1);
        match &results[0] {
            WorkerResult::Err(e) => assert_eq!(e.request_id, id),
            WorkerResult::Ok { .. } => panic!("expected a decode error"),
        }
    }

    #[test]
    fn requests_distribute_across_workers() {
        let pool = ImageWorkerPool::new(4, Arc::new(NullPlatform::default()));
        for _ in 0..8 {
            pool.submit(ImageSource::Bytes(rgba_bytes(1)), DecodeOptions::default());
        }
        let results = wait_for(&pool, 8);
        assert_eq!(results.len(), 8);
    }
}
