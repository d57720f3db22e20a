//! Background thread for backend calls and image decoding.
//!
//! The UI thread sends [`Request`]s and polls [`Response`]s once per frame.
//! Requests run one at a time in the order they were sent.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbaImage;

use crate::backend::{add_class_idempotent, Backend};
use crate::error::{AnnotateError, Result};
use crate::session::SaveRequest;

/// Work for the background thread.
#[derive(Debug, Clone)]
pub enum Request {
    FetchClasses,
    AddClass(String),
    /// Upload the file, then decode it locally.
    Upload(PathBuf),
    /// Save a snapshot taken at store revision `revision`.
    Save { request: SaveRequest, revision: u64 },
}

/// Result of a [`Request`]. An upload produces `Uploaded` and, if that
/// succeeded, `Decoded`.
#[derive(Debug)]
pub enum Response {
    Classes(Result<Vec<String>>),
    ClassAdded {
        name: String,
        result: Result<Vec<String>>,
    },
    Uploaded {
        path: PathBuf,
        result: Result<String>,
    },
    Decoded {
        filename: String,
        result: Result<RgbaImage>,
    },
    Saved {
        filename: String,
        revision: u64,
        result: Result<()>,
    },
}

enum ThreadMessage {
    Work(Request),
    Shutdown,
}

pub struct BackendWorker {
    request_tx: Sender<ThreadMessage>,
    response_rx: Receiver<Response>,
    thread_handle: Option<JoinHandle<()>>,
    in_flight: usize,
}

impl BackendWorker {
    /// Spawn the worker thread. `notify` runs after each response is queued,
    /// typically to request a repaint.
    pub fn spawn(
        backend: Box<dyn Backend + Send>,
        notify: impl Fn() + Send + 'static,
    ) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (response_tx, response_rx) = mpsc::channel::<Response>();

        let thread_handle = thread::Builder::new()
            .name("backend-worker".to_string())
            .spawn(move || {
                log::info!("Backend worker thread started");
                Self::thread_loop(backend.as_ref(), request_rx, response_tx, notify);
                log::info!("Backend worker thread exiting");
            })?;

        Ok(Self {
            request_tx,
            response_rx,
            thread_handle: Some(thread_handle),
            in_flight: 0,
        })
    }

    fn thread_loop(
        backend: &dyn Backend,
        request_rx: Receiver<ThreadMessage>,
        response_tx: Sender<Response>,
        notify: impl Fn(),
    ) {
        while let Ok(ThreadMessage::Work(request)) = request_rx.recv() {
            for response in Self::execute(backend, request) {
                if response_tx.send(response).is_err() {
                    log::warn!("Response channel closed, backend worker exiting");
                    return;
                }
                notify();
            }
        }
    }

    fn execute(backend: &dyn Backend, request: Request) -> Vec<Response> {
        match request {
            Request::FetchClasses => vec![Response::Classes(backend.fetch_classes())],
            Request::AddClass(name) => {
                let result = add_class_idempotent(backend, &name);
                vec![Response::ClassAdded { name, result }]
            }
            Request::Upload(path) => Self::upload(backend, path),
            Request::Save { request, revision } => {
                let result = backend.save_annotations(&request);
                vec![Response::Saved {
                    filename: request.filename,
                    revision,
                    result,
                }]
            }
        }
    }

    fn upload(backend: &dyn Backend, path: PathBuf) -> Vec<Response> {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return vec![Response::Uploaded {
                    path,
                    result: Err(e.into()),
                }]
            }
        };

        let file_name = upload_file_name(&path);
        let filename = match backend.upload(&file_name, bytes.clone()) {
            Ok(filename) => filename,
            Err(e) => return vec![Response::Uploaded { path, result: Err(e) }],
        };

        let decoded = image::load_from_memory(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(AnnotateError::from);
        vec![
            Response::Uploaded {
                path,
                result: Ok(filename.clone()),
            },
            Response::Decoded {
                filename,
                result: decoded,
            },
        ]
    }

    pub fn send(&mut self, request: Request) -> Result<()> {
        log::debug!("Queueing {:?}", RequestSummary(&request));
        self.request_tx
            .send(ThreadMessage::Work(request))
            .map_err(|_| AnnotateError::WorkerStopped)?;
        self.in_flight += 1;
        Ok(())
    }

    /// Next finished response, if any. Never blocks.
    pub fn try_recv(&mut self) -> Option<Response> {
        match self.response_rx.try_recv() {
            Ok(response) => {
                self.note_received(&response);
                Some(response)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("Backend worker disconnected");
                None
            }
        }
    }

    /// Blocking receive with a timeout.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Response> {
        let response = self.response_rx.recv_timeout(timeout).ok()?;
        self.note_received(&response);
        Some(response)
    }

    fn note_received(&mut self, response: &Response) {
        // An upload's `Uploaded` is followed by `Decoded` unless it failed.
        let finishes_request = match response {
            Response::Uploaded { result, .. } => result.is_err(),
            _ => true,
        };
        if finishes_request {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
    }

    /// Whether any request is still running or queued.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }
}

impl Drop for BackendWorker {
    fn drop(&mut self) {
        let _ = self.request_tx.send(ThreadMessage::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            // A blocking HTTP call may still be running; don't hang the UI on exit.
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string()
}

/// Debug view of a request without the box payload.
struct RequestSummary<'a>(&'a Request);

impl std::fmt::Debug for RequestSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Request::FetchClasses => write!(f, "FetchClasses"),
            Request::AddClass(name) => write!(f, "AddClass({:?})", name),
            Request::Upload(path) => write!(f, "Upload({})", path.display()),
            Request::Save { request, revision } => write!(
                f,
                "Save({}, {} boxes, rev {})",
                request.filename,
                request.boxes.len(),
                revision
            ),
        }
    }
}
