//! Background loader thread.
//!
//! File resolution, reading, decoding and LUT building run here so the
//! render thread only does GPU work. The loader never touches textures.
//!
//! A shared "latest generation" counter lets the loader skip requests that
//! were superseded while queued, once before file I/O and once before
//! handing the result back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

use vrdf_io::VolumeLocator;

use crate::messages::{DecodedVolume, Generation, LoaderEvent, LoaderMsg};
use crate::{DvrError, DvrResult};

/// Worker side of the loader.
pub struct LoaderHandler {
    rx: Receiver<LoaderMsg>,
    tx: Sender<LoaderEvent>,
    latest: Arc<AtomicU64>,
    locator: VolumeLocator,
}

impl LoaderHandler {
    /// Creates a new handler.
    pub fn new(
        rx: Receiver<LoaderMsg>,
        tx: Sender<LoaderEvent>,
        latest: Arc<AtomicU64>,
        locator: VolumeLocator,
    ) -> Self {
        Self { rx, tx, latest, locator }
    }

    /// Main event loop.
    pub fn run(self) {
        while let Ok(msg) = self.rx.recv() {
            match msg {
                LoaderMsg::Close => break,
                LoaderMsg::Load { generation, code } => self.load(generation, code),
            }
        }
        debug!("loader shutdown");
    }

    fn is_stale(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::Acquire) != generation
    }

    fn load(&self, generation: Generation, code: String) {
        if self.is_stale(generation) {
            trace!("skipping superseded request '{code}' (gen {generation})");
            return;
        }

        let Some(hit) = self.locator.resolve(&code) else {
            self.send(LoaderEvent::NotFound { generation, code });
            return;
        };

        if self.is_stale(generation) {
            trace!("skipping superseded request '{code}' before read");
            return;
        }

        debug!("loading '{code}' from {}", hit.path.display());
        let event = match DecodedVolume::decode(hit.path) {
            Ok(volume) => LoaderEvent::Decoded {
                generation,
                code,
                volume: Box::new(volume),
            },
            Err(error) => LoaderEvent::Failed { generation, code, error },
        };

        if self.is_stale(generation) {
            trace!("dropping superseded result (gen {generation})");
            return;
        }
        self.send(event);
    }

    fn send(&self, event: LoaderEvent) {
        let _ = self.tx.send(event);
    }
}

/// Controller side of the loader.
pub struct LoaderHandle {
    tx: Sender<LoaderMsg>,
    rx: Receiver<LoaderEvent>,
    latest: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl LoaderHandle {
    /// Starts the loader thread.
    pub fn spawn(locator: VolumeLocator) -> DvrResult<Self> {
        let (msg_tx, msg_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));
        let handler = LoaderHandler::new(msg_rx, event_tx, Arc::clone(&latest), locator);

        let thread = thread::Builder::new()
            .name("vrdf-loader".into())
            .spawn(move || handler.run())
            .map_err(|e| {
                warn!("cannot start loader thread: {e}");
                DvrError::LoaderGone
            })?;

        Ok(Self {
            tx: msg_tx,
            rx: event_rx,
            latest,
            thread: Some(thread),
        })
    }

    /// Queues a request, superseding all earlier ones.
    pub fn request(&self, generation: Generation, code: &str) -> DvrResult<()> {
        self.latest.store(generation, Ordering::Release);
        self.tx
            .send(LoaderMsg::Load {
                generation,
                code: code.to_string(),
            })
            .map_err(|_| DvrError::LoaderGone)
    }

    /// Marks every queued request stale without sending a new one.
    pub fn cancel(&self, generation: Generation) {
        self.latest.store(generation, Ordering::Release);
    }

    /// Next finished event, if any.
    pub fn try_recv(&self) -> DvrResult<Option<LoaderEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DvrError::LoaderGone),
        }
    }

    /// Blocks for the next event.
    pub fn recv(&self) -> DvrResult<LoaderEvent> {
        self.rx.recv().map_err(|_| DvrError::LoaderGone)
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(LoaderMsg::Close);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
