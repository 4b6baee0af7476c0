use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

use image::RgbaImage;

use crate::error::{FilmError, Result};
use crate::processing::{PipelineOptions, transform_seeded};
use crate::state::FilmParameters;

struct RenderJob {
    generation: u64,
    source: Arc<RgbaImage>,
    params: FilmParameters,
    options: PipelineOptions,
    seed: u64,
    reply: mpsc::SyncSender<Result<RgbaImage>>,
}

/// Pending result of one submitted render.
pub struct RenderHandle {
    generation: u64,
    rx: mpsc::Receiver<Result<RgbaImage>>,
}

impl RenderHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the result if the render has finished, without blocking.
    ///
    /// A job that was dropped in favour of a newer one yields
    /// [`FilmError::Superseded`].
    pub fn try_take(&self) -> Option<Result<RgbaImage>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(FilmError::Superseded)),
        }
    }

    /// Blocks until the render finishes or is superseded.
    pub fn wait(self) -> Result<RgbaImage> {
        self.rx.recv().unwrap_or(Err(FilmError::Superseded))
    }
}

/// Single background thread that renders previews off the caller's thread.
///
/// Requests queue up while a render runs; when the thread gets to them it
/// only renders the newest and drops the rest.
pub struct PreviewWorker {
    tx: Option<mpsc::Sender<RenderJob>>,
    thread: Option<JoinHandle<()>>,
}

impl PreviewWorker {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::spawn(move || run(rx));
        Self {
            tx: Some(tx),
            thread: Some(thread),
        }
    }

    pub fn submit(
        &self,
        generation: u64,
        source: Arc<RgbaImage>,
        params: FilmParameters,
        options: PipelineOptions,
        seed: u64,
    ) -> RenderHandle {
        let (reply, rx) = mpsc::sync_channel(1);
        let job = RenderJob {
            generation,
            source,
            params,
            options,
            seed,
            reply,
        };
        if let Some(tx) = self.tx.as_ref() {
            if tx.send(job).is_err() {
                tracing::warn!(generation, "preview worker is gone, render dropped");
            }
        }
        RenderHandle { generation, rx }
    }
}

impl Drop for PreviewWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(rx: mpsc::Receiver<RenderJob>) {
    while let Ok(mut job) = rx.recv() {
        let mut skipped = 0usize;
        while let Ok(newer) = rx.try_recv() {
            job = newer;
            skipped += 1;
        }
        if skipped > 0 {
            tracing::debug!(skipped, generation = job.generation, "coalesced preview requests");
        }
        let result = transform_seeded(&job.source, &job.params, &job.options, job.seed);
        // The receiver may already be gone if the session moved on.
        let _ = job.reply.send(result);
    }
}
