use tokio::sync::oneshot;

use crate::foundation::error::{PackError, PackResult};

/// Dedicated thread pool for CPU-bound rendering steps.
///
/// Async task bodies hand work over with [`RenderWorkers::run`] and suspend until the reply
/// arrives, so tokio workers are never blocked by rasterization or compositing.
pub struct RenderWorkers {
    pool: rayon::ThreadPool,
}

impl RenderWorkers {
    /// `threads = None` uses rayon's default (one per core).
    pub fn new(threads: Option<usize>) -> PackResult<Self> {
        // Without a handler rayon aborts the process on a panicking job.
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("texgraph-render-{i}"))
            .panic_handler(|_| tracing::error!("render job panicked"));
        if let Some(n) = threads {
            builder = builder.num_threads(n.max(1));
        }
        let pool = builder
            .build()
            .map_err(|e| PackError::render(format!("build render pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool and await its result.
    pub async fn run<R, F>(&self, job: F) -> PackResult<R>
    where
        R: Send + 'static,
        F: FnOnce() -> PackResult<R> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let _ = tx.send(job());
        });
        rx.await
            .map_err(|_| PackError::render("render job panicked or was dropped"))?
    }

    /// Run a blocking closure inside the pool, for data-parallel work on the calling thread.
    pub fn install<R: Send>(&self, job: impl FnOnce() -> R + Send) -> R {
        self.pool.install(job)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/workers.rs"]
mod tests;
