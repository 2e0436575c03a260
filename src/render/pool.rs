use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::foundation::error::{PackError, PackResult};
use crate::render::image::{RasterImage, byte_len};

/// Pool configuration for scratch surfaces.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoolOpts {
    /// Maximum surfaces checked out at once. `acquire` waits beyond this.
    pub max_checked_out: usize,
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained surfaces per (w,h) bucket.
    pub max_surfaces_per_bucket: usize,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self {
            max_checked_out: 64,
            max_pool_bytes: 64 * 1024 * 1024,
            max_surfaces_per_bucket: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SurfaceKey {
    w: u32,
    h: u32,
}

impl SurfaceKey {
    fn byte_len(self) -> usize {
        (self.w as usize)
            .saturating_mul(self.h as usize)
            .saturating_mul(4)
    }
}

/// Counters describing pool behavior.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SurfacePoolStats {
    /// Surfaces currently held in buckets.
    pub retained_surfaces: usize,
    /// Bytes currently held in buckets.
    pub retained_bytes: usize,
    /// Surfaces currently checked out.
    pub checked_out: usize,
    /// Highest simultaneous checkout count seen.
    pub peak_checked_out: usize,
    /// Fresh allocations.
    pub alloc_surfaces: u64,
    /// Bytes of fresh allocations.
    pub alloc_bytes: u64,
    /// Checkouts served from a bucket.
    pub reused_surfaces: u64,
    /// Releases discarded because a cap was hit.
    pub dropped_on_release: u64,
}

struct Bucket {
    surfaces: Vec<Vec<u8>>,
}

struct PoolInner {
    opts: SurfacePoolOpts,
    stats: SurfacePoolStats,

    bucket_idx_by_key: HashMap<SurfaceKey, usize>,
    buckets: Vec<Bucket>,
}

impl PoolInner {
    fn borrow(&mut self, key: SurfaceKey) -> Vec<u8> {
        self.stats.checked_out += 1;
        self.stats.peak_checked_out = self.stats.peak_checked_out.max(self.stats.checked_out);

        if let Some(&bi) = self.bucket_idx_by_key.get(&key)
            && let Some(buf) = self.buckets[bi].surfaces.pop()
        {
            self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
            self.stats.reused_surfaces = self.stats.reused_surfaces.saturating_add(1);
            return buf;
        }

        self.stats.alloc_surfaces = self.stats.alloc_surfaces.saturating_add(1);
        self.stats.alloc_bytes = self.stats.alloc_bytes.saturating_add(key.byte_len() as u64);
        vec![0u8; key.byte_len()]
    }

    fn release(&mut self, key: SurfaceKey, buf: Vec<u8>) {
        self.stats.checked_out = self.stats.checked_out.saturating_sub(1);

        if self.opts.max_pool_bytes == 0 || self.opts.max_surfaces_per_bucket == 0 {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bytes = key.byte_len();
        if buf.len() != bytes
            || self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bi = match self.bucket_idx_by_key.get(&key).copied() {
            Some(i) => i,
            None => {
                let i = self.buckets.len();
                self.buckets.push(Bucket {
                    surfaces: Vec::new(),
                });
                self.bucket_idx_by_key.insert(key, i);
                i
            }
        };

        let bucket = &mut self.buckets[bi];
        if bucket.surfaces.len() >= self.opts.max_surfaces_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.surfaces.push(buf);
        self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}

/// Bounded pool of scratch RGBA8 buffers used by compositing steps.
///
/// Keyed by `(width, height)`. At most `max_checked_out` surfaces exist outside the pool at once;
/// further `acquire` calls suspend until one is dropped.
#[derive(Clone)]
pub struct SurfacePool {
    permits: Arc<Semaphore>,
    inner: Arc<Mutex<PoolInner>>,
}

impl SurfacePool {
    pub fn new(opts: SurfacePoolOpts) -> Self {
        let opts = SurfacePoolOpts {
            max_checked_out: opts.max_checked_out.max(1),
            ..opts
        };
        Self {
            permits: Arc::new(Semaphore::new(opts.max_checked_out)),
            inner: Arc::new(Mutex::new(PoolInner {
                opts,
                stats: SurfacePoolStats::default(),
                bucket_idx_by_key: HashMap::new(),
                buckets: Vec::new(),
            })),
        }
    }

    pub fn stats(&self) -> SurfacePoolStats {
        self.inner.lock().stats.clone()
    }

    /// Check out a `width x height` surface. Contents are unspecified.
    pub async fn acquire(&self, width: u32, height: u32) -> PackResult<Surface> {
        byte_len(width, height)?;
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PackError::render("surface pool closed"))?;

        let key = SurfaceKey {
            w: width,
            h: height,
        };
        let buf = self.inner.lock().borrow(key);
        Ok(Surface {
            key,
            buf,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

/// A checked-out scratch buffer. Returns to its pool when dropped.
pub struct Surface {
    key: SurfaceKey,
    buf: Vec<u8>,
    pool: Arc<Mutex<PoolInner>>,
    _permit: OwnedSemaphorePermit,
}

impl Surface {
    pub fn width(&self) -> u32 {
        self.key.w
    }

    pub fn height(&self) -> u32 {
        self.key.h
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Copy the current contents out into an image.
    pub fn snapshot(&self) -> PackResult<RasterImage> {
        RasterImage::new(self.key.w, self.key.h, self.buf.clone())
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.lock().release(self.key, buf);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pool.rs"]
mod tests;
