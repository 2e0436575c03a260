//! Pixel-level collaborators consumed by the task graph.

pub mod composite;
pub mod encode;
pub mod image;
pub mod pool;
pub mod svg;
pub mod workers;

use std::sync::Arc;

use crate::foundation::error::PackResult;
use crate::render::pool::{SurfacePool, SurfacePoolOpts};
use crate::render::svg::Rasterizer;
use crate::render::workers::RenderWorkers;

/// Everything a task body needs to produce pixels.
pub struct RenderContext {
    rasterizer: Arc<dyn Rasterizer>,
    pool: SurfacePool,
    workers: RenderWorkers,
    tile_size: u32,
}

impl RenderContext {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        tile_size: u32,
        threads: Option<usize>,
        pool_opts: SurfacePoolOpts,
    ) -> PackResult<Self> {
        if tile_size == 0 || tile_size > svg::MAX_TILE_SIZE {
            return Err(crate::PackError::validation(format!(
                "tile size must be in 1..={}, got {tile_size}",
                svg::MAX_TILE_SIZE
            )));
        }
        Ok(Self {
            rasterizer,
            pool: SurfacePool::new(pool_opts),
            workers: RenderWorkers::new(threads)?,
            tile_size,
        })
    }

    pub fn rasterizer(&self) -> &Arc<dyn Rasterizer> {
        &self.rasterizer
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    pub fn workers(&self) -> &RenderWorkers {
        &self.workers
    }

    /// Edge length of every source raster, in pixels.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }
}
