use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::driver::{Driver, DriverReport, RetryPolicy};
use crate::foundation::error::{PackError, PackResult};
use crate::graph::{CachePolicy, GraphBuilder};
use crate::recipe::Material;
use crate::render::RenderContext;
use crate::render::pool::{SurfacePoolOpts, SurfacePoolStats};
use crate::render::svg::Rasterizer;
use crate::stats::{PackStats, StatsSnapshot};

/// Options for one pack generation run.
#[derive(Clone, Debug)]
pub struct PackOpts {
    /// Root of the written file tree.
    pub out_dir: PathBuf,
    /// Edge length of every source raster, in pixels.
    pub tile_size: u32,
    /// Render worker threads. `None` uses one per core.
    pub threads: Option<usize>,
    /// Scratch surfaces allowed out of the pool at once.
    pub pool_surfaces: usize,
    pub cache: CachePolicy,
    pub retry: RetryPolicy,
}

impl Default for PackOpts {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            tile_size: 32,
            threads: None,
            pool_surfaces: 64,
            cache: CachePolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// What a finished run did.
#[derive(Clone, Debug)]
pub struct PackReport {
    /// Distinct output tasks after deduplication.
    pub outputs: usize,
    pub driver: DriverReport,
    pub stats: StatsSnapshot,
    pub pool: SurfacePoolStats,
}

/// Build every material into one deduplicated graph and drive it until all outputs are written.
///
/// Materials are built in parallel on the render workers. Returns once every output file exists,
/// or with the first construction error, or when the retry policy gives up.
#[tracing::instrument(
    skip_all,
    fields(out_dir = %opts.out_dir.display(), tile_size = opts.tile_size, materials = materials.len())
)]
pub async fn generate_pack(
    opts: PackOpts,
    materials: Vec<Arc<dyn Material>>,
    rasterizer: Arc<dyn Rasterizer>,
) -> PackResult<PackReport> {
    let pool_opts = SurfacePoolOpts {
        max_checked_out: opts.pool_surfaces,
        ..SurfacePoolOpts::default()
    };
    let ctx = Arc::new(RenderContext::new(
        rasterizer,
        opts.tile_size,
        opts.threads,
        pool_opts,
    )?);
    let stats = Arc::new(PackStats::new());
    let builder = GraphBuilder::new(
        Arc::clone(&ctx),
        Arc::clone(&stats),
        opts.out_dir.clone(),
        opts.cache.clone(),
    );

    let graph = tokio::task::spawn_blocking(move || {
        builder.context().workers().install(|| {
            materials.par_iter().try_for_each(|m| {
                m.build(&builder).map(drop).inspect_err(|e| {
                    tracing::error!(material = m.name(), error = %e, "material failed to build");
                })
            })
        })?;
        Ok::<_, PackError>(builder.finish())
    })
    .await
    .map_err(|e| PackError::render(format!("graph construction panicked: {e}")))??;

    tracing::info!(outputs = graph.len(), "graph built");
    let driver = Driver::new(opts.retry).run(graph.outputs()).await?;

    let snapshot = stats.snapshot();
    snapshot.log();
    Ok(PackReport {
        outputs: graph.len(),
        driver,
        stats: snapshot,
        pool: ctx.pool().stats(),
    })
}
