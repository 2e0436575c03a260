//! texgraph renders a texture pack from SVG sources through a deduplicated task graph.
//!
//! - Describe textures as a [`RecipeFile`] (or implement [`Material`] directly)
//! - Build them into one graph with a [`GraphBuilder`], which merges structurally equal work
//! - Run the output tasks with a [`Driver`], which retries failed branches
//!
//! [`generate_pack`] wires all of it together.
#![forbid(unsafe_code)]

mod foundation;

pub mod driver;
pub mod graph;
pub mod pack;
pub mod recipe;
/// Pixel operations, scratch surfaces and render workers.
pub mod render;
pub mod stats;
pub mod task;

pub use crate::foundation::color::ColorDef;
pub use crate::foundation::core::{Rgba8Premul, TaskId, TaskKind};
pub use crate::foundation::error::{PackError, PackResult};

pub use crate::driver::{Driver, DriverReport, RetryPolicy};
pub use crate::graph::{CachePolicy, GraphBuilder, TaskGraph, TaskKey};
pub use crate::pack::{PackOpts, PackReport, generate_pack};
pub use crate::recipe::{ImageExpr, Material, RecipeFile};
pub use crate::render::RenderContext;
pub use crate::render::image::{PngBytes, RasterImage};
pub use crate::render::svg::{Rasterizer, SvgRasterizer};
pub use crate::stats::{KindStats, PackStats, StatsSnapshot};
pub use crate::task::{
    CacheStrategy, ImageTask, Outcome, OutputTask, PngTask, Task, TaskFailure, TaskHandle,
};
