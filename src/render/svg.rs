use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::foundation::error::{PackError, PackResult};
use crate::render::image::RasterImage;

/// Largest tile edge accepted by the rasterizer.
pub const MAX_TILE_SIZE: u32 = 16_384;

/// Turns a named source into a square raster image.
///
/// Implementations must be pure functions of `(source, size)`: the graph deduplicates and caches
/// on that assumption.
pub trait Rasterizer: Send + Sync + 'static {
    /// Rasterize `source` into a `size x size` premultiplied image.
    fn rasterize(&self, source: &str, size: u32) -> PackResult<RasterImage>;
}

/// Rasterizer backed by a directory of `<name>.svg` files.
pub struct SvgRasterizer {
    root: PathBuf,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgRasterizer {
    /// Read sources from `root`. Text elements render with no fonts unless
    /// [`SvgRasterizer::with_system_fonts`] is used.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fontdb: Arc::new(usvg::fontdb::Database::new()),
        }
    }

    /// Load system fonts for `<text>` elements.
    pub fn with_system_fonts(mut self) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        self.fontdb = Arc::new(db);
        self
    }

    /// Directory sources are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_path(&self, source: &str) -> PathBuf {
        self.root.join(format!("{source}.svg"))
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, source: &str, size: u32) -> PackResult<RasterImage> {
        let path = self.source_path(source);
        let bytes = std::fs::read(&path).map_err(|e| PackError::io(&path, e))?;
        let tree = parse_svg(&bytes, path.parent(), Arc::clone(&self.fontdb))?;
        let pixels = rasterize_svg_to_premul_rgba8(&tree, size, size)?;
        RasterImage::new(size, size, pixels)
    }
}

/// Parse SVG bytes, resolving relative references against `resources_dir`.
pub fn parse_svg(
    bytes: &[u8],
    resources_dir: Option<&Path>,
    fontdb: Arc<usvg::fontdb::Database>,
) -> PackResult<usvg::Tree> {
    let opts = usvg::Options {
        resources_dir: resources_dir.map(Path::to_path_buf),
        fontdb,
        ..Default::default()
    };
    usvg::Tree::from_data(bytes, &opts).map_err(|e| PackError::render(format!("parse svg: {e}")))
}

/// Render `tree` stretched to `width x height`.
pub fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> PackResult<Vec<u8>> {
    if width == 0 || height == 0 || width > MAX_TILE_SIZE || height > MAX_TILE_SIZE {
        return Err(PackError::render(format!(
            "svg raster size out of range: {width}x{height} (max {MAX_TILE_SIZE}x{MAX_TILE_SIZE})"
        )));
    }
    let size = tree.size();
    let valid = |v: f32| v.is_finite() && v > 0.0;
    if !valid(size.width()) || !valid(size.height()) {
        return Err(PackError::render("svg has invalid width/height"));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| PackError::render("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / size.width();
    let sy = (height as f32) / size.height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.take())
}

#[cfg(test)]
#[path = "../../tests/unit/render/svg.rs"]
mod tests;
