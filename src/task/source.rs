use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::foundation::error::{PackError, PackResult};
use crate::render::RenderContext;
use crate::render::image::RasterImage;
use crate::task::{AnyTask, TaskBody};

/// Rasterizes one named source at the context's tile size.
pub(crate) struct SourceBody {
    source: String,
    ctx: Arc<RenderContext>,
}

impl SourceBody {
    pub(crate) fn new(source: impl Into<String>, ctx: Arc<RenderContext>) -> Self {
        Self {
            source: source.into(),
            ctx,
        }
    }
}

impl TaskBody<RasterImage> for SourceBody {
    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>> {
        Vec::new()
    }

    fn perform(self: Arc<Self>) -> BoxFuture<'static, PackResult<RasterImage>> {
        async move {
            let size = self.ctx.tile_size();
            let rasterizer = Arc::clone(self.ctx.rasterizer());
            let source = self.source.clone();
            let image = self
                .ctx
                .workers()
                .run(move || rasterizer.rasterize(&source, size))
                .await?;

            if image.width() != size || image.height() != size {
                return Err(PackError::render(format!(
                    "source '{}' rendered at {}x{}, expected {size}x{size}",
                    self.source,
                    image.width(),
                    image.height()
                )));
            }
            Ok(image)
        }
        .boxed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
