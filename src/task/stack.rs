use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PackError, PackResult};
use crate::render::RenderContext;
use crate::render::composite;
use crate::render::image::RasterImage;
use crate::task::{AnyTask, ImageTask, TaskBody, join_in_order};

/// Layers painted back-to-front over a background fill.
pub(crate) struct StackBody {
    background: Rgba8Premul,
    layers: Vec<ImageTask>,
    ctx: Arc<RenderContext>,
}

impl StackBody {
    pub(crate) fn new(background: Rgba8Premul, layers: Vec<ImageTask>, ctx: Arc<RenderContext>) -> Self {
        Self {
            background,
            layers,
            ctx,
        }
    }
}

impl TaskBody<RasterImage> for StackBody {
    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>> {
        self.layers.iter().map(ImageTask::erased).collect()
    }

    fn perform(self: Arc<Self>) -> BoxFuture<'static, PackResult<RasterImage>> {
        async move {
            let images = join_in_order(&self.layers).await?;
            let first = images
                .first()
                .ok_or_else(|| PackError::render("stack has no layers"))?;
            let (w, h) = (first.width(), first.height());

            let mut surface = self.ctx.pool().acquire(w, h).await?;
            let background = self.background;
            self.ctx
                .workers()
                .run(move || {
                    composite::composite_layers_into(surface.data_mut(), w, h, background, &images)?;
                    surface.snapshot()
                })
                .await
        }
        .boxed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
