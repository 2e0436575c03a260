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

/// Same-sized frames over a shared background, concatenated into a vertical strip.
pub(crate) struct AnimateBody {
    background: Rgba8Premul,
    frames: Vec<ImageTask>,
    ctx: Arc<RenderContext>,
}

impl AnimateBody {
    pub(crate) fn new(background: Rgba8Premul, frames: Vec<ImageTask>, ctx: Arc<RenderContext>) -> Self {
        Self {
            background,
            frames,
            ctx,
        }
    }
}

impl TaskBody<RasterImage> for AnimateBody {
    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>> {
        self.frames.iter().map(ImageTask::erased).collect()
    }

    fn perform(self: Arc<Self>) -> BoxFuture<'static, PackResult<RasterImage>> {
        async move {
            let frames = join_in_order(&self.frames).await?;
            let first = frames
                .first()
                .ok_or_else(|| PackError::render("animation has no frames"))?;
            let strip_h = u32::try_from(frames.len())
                .ok()
                .and_then(|n| first.height().checked_mul(n))
                .ok_or_else(|| PackError::render("animation strip height overflow"))?;

            let mut surface = self.ctx.pool().acquire(first.width(), strip_h).await?;
            let background = self.background;
            self.ctx
                .workers()
                .run(move || {
                    composite::stack_frames_into(surface.data_mut(), background, &frames)?;
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
