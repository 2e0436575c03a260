use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::PackResult;
use crate::render::RenderContext;
use crate::render::composite;
use crate::render::encode;
use crate::render::image::{PngBytes, RasterImage};
use crate::task::{AnyTask, CacheValue, Task, TaskBody};

/// Pure 1-to-1 function applied on the render workers.
pub(crate) trait TransformOp<I, O>: Send + Sync + 'static {
    fn apply(&self, input: &I) -> PackResult<O>;
}

/// Source-atop recolor followed by an opacity scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Repaint {
    pub(crate) paint: Option<Rgba8Premul>,
    pub(crate) alpha: f32,
}

impl TransformOp<RasterImage, RasterImage> for Repaint {
    fn apply(&self, input: &RasterImage) -> PackResult<RasterImage> {
        composite::tint(input, self.paint, self.alpha)
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct EncodePng;

impl TransformOp<RasterImage, PngBytes> for EncodePng {
    fn apply(&self, input: &RasterImage) -> PackResult<PngBytes> {
        encode::encode_png(input)
    }
}

pub(crate) type RepaintBody = TransformBody<RasterImage, RasterImage, Repaint>;
pub(crate) type EncodeBody = TransformBody<RasterImage, PngBytes, EncodePng>;

/// One dependency, one pure function.
pub(crate) struct TransformBody<I: CacheValue, O, Op> {
    base: Task<I>,
    op: Op,
    ctx: Arc<RenderContext>,
    _out: PhantomData<fn() -> O>,
}

impl<I: CacheValue, O, Op> TransformBody<I, O, Op> {
    pub(crate) fn new(base: Task<I>, op: Op, ctx: Arc<RenderContext>) -> Self {
        Self {
            base,
            op,
            ctx,
            _out: PhantomData,
        }
    }

    pub(crate) fn base(&self) -> &Task<I> {
        &self.base
    }

    pub(crate) fn op(&self) -> &Op {
        &self.op
    }
}

impl<I, O, Op> TaskBody<O> for TransformBody<I, O, Op>
where
    I: CacheValue,
    O: CacheValue,
    Op: TransformOp<I, O>,
{
    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>> {
        vec![self.base.erased()]
    }

    fn perform(self: Arc<Self>) -> BoxFuture<'static, PackResult<O>> {
        async move {
            let input = self
                .base
                .await_result()
                .await
                .map_err(|f| f.into_dependency_error(self.base.name()))?;
            let this = Arc::clone(&self);
            self.ctx.workers().run(move || this.op.apply(&input)).await
        }
        .boxed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
