use std::any::Any;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::foundation::core::{Rgba8Premul, TaskId, TaskKind};
use crate::foundation::error::{PackError, PackResult};
use crate::graph::key::TaskKey;
use crate::render::RenderContext;
use crate::stats::PackStats;
use crate::task::animate::AnimateBody;
use crate::task::output::OutputBody;
use crate::task::source::SourceBody;
use crate::task::stack::StackBody;
use crate::task::transform::{EncodeBody, EncodePng, Repaint, RepaintBody, TransformBody};
use crate::task::{
    CacheStrategy, CacheValue, ImageTask, OutputTask, PngTask, SharedLru, Task, TaskBody,
    TaskCache,
};

/// Which [`CacheStrategy`] each task kind gets.
#[derive(Clone, Debug, Default)]
pub struct CachePolicy {
    default: CacheStrategy,
    overrides: HashMap<TaskKind, CacheStrategy>,
}

impl CachePolicy {
    pub fn new(default: CacheStrategy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, kind: TaskKind, strategy: CacheStrategy) -> Self {
        self.overrides.insert(kind, strategy);
        self
    }

    /// Output tasks produce nothing worth keeping and always get [`CacheStrategy::None`].
    pub fn strategy(&self, kind: TaskKind) -> CacheStrategy {
        if kind == TaskKind::Output {
            return CacheStrategy::None;
        }
        self.overrides.get(&kind).copied().unwrap_or(self.default)
    }
}

/// Deduplicating constructor for the task graph.
///
/// Every request is simplified, then interned by [`TaskKey`]: structurally equal requests return
/// the first task built for that key. `&self` methods may be called from many threads at once.
/// The dedup tables live only as long as the builder; [`GraphBuilder::finish`] drops them.
pub struct GraphBuilder {
    ctx: Arc<RenderContext>,
    stats: Arc<PackStats>,
    policy: CachePolicy,
    out_dir: PathBuf,
    images: Mutex<HashMap<TaskKey, ImageTask>>,
    pngs: Mutex<HashMap<TaskKey, PngTask>>,
    outputs: Mutex<HashMap<TaskKey, OutputTask>>,
    lrus: Mutex<HashMap<TaskKind, Arc<dyn Any + Send + Sync>>>,
}

impl GraphBuilder {
    pub fn new(
        ctx: Arc<RenderContext>,
        stats: Arc<PackStats>,
        out_dir: impl Into<PathBuf>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            ctx,
            stats,
            policy,
            out_dir: out_dir.into(),
            images: Mutex::new(HashMap::new()),
            pngs: Mutex::new(HashMap::new()),
            outputs: Mutex::new(HashMap::new()),
            lrus: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.ctx
    }

    pub fn stats(&self) -> &Arc<PackStats> {
        &self.stats
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Rasterized source `name` at the tile size.
    pub fn source(&self, name: &str) -> PackResult<ImageTask> {
        if name.is_empty() {
            return Err(PackError::validation("source name is empty"));
        }
        let key = TaskKey::Source {
            name: name.to_owned(),
            size: self.ctx.tile_size(),
        };
        let body = SourceBody::new(name, Arc::clone(&self.ctx));
        Ok(self.intern(&self.images, key, name.to_owned(), body))
    }

    /// Recolor `base` with `paint` (source-atop) and scale its opacity by `alpha`.
    ///
    /// Sources are black silhouettes, so painting one opaque black is the identity.
    pub fn repaint(
        &self,
        base: &ImageTask,
        paint: Option<Rgba8Premul>,
        alpha: f32,
    ) -> PackResult<ImageTask> {
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(PackError::validation(format!(
                "repaint alpha must be in [0, 1], got {alpha}"
            )));
        }

        let identity = alpha == 1.0
            && match paint {
                None => true,
                Some(p) => p == Rgba8Premul::BLACK && base.kind() == TaskKind::Source,
            };
        if identity {
            self.stats.record_simplified(TaskKind::Repaint);
            return Ok(base.clone());
        }

        // Source-atop with a translucent paint tints again on every application.
        if let Some(inner) = base.body_as::<RepaintBody>()
            && inner.op().paint == paint
            && paint.is_none_or(Rgba8Premul::is_opaque)
        {
            self.stats.record_simplified(TaskKind::Repaint);
            if alpha == 1.0 {
                return Ok(base.clone());
            }
            return self.repaint(inner.base(), paint, inner.op().alpha * alpha);
        }

        let key = TaskKey::repaint(base.id(), paint, alpha);
        let name = repaint_name(base.name(), paint, alpha);
        let body = TransformBody::new(base.clone(), Repaint { paint, alpha }, Arc::clone(&self.ctx));
        Ok(self.intern(&self.images, key, name, body))
    }

    /// Shorthand for `repaint(source(name), paint, alpha)`.
    pub fn layer(&self, source: &str, paint: Option<Rgba8Premul>, alpha: f32) -> PackResult<ImageTask> {
        let base = self.source(source)?;
        self.repaint(&base, paint, alpha)
    }

    /// Paint `layers` back-to-front over `background`.
    pub fn stack(&self, background: Rgba8Premul, layers: Vec<ImageTask>) -> PackResult<ImageTask> {
        if layers.is_empty() {
            return Err(PackError::validation("stack needs at least one layer"));
        }
        if let [only] = layers.as_slice()
            && background.is_transparent()
        {
            self.stats.record_simplified(TaskKind::Stack);
            return Ok(only.clone());
        }

        let key = TaskKey::Stack {
            background,
            layers: layers.iter().map(Task::id).collect(),
        };
        let name = group_name("stack", background, &layers);
        let body = StackBody::new(background, layers, Arc::clone(&self.ctx));
        Ok(self.intern(&self.images, key, name, body))
    }

    /// Vertical filmstrip of `frames`, each over `background`.
    pub fn animate(&self, background: Rgba8Premul, frames: Vec<ImageTask>) -> PackResult<ImageTask> {
        if frames.is_empty() {
            return Err(PackError::validation("animation needs at least one frame"));
        }
        let key = TaskKey::Animate {
            background,
            frames: frames.iter().map(Task::id).collect(),
        };
        let name = group_name("animate", background, &frames);
        let body = AnimateBody::new(background, frames, Arc::clone(&self.ctx));
        Ok(self.intern(&self.images, key, name, body))
    }

    pub fn encode(&self, image: &ImageTask) -> PngTask {
        let key = TaskKey::Encode { base: image.id() };
        let body: EncodeBody = TransformBody::new(image.clone(), EncodePng, Arc::clone(&self.ctx));
        self.intern(&self.pngs, key, format!("{}.png", image.name()), body)
    }

    /// Write `image` to `<out_dir>/<name>.png`.
    ///
    /// `name` is a relative, `/`-separated path such as `block/stone`.
    pub fn out(&self, name: &str, image: &ImageTask) -> PackResult<OutputTask> {
        let rel = Path::new(name);
        if name.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(PackError::validation(format!(
                "output name '{name}' must be a non-empty relative path"
            )));
        }
        self.out_to(image, vec![self.out_dir.join(format!("{name}.png"))])
    }

    /// Write `image` to every path in `files`, encoding once.
    ///
    /// Repeated requests for the same image fold their destinations into one output task.
    pub fn out_to(&self, image: &ImageTask, files: Vec<PathBuf>) -> PackResult<OutputTask> {
        if files.is_empty() {
            return Err(PackError::validation(format!(
                "output of '{}' has no destination files",
                image.name()
            )));
        }
        let png = self.encode(image);
        let key = TaskKey::Output { base: png.id() };
        let name = files[0].display().to_string();
        let body = OutputBody::new(png, files);
        Ok(self.intern(&self.outputs, key, name, body))
    }

    /// Drop the dedup tables and keep only the sinks.
    pub fn finish(self) -> TaskGraph {
        let mut outputs: Vec<OutputTask> = self.outputs.into_inner().into_values().collect();
        outputs.sort_by_key(|t| t.id());
        TaskGraph {
            outputs,
            stats: self.stats,
        }
    }

    fn intern<T: CacheValue>(
        &self,
        table: &Mutex<HashMap<TaskKey, Task<T>>>,
        key: TaskKey,
        name: String,
        body: impl TaskBody<T>,
    ) -> Task<T> {
        let kind = key.kind();
        let id = TaskId::next();
        let task = Task::new(
            id,
            name,
            kind,
            body,
            self.cache_for(kind, id),
            Arc::clone(&self.stats),
        );

        let mut table = table.lock();
        if let Some(canonical) = table.get(&key) {
            let canonical = canonical.merge_with_duplicate(&task);
            drop(table);
            self.stats.record_deduplicated(kind);
            tracing::debug!(task = %canonical.name(), kind = %kind, "deduplicated");
            return canonical;
        }
        table.insert(key, task.clone());
        drop(table);

        for dep in task.dependencies() {
            dep.add_direct_dependent(task.id());
        }
        self.stats.record_created(kind);
        task
    }

    fn cache_for<T: CacheValue>(&self, kind: TaskKind, id: TaskId) -> TaskCache<T> {
        match self.policy.strategy(kind) {
            CacheStrategy::None => TaskCache::noop(),
            CacheStrategy::Strong => TaskCache::strong(),
            CacheStrategy::Weak => TaskCache::weak(),
            CacheStrategy::SharedLru { capacity } => {
                TaskCache::shared(self.shared_lru(kind, capacity), id)
            }
        }
    }

    /// One LRU per task kind, created on first use.
    fn shared_lru<T: CacheValue>(&self, kind: TaskKind, capacity: usize) -> Arc<SharedLru<T>> {
        let mut lrus = self.lrus.lock();
        let entry = lrus
            .entry(kind)
            .or_insert_with(|| Arc::new(SharedLru::<T>::new(capacity)) as Arc<dyn Any + Send + Sync>);
        match Arc::clone(entry).downcast::<SharedLru<T>>() {
            Ok(lru) => lru,
            Err(_) => Arc::new(SharedLru::new(capacity)),
        }
    }
}

/// Deduplicated sinks of a finished graph.
pub struct TaskGraph {
    outputs: Vec<OutputTask>,
    stats: Arc<PackStats>,
}

impl TaskGraph {
    /// Output tasks in creation order.
    pub fn outputs(&self) -> &[OutputTask] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn stats(&self) -> &Arc<PackStats> {
        &self.stats
    }
}

fn repaint_name(base: &str, paint: Option<Rgba8Premul>, alpha: f32) -> String {
    let mut name = base.to_owned();
    if let Some(p) = paint {
        let _ = write!(name, "{p}");
    }
    if alpha != 1.0 {
        let _ = write!(name, "@{alpha}");
    }
    name
}

fn group_name(op: &str, background: Rgba8Premul, members: &[ImageTask]) -> String {
    let mut name = op.to_owned();
    if !background.is_transparent() {
        let _ = write!(name, "[{background}]");
    }
    name.push('(');
    for (i, m) in members.iter().enumerate() {
        if i > 0 {
            name.push(',');
        }
        name.push_str(m.name());
    }
    name.push(')');
    name
}

#[cfg(test)]
#[path = "../../tests/unit/graph/builder.rs"]
mod tests;
