//! Single-flight task nodes.
//!
//! A [`Task`] is one node of the texture graph. It runs its body at most once at a time, shares the
//! in-flight computation with every concurrent caller, keeps its last result around while consumers
//! still need it and can be cleared after a failure so the driver may try again.
//!
//! Reverse edges (dependents) are stored as [`TaskId`]s, so the only strong references in the graph
//! point from consumers to their dependencies.

pub(crate) mod animate;
pub mod cache;
pub(crate) mod output;
pub(crate) mod source;
pub(crate) mod stack;
pub(crate) mod transform;

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, MutexGuard};
use tokio::task::AbortHandle;

use crate::foundation::core::{TaskId, TaskKind};
use crate::foundation::error::{PackError, PackResult};
use crate::render::image::{PngBytes, RasterImage};
use crate::stats::PackStats;

pub use cache::{CacheStrategy, CacheValue, SharedLru, TaskCache};

/// Task producing a premultiplied raster.
pub type ImageTask = Task<RasterImage>;
/// Task producing encoded PNG bytes.
pub type PngTask = Task<PngBytes>;
/// Sink task writing files.
pub type OutputTask = Task<()>;

/// Result of one task computation as seen by every waiter.
pub type Outcome<T> = Result<T, TaskFailure>;

/// Why a computation produced no value.
#[derive(Clone, Debug)]
pub enum TaskFailure {
    /// The body failed. Eligible for [`Task::clear_failure`] and a retry.
    Failed(Arc<PackError>),
    /// The computation was cancelled. Not a failure.
    Cancelled,
}

impl TaskFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn error(&self) -> Option<&Arc<PackError>> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Cancelled => None,
        }
    }

    /// The error a consumer reports when its dependency `dependency` ended this way.
    pub fn into_dependency_error(self, dependency: &str) -> PackError {
        match self {
            Self::Failed(err) => PackError::dependency(dependency, err),
            Self::Cancelled => PackError::Cancelled,
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "failed: {err}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What a concrete task kind computes.
pub(crate) trait TaskBody<T: CacheValue>: Send + Sync + 'static {
    /// Direct dependencies, in order.
    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>>;

    fn perform(self: Arc<Self>) -> BoxFuture<'static, PackResult<T>>;

    /// Fold state from a structurally equal body that is being merged away.
    fn absorb(&self, _duplicate: &dyn Any) {}

    fn as_any(&self) -> &dyn Any;
}

/// Type-erased view of a task, used for dependency bookkeeping across value types.
pub trait AnyTask: Send + Sync {
    fn id(&self) -> TaskId;
    fn name(&self) -> &str;
    fn kind(&self) -> TaskKind;
    /// Failed computations recorded so far.
    fn failures(&self) -> u32;
    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>>;
    fn add_direct_dependent(&self, dependent: TaskId);
    fn remove_direct_dependent(&self, dependent: TaskId);

    /// Clear failures below and including this task, skipping ids already in `visited`.
    fn clear_failure_from(&self, visited: &mut HashSet<TaskId>);
}

static NEXT_ATTEMPT: AtomicU64 = AtomicU64::new(1);

fn next_attempt() -> u64 {
    NEXT_ATTEMPT.fetch_add(1, Ordering::Relaxed)
}

type SharedOutcome<T> = Shared<BoxFuture<'static, Outcome<T>>>;

/// One computation of a task body.
struct Attempt<T: CacheValue> {
    id: u64,
    outcome: SharedOutcome<T>,
    abort: Option<Arc<AbortHandle>>,
    /// Set once a waiter has observed the outcome and the owning task processed it.
    settled: Option<Outcome<T>>,
}

impl<T: CacheValue> Attempt<T> {
    fn ready(value: T) -> Self {
        let outcome: Outcome<T> = Ok(value);
        Self {
            id: next_attempt(),
            outcome: futures::future::ready(outcome.clone()).boxed().shared(),
            abort: None,
            settled: Some(outcome),
        }
    }

    /// Share the same computation from another task. The copy starts unsettled.
    fn attached(&self) -> Self {
        Self {
            id: self.id,
            outcome: self.outcome.clone(),
            abort: self.abort.clone(),
            settled: None,
        }
    }

    /// The outcome, if the computation has finished. Never starts anything.
    fn finished(&self) -> Option<Outcome<T>> {
        self.settled
            .clone()
            .or_else(|| self.outcome.peek().cloned())
            .or_else(|| self.outcome.clone().now_or_never())
    }

    fn value(&self) -> Option<T> {
        match self.finished() {
            Some(Ok(v)) => Some(v),
            _ => None,
        }
    }

    fn has_failed(&self) -> bool {
        matches!(self.finished(), Some(Err(TaskFailure::Failed(_))))
    }

    fn is_running(&self) -> bool {
        self.finished().is_none()
    }

    /// Someone besides the owning task holds this computation's outcome.
    fn has_joiners(&self) -> bool {
        self.outcome.strong_count().is_some_and(|n| n > 1)
    }
}

struct TaskState<T: CacheValue> {
    current: Option<Attempt<T>>,
    cache: TaskCache<T>,
    dependents: HashSet<TaskId>,
    failures: u32,
}

impl<T: CacheValue> TaskState<T> {
    fn value(&self) -> Option<T> {
        self.cache
            .get_now()
            .or_else(|| self.current.as_ref().and_then(Attempt::value))
    }
}

struct TaskNode<T: CacheValue> {
    id: TaskId,
    name: String,
    kind: TaskKind,
    body: Arc<dyn TaskBody<T>>,
    stats: Arc<PackStats>,
    state: Mutex<TaskState<T>>,
}

/// Handle to a shared task node. Cloning is cheap and keeps the same identity.
pub struct Task<T: CacheValue>(Arc<TaskNode<T>>);

impl<T: CacheValue> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: CacheValue> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .finish()
    }
}

/// A started (or already finished) computation of one task.
pub struct TaskHandle<T: CacheValue> {
    task: Task<T>,
    attempt: u64,
    outcome: SharedOutcome<T>,
}

impl<T: CacheValue> TaskHandle<T> {
    pub fn task(&self) -> &Task<T> {
        &self.task
    }

    /// Wait for the computation without blocking a worker thread.
    pub async fn join(self) -> Outcome<T> {
        let outcome = self.outcome.await;
        self.task.settle(self.attempt, &outcome);
        outcome
    }
}

impl<T: CacheValue> Task<T> {
    pub(crate) fn new(
        id: TaskId,
        name: impl Into<String>,
        kind: TaskKind,
        body: impl TaskBody<T>,
        cache: TaskCache<T>,
        stats: Arc<PackStats>,
    ) -> Self {
        Self(Arc::new(TaskNode {
            id,
            name: name.into(),
            kind,
            body: Arc::new(body),
            stats,
            state: Mutex::new(TaskState {
                current: None,
                cache,
                dependents: HashSet::new(),
                failures: 0,
            }),
        }))
    }

    pub fn id(&self) -> TaskId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> TaskKind {
        self.0.kind
    }

    /// `true` if both handles refer to the same node.
    pub fn same(&self, other: &Task<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn erased(&self) -> Arc<dyn AnyTask> {
        Arc::clone(&self.0) as Arc<dyn AnyTask>
    }

    pub fn dependencies(&self) -> Vec<Arc<dyn AnyTask>> {
        self.0.body.dependencies()
    }

    pub fn failures(&self) -> u32 {
        self.0.state.lock().failures
    }

    pub fn dependent_count(&self) -> usize {
        self.0.state.lock().dependents.len()
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.0.state.lock().cache.is_enabled()
    }

    pub(crate) fn body_as<B: 'static>(&self) -> Option<&B> {
        self.0.body.as_any().downcast_ref::<B>()
    }

    /// Return the cached or in-flight computation, starting a new one if there is neither.
    ///
    /// Must be called from within a tokio runtime. Exactly one computation is started per
    /// generation no matter how many callers race here.
    pub fn start(&self) -> TaskHandle<T> {
        let mut st = self.0.state.lock();
        if let Some(value) = st.cache.get_now() {
            let ready = Attempt::ready(value);
            return TaskHandle {
                task: self.clone(),
                attempt: ready.id,
                outcome: ready.outcome,
            };
        }
        if let Some(current) = &st.current {
            return TaskHandle {
                task: self.clone(),
                attempt: current.id,
                outcome: current.outcome.clone(),
            };
        }

        let attempt = self.0.launch();
        let handle = TaskHandle {
            task: self.clone(),
            attempt: attempt.id,
            outcome: attempt.outcome.clone(),
        };
        st.current = Some(attempt);
        handle
    }

    /// Start if needed and wait for the result.
    pub async fn await_result(&self) -> Outcome<T> {
        self.start().join().await
    }

    /// Peek at the cached value or a finished computation. Never starts anything.
    pub fn get_now(&self) -> Option<Outcome<T>> {
        let st = self.0.state.lock();
        if let Some(value) = st.cache.get_now() {
            return Some(Ok(value));
        }
        st.current.as_ref().and_then(Attempt::finished)
    }

    /// Clear failure state in every dependency, then in this task.
    ///
    /// Tasks that succeeded, never ran or are still running are left alone.
    pub fn clear_failure(&self) {
        self.0.clear_failure_from(&mut HashSet::new());
    }

    pub fn add_direct_dependent(&self, dependent: TaskId) {
        self.0.add_direct_dependent(dependent);
    }

    pub fn remove_direct_dependent(&self, dependent: TaskId) {
        self.0.remove_direct_dependent(dependent);
    }

    /// Fold a structurally equal task built independently into this one and return the survivor.
    ///
    /// `self` always survives. A result already held here wins; otherwise a result or in-flight
    /// computation of `other` is adopted. When both are running, `other`'s computation is
    /// cancelled. A computation of `self` that anyone is waiting on is never cancelled.
    pub fn merge_with_duplicate(&self, other: &Task<T>) -> Task<T> {
        if self.same(other) {
            return self.clone();
        }

        let cancel = {
            let (mut mine, mut theirs) = lock_pair(&self.0, &other.0);
            let (mine, theirs) = (&mut *mine, &mut *theirs);
            let mut cancel = Vec::new();

            if mine.value().is_some() {
                // Keep ours.
            } else if let Some(value) = theirs.value() {
                let joined = mine
                    .current
                    .as_ref()
                    .is_some_and(|a| a.is_running() && a.has_joiners());
                if joined {
                    // Waiters stay on our flight; the cache serves later callers.
                    mine.cache.set(value);
                } else {
                    if let Some(stale) = mine.current.take()
                        && stale.is_running()
                    {
                        cancel.extend(stale.abort);
                    }
                    if mine.cache.is_enabled() {
                        mine.cache.set(value);
                    } else {
                        mine.current = Some(Attempt::ready(value));
                    }
                }
            } else {
                let mut redundant = false;
                if let Some(attempt) = theirs.current.as_ref().filter(|a| a.is_running()) {
                    match mine.current.as_ref().filter(|m| m.is_running()) {
                        None => mine.current = Some(attempt.attached()),
                        Some(running) if running.id != attempt.id => {
                            cancel.extend(attempt.abort.clone());
                            redundant = true;
                        }
                        Some(_) => {}
                    }
                }
                if redundant {
                    theirs.current = None;
                    other.0.stats.record_cancelled(other.0.kind);
                }
            }
            cancel
        };

        for abort in cancel {
            abort.abort();
        }
        self.0.body.absorb(other.0.body.as_any());
        tracing::debug!(task = %self.0.name, duplicate = %other.0.id, "merged duplicate");
        self.clone()
    }

    fn settle(&self, attempt: u64, outcome: &Outcome<T>) {
        self.0.settle(attempt, outcome);
    }
}

impl<T: CacheValue> TaskNode<T> {
    fn launch(&self) -> Attempt<T> {
        let id = next_attempt();
        let join = tokio::spawn(Arc::clone(&self.body).perform());
        let abort = join.abort_handle();
        let outcome = async move {
            match join.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) if err.is_cancelled() => Err(TaskFailure::Cancelled),
                Ok(Err(err)) => Err(TaskFailure::Failed(Arc::new(err))),
                Err(err) if err.is_cancelled() => Err(TaskFailure::Cancelled),
                Err(err) => Err(TaskFailure::Failed(Arc::new(PackError::render(format!(
                    "task panicked: {err}"
                ))))),
            }
        }
        .boxed()
        .shared();

        self.stats.record_launched(self.kind);
        tracing::debug!(task = %self.name, attempt = id, "launched");
        Attempt {
            id,
            outcome,
            abort: Some(Arc::new(abort)),
            settled: None,
        }
    }

    /// Apply a finished outcome to the task state. Only the current, not yet settled attempt counts.
    fn settle(&self, attempt: u64, outcome: &Outcome<T>) {
        let succeeded = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            let Some(current) = st.current.as_mut() else {
                return;
            };
            if current.id != attempt || current.settled.is_some() {
                return;
            }

            match outcome {
                Ok(value) => {
                    current.settled = Some(outcome.clone());
                    if st.cache.is_enabled() {
                        st.cache.set(value.clone());
                        st.current = None;
                    } else if st.dependents.is_empty() {
                        st.current = None;
                    }
                    tracing::debug!(task = %self.name, attempt, "succeeded");
                    true
                }
                Err(TaskFailure::Failed(err)) => {
                    current.settled = Some(outcome.clone());
                    self.record_failure(st, err);
                    false
                }
                Err(TaskFailure::Cancelled) => {
                    st.current = None;
                    self.stats.record_cancelled(self.kind);
                    tracing::debug!(task = %self.name, attempt, "cancelled");
                    false
                }
            }
        };

        // A finished consumer no longer pins its inputs.
        if succeeded {
            for dep in self.body.dependencies() {
                dep.remove_direct_dependent(self.id);
            }
        }
    }

    fn record_failure(&self, st: &mut TaskState<T>, err: &PackError) {
        st.failures += 1;
        self.stats.record_failed(self.kind);
        tracing::warn!(
            task = %self.name,
            failures = st.failures,
            error = %err,
            "task failed"
        );
    }
}

impl<T: CacheValue> AnyTask for TaskNode<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn failures(&self) -> u32 {
        self.state.lock().failures
    }

    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>> {
        self.body.dependencies()
    }

    fn add_direct_dependent(&self, dependent: TaskId) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if !st.dependents.insert(dependent) {
            return;
        }
        if st.dependents.len() >= 2 && !st.cache.is_enabled() && st.cache.enable() {
            if let Some(value) = st.current.as_ref().and_then(|a| a.settled.as_ref()?.clone().ok()) {
                st.cache.set(value);
                st.current = None;
            }
            tracing::debug!(task = %self.name, dependents = st.dependents.len(), "cache enabled");
        }
    }

    fn remove_direct_dependent(&self, dependent: TaskId) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if !st.dependents.remove(&dependent) {
            return;
        }
        match st.dependents.len() {
            1 if st.cache.is_enabled() => {
                // The last consumer may still come back for the value.
                if let Some(value) = st.cache.disable()
                    && st.current.is_none()
                {
                    st.current = Some(Attempt::ready(value));
                }
            }
            0 => {
                st.cache.disable();
                if st
                    .current
                    .as_ref()
                    .is_some_and(|a| matches!(a.settled, Some(Ok(_))))
                {
                    st.current = None;
                }
            }
            _ => {}
        }
    }

    fn clear_failure_from(&self, visited: &mut HashSet<TaskId>) {
        if !visited.insert(self.id) {
            return;
        }
        for dep in self.body.dependencies() {
            dep.clear_failure_from(visited);
        }

        let mut guard = self.state.lock();
        let st = &mut *guard;
        let Some(current) = st.current.as_ref() else {
            return;
        };
        if !current.has_failed() {
            return;
        }
        if current.settled.is_none()
            && let Some(Err(TaskFailure::Failed(err))) = current.finished()
        {
            self.record_failure(st, &err);
        }
        st.current = None;
        tracing::debug!(task = %self.name, "failure cleared");
    }
}

/// Start every task, wait for all of them and return their values in order.
///
/// All handles are joined even after a failure so no finished computation is left unobserved. The
/// first failure in list order is reported.
pub(crate) async fn join_in_order<T: CacheValue>(tasks: &[Task<T>]) -> PackResult<Vec<T>> {
    let handles: Vec<_> = tasks.iter().map(Task::start).collect();
    let outcomes = futures::future::join_all(handles.into_iter().map(TaskHandle::join)).await;
    tasks
        .iter()
        .zip(outcomes)
        .map(|(task, outcome)| outcome.map_err(|f| f.into_dependency_error(task.name())))
        .collect()
}

/// Lock two distinct nodes in id order, returned as `(a, b)`.
fn lock_pair<'a, T: CacheValue>(
    a: &'a TaskNode<T>,
    b: &'a TaskNode<T>,
) -> (MutexGuard<'a, TaskState<T>>, MutexGuard<'a, TaskState<T>>) {
    if a.id < b.id {
        let ga = a.state.lock();
        let gb = b.state.lock();
        (ga, gb)
    } else {
        let gb = b.state.lock();
        let ga = a.state.lock();
        (ga, gb)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/task/node.rs"]
mod tests;
