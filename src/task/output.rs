use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::foundation::error::{PackError, PackResult};
use crate::task::{AnyTask, PngTask, TaskBody};

/// Writes encoded bytes to every destination: the first one directly, the rest as copies.
pub(crate) struct OutputBody {
    png: PngTask,
    files: Mutex<Vec<PathBuf>>,
}

impl OutputBody {
    pub(crate) fn new(png: PngTask, files: Vec<PathBuf>) -> Self {
        let mut unique = Vec::with_capacity(files.len());
        for f in files {
            if !unique.contains(&f) {
                unique.push(f);
            }
        }
        Self {
            png,
            files: Mutex::new(unique),
        }
    }

    pub(crate) fn files(&self) -> Vec<PathBuf> {
        self.files.lock().clone()
    }
}

impl TaskBody<()> for OutputBody {
    fn dependencies(&self) -> Vec<Arc<dyn AnyTask>> {
        vec![self.png.erased()]
    }

    fn perform(self: Arc<Self>) -> BoxFuture<'static, PackResult<()>> {
        async move {
            let bytes = self
                .png
                .await_result()
                .await
                .map_err(|f| f.into_dependency_error(self.png.name()))?;
            let files = self.files();
            let (first, rest) = files
                .split_first()
                .ok_or_else(|| PackError::validation("output has no destination files"))?;

            create_parent(first).await?;
            tokio::fs::write(first, bytes.as_bytes())
                .await
                .map_err(|e| PackError::io(first, e))?;
            for file in rest {
                create_parent(file).await?;
                tokio::fs::copy(first, file)
                    .await
                    .map_err(|e| PackError::io(file, e))?;
            }
            tracing::debug!(path = %first.display(), copies = rest.len(), "wrote output");
            Ok(())
        }
        .boxed()
    }

    fn absorb(&self, duplicate: &dyn Any) {
        let Some(other) = duplicate.downcast_ref::<OutputBody>() else {
            return;
        };
        let extra = other.files();
        let mut files = self.files.lock();
        for f in extra {
            if !files.contains(&f) {
                files.push(f);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

async fn create_parent(path: &Path) -> PackResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PackError::io(dir, e)),
        _ => Ok(()),
    }
}
