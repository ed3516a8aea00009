//! Async wrapper running git work off the async executor.

use crate::StagerError;
use crate::diff::DiffModel;
use crate::git::GitPort;
use crate::selection::LineSelection;
use crate::stager::{Outcome, Phase, Stager};
use crate::status::StatusLists;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Marks a path busy until dropped
struct PathGuard {
    in_flight: InFlight,
    path: String,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

/// [`Stager`] whose operations run on tokio's blocking pool.
///
/// At most one mutating operation per path runs at a time; a second one
/// fails immediately with [`StagerError::Busy`] instead of queueing behind
/// a patch that may invalidate its selection.
pub struct AsyncStager<P> {
    inner: Arc<Stager<P>>,
    in_flight: InFlight,
}

impl<P> Clone for AsyncStager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<P: GitPort + 'static> AsyncStager<P> {
    pub fn new(stager: Stager<P>) -> Self {
        Self {
            inner: Arc::new(stager),
            in_flight: Arc::default(),
        }
    }

    pub fn phase(&self, path: &str) -> Phase {
        self.inner.phase(path)
    }

    pub async fn status(&self) -> Result<StatusLists, StagerError> {
        self.run(|stager| stager.status()).await
    }

    pub async fn diff_model(&self, path: &str, staged: bool) -> Result<DiffModel, StagerError> {
        let path = path.to_string();
        self.run(move |stager| stager.diff_model(&path, staged)).await
    }

    pub async fn stage_lines(
        &self,
        model: DiffModel,
        selection: LineSelection,
    ) -> Result<Outcome, StagerError> {
        let guard = self.claim(&model.path)?;
        self.run(move |stager| {
            let _guard = guard;
            stager.stage_lines(&model, &selection)
        })
        .await
    }

    pub async fn unstage_lines(
        &self,
        model: DiffModel,
        selection: LineSelection,
    ) -> Result<Outcome, StagerError> {
        let guard = self.claim(&model.path)?;
        self.run(move |stager| {
            let _guard = guard;
            stager.unstage_lines(&model, &selection)
        })
        .await
    }

    pub async fn stage_file(&self, path: &str) -> Result<StatusLists, StagerError> {
        let guard = self.claim(path)?;
        let path = path.to_string();
        self.run(move |stager| {
            let _guard = guard;
            stager.stage_file(&path)
        })
        .await
    }

    pub async fn unstage_file(&self, path: &str) -> Result<StatusLists, StagerError> {
        let guard = self.claim(path)?;
        let path = path.to_string();
        self.run(move |stager| {
            let _guard = guard;
            stager.unstage_file(&path)
        })
        .await
    }

    fn claim(&self, path: &str) -> Result<PathGuard, StagerError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(path.to_string()) {
            debug!(path, "rejecting concurrent operation");
            return Err(StagerError::Busy {
                file: path.to_string(),
            });
        }
        Ok(PathGuard {
            in_flight: Arc::clone(&self.in_flight),
            path: path.to_string(),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StagerError>
    where
        T: Send + 'static,
        F: FnOnce(&Stager<P>) -> Result<T, StagerError> + Send + 'static,
    {
        let stager = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&stager))
            .await
            .map_err(|e| StagerError::WorkerFailed {
                message: e.to_string(),
            })?
    }
}
