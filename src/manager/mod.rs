//! Feature manager — owns the shared evaluator and hands out one snapshot per
//! request.
//!
//! The manager lives for the whole process; the [`FeatureSnapshot`]s it mints
//! live for a single request. Host frameworks typically call
//! [`FeatureManager::snapshot`] when a request arrives and store the result in
//! their per-request state, or wrap the request's work in
//! [`FeatureManager::scoped`].

use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use crate::{
    config::{FailurePolicy, SnapshotConfig},
    evaluator::Evaluator,
    snapshot::FeatureSnapshot,
};

/// Factory for request-scoped [`FeatureSnapshot`]s sharing one evaluator.
///
/// # Examples
///
/// ```rust
/// use flagscope::{FeatureManager, InMemoryEvaluator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let manager = FeatureManager::new(InMemoryEvaluator::from_flags([("beta", true)]));
///
/// let enabled = manager
///     .scoped(|features| async move { features.is_enabled("beta").await })
///     .await;
/// assert_eq!(enabled, Ok(true));
/// # }
/// ```
pub struct FeatureManager<E> {
    evaluator: Arc<E>,
    config: SnapshotConfig,
}

impl<E> Clone for FeatureManager<E> {
    fn clone(&self) -> Self {
        Self {
            evaluator: Arc::clone(&self.evaluator),
            config: self.config,
        }
    }
}

impl<E: Evaluator> FeatureManager<E> {
    pub fn new(evaluator: E) -> Self {
        Self::from_arc(Arc::new(evaluator))
    }

    /// Build a manager around an evaluator that is already shared elsewhere.
    pub fn from_arc(evaluator: Arc<E>) -> Self {
        Self {
            evaluator,
            config: SnapshotConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SnapshotConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn evaluator(&self) -> &Arc<E> {
        &self.evaluator
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// A fresh, empty snapshot for one request.
    pub fn snapshot(&self) -> FeatureSnapshot<E> {
        FeatureSnapshot::with_policy(Arc::clone(&self.evaluator), self.config.failure_policy)
    }

    /// Runs `work` with a fresh snapshot and discards the snapshot afterwards.
    ///
    /// Emits a `tracing::debug!` record once `work` completes with the number
    /// of features the request recorded and the elapsed time.
    pub async fn scoped<F, Fut>(&self, work: F) -> Fut::Output
    where
        F: FnOnce(FeatureSnapshot<E>) -> Fut,
        Fut: Future,
    {
        let start = Instant::now();
        let snapshot = self.snapshot();

        let output = work(snapshot.clone()).await;

        debug!(
            recorded = snapshot.len(),
            elapsed = ?start.elapsed(),
            "feature scope finished"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::evaluator::{EvaluationError, InMemoryEvaluator, evaluator_fn};

    #[tokio::test]
    async fn snapshots_are_isolated_per_request() {
        let manager = FeatureManager::new(InMemoryEvaluator::from_flags([("beta", true)]));

        let first = manager.snapshot();
        assert!(first.is_enabled("beta").await.unwrap());

        manager.evaluator().set("beta", false);

        let second = manager.snapshot();
        assert!(second.is_empty());
        assert!(!second.is_enabled("beta").await.unwrap());
        assert!(first.is_enabled("beta").await.unwrap());
    }

    #[tokio::test]
    async fn scoped_runs_work_with_fresh_snapshot() {
        let manager = FeatureManager::new(InMemoryEvaluator::from_flags([("beta", true)]));

        let (first, second) = manager
            .scoped(|features| async move {
                let first = features.is_enabled("beta").await;
                let second = features.is_enabled("beta").await;
                (first, second)
            })
            .await;
        assert_eq!(first, Ok(true));
        assert_eq!(second, Ok(true));

        let recorded = manager.scoped(|features| async move { features.len() }).await;
        assert_eq!(recorded, 0);
    }

    #[tokio::test]
    async fn each_scope_evaluates_again() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let manager = FeatureManager::new(evaluator_fn(move |_feature: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Infallible>(true) }
        }));

        for _ in 0..3 {
            manager
                .scoped(|features| async move {
                    features.is_enabled("beta").await.unwrap();
                    features.is_enabled("beta").await.unwrap();
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_policy_flows_into_snapshots() {
        let manager = FeatureManager::new(evaluator_fn(|feature: &str| {
            let feature = feature.to_owned();
            async move {
                Err::<bool, _>(EvaluationError::Unavailable {
                    feature,
                    reason: "offline".into(),
                })
            }
        }))
        .with_failure_policy(FailurePolicy::RecordDisabled);

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.failure_policy(), FailurePolicy::RecordDisabled);
        assert!(snapshot.is_enabled("beta").await.is_err());
        assert!(!snapshot.is_enabled("beta").await.unwrap());
    }

    #[test]
    fn with_config_replaces_defaults() {
        let config = SnapshotConfig::from_json(r#"{"failure-policy": "record-disabled"}"#).unwrap();
        let manager = FeatureManager::new(InMemoryEvaluator::new()).with_config(config);
        assert_eq!(manager.config().failure_policy, FailurePolicy::RecordDisabled);

        let clone = manager.clone();
        assert!(Arc::ptr_eq(clone.evaluator(), manager.evaluator()));
    }
}
