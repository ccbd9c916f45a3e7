//! Request-scoped feature snapshots.
//!
//! A [`FeatureSnapshot`] remembers every answer its [`Evaluator`] gave during
//! one logical request. Once a feature has been recorded, later lookups on the
//! same snapshot return the recorded value without calling the evaluator, even
//! if the underlying flag has since changed. Create one snapshot per request
//! (see [`FeatureManager`](crate::manager::FeatureManager)) and drop it when the
//! request ends.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{config::FailurePolicy, evaluator::Evaluator};

struct Shared<E> {
    evaluator: Arc<E>,
    policy: FailurePolicy,
    // Never locked across an `.await`.
    recorded: RwLock<HashMap<String, bool>>,
}

impl<E> Shared<E> {
    fn lookup(&self, feature: &str) -> Option<bool> {
        self.recorded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(feature)
            .copied()
    }

    // First writer wins, so every caller observes the same answer for a feature.
    fn record(&self, feature: &str, enabled: bool) -> bool {
        let mut recorded = self
            .recorded
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match recorded.get(feature) {
            Some(&existing) => existing,
            None => {
                recorded.insert(feature.to_owned(), enabled);
                enabled
            }
        }
    }
}

/// Memoizes feature checks for the lifetime of one request.
///
/// Cloning a snapshot is cheap and yields a handle to the same recorded
/// state, so a request that fans out into several tasks can share one
/// snapshot. Different snapshots never see each other's entries.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use flagscope::{FeatureSnapshot, InMemoryEvaluator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let evaluator = Arc::new(InMemoryEvaluator::from_flags([("beta", true)]));
/// let snapshot = FeatureSnapshot::new(Arc::clone(&evaluator));
///
/// assert_eq!(snapshot.is_enabled("beta").await, Ok(true));
/// evaluator.set("beta", false);
/// assert_eq!(snapshot.is_enabled("beta").await, Ok(true));
/// # }
/// ```
pub struct FeatureSnapshot<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for FeatureSnapshot<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> fmt::Debug for FeatureSnapshot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSnapshot")
            .field("policy", &self.shared.policy)
            .field("recorded", &self.entries())
            .finish_non_exhaustive()
    }
}

impl<E> FeatureSnapshot<E> {
    /// Create an empty snapshot using the default [`FailurePolicy::Retry`].
    pub fn new(evaluator: Arc<E>) -> Self {
        Self::with_policy(evaluator, FailurePolicy::default())
    }

    /// Create an empty snapshot with an explicit failure policy.
    pub fn with_policy(evaluator: Arc<E>, policy: FailurePolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                evaluator,
                policy,
                recorded: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.shared.policy
    }

    /// The recorded state of `feature`, without evaluating it.
    pub fn recorded(&self, feature: &str) -> Option<bool> {
        self.shared.lookup(feature)
    }

    /// Number of features recorded so far.
    pub fn len(&self) -> usize {
        self.shared
            .recorded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every recorded feature and its state.
    pub fn entries(&self) -> HashMap<String, bool> {
        self.shared
            .recorded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<E: Evaluator> FeatureSnapshot<E> {
    /// Returns whether `feature` is enabled for this request.
    ///
    /// The first successful lookup of a feature is recorded; every later
    /// lookup resolves to the recorded value without calling the evaluator.
    /// Two tasks racing on a first lookup may both evaluate, but both resolve
    /// to whichever answer was recorded first.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's error unchanged. Under [`FailurePolicy::Retry`]
    /// nothing is recorded and the next call evaluates again; under
    /// [`FailurePolicy::RecordDisabled`] the feature is recorded as `false`.
    pub async fn is_enabled(&self, feature: &str) -> Result<bool, E::Error> {
        if let Some(enabled) = self.shared.lookup(feature) {
            trace!(feature = %feature, enabled, "feature snapshot hit");
            return Ok(enabled);
        }

        debug!(feature = %feature, "feature snapshot miss, evaluating");
        match self.shared.evaluator.evaluate(feature).await {
            Ok(enabled) => {
                let enabled = self.shared.record(feature, enabled);
                debug!(feature = %feature, enabled, "feature recorded");
                Ok(enabled)
            }
            Err(e) => {
                warn!(feature = %feature, error = %e, policy = ?self.shared.policy, "feature evaluation failed");
                if self.shared.policy == FailurePolicy::RecordDisabled {
                    self.shared.record(feature, false);
                }
                Err(e)
            }
        }
    }
}

impl<E: Evaluator + 'static> FeatureSnapshot<E> {
    /// Starts evaluating `feature` on a Tokio task.
    ///
    /// Unlike [`is_enabled`](Self::is_enabled), the lookup runs to completion
    /// and records its result even if the returned handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_is_enabled(&self, feature: impl Into<String>) -> JoinHandle<Result<bool, E::Error>> {
        let snapshot = self.clone();
        let feature = feature.into();
        tokio::spawn(async move { snapshot.is_enabled(&feature).await })
    }
}
