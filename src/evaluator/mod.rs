//! Feature evaluation — the capability a [`FeatureSnapshot`] memoizes.
//!
//! An [`Evaluator`] answers one question: is this feature enabled right now?
//! How it decides (filter chains, targeting rules, remote lookups) is its own
//! business. This module provides:
//!
//! - [`Evaluator`] — trait implemented by every evaluation backend.
//! - [`evaluator_fn`] — adapts an async closure into an [`Evaluator`].
//! - [`InMemoryEvaluator`] — a mutable name → bool table, handy for tests,
//!   demos, and static deployments.
//! - [`EvaluationError`] — a ready-made error type for evaluator implementors.
//!
//! [`FeatureSnapshot`]: crate::snapshot::FeatureSnapshot

use std::{
    collections::HashMap,
    convert::Infallible,
    pin::Pin,
    sync::{PoisonError, RwLock},
};

use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error type carried by [`EvaluationError::Filter`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The pinned, `Send` future returned by [`Evaluator::evaluate`].
pub type EvaluationFuture<'a, E> = Pin<Box<dyn Future<Output = Result<bool, E>> + Send + 'a>>;

/// Errors an evaluator may report for a single feature.
///
/// Snapshots never construct these themselves; they only forward whatever the
/// evaluator returned.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("feature source unavailable while evaluating '{feature}': {reason}")]
    Unavailable { feature: String, reason: String },

    #[error("filter failed for feature '{feature}': {source}")]
    Filter {
        feature: String,
        #[source]
        source: BoxError,
    },
}

/// The core trait for anything that can decide whether a feature is enabled.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; one evaluator is shared by
///   every request through an [`Arc`](std::sync::Arc).
/// - The returned future **must** be `Send` so snapshots can be used from
///   multi-threaded Tokio tasks.
/// - Evaluators are assumed deterministic for a given request context. A
///   snapshot may call `evaluate` more than once for the same name when
///   callers race on a first lookup.
pub trait Evaluator: Send + Sync {
    /// Failure reported when the feature state cannot be determined.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Determine whether `feature` is enabled.
    fn evaluate<'a>(&'a self, feature: &'a str) -> EvaluationFuture<'a, Self::Error>;
}

/// An [`Evaluator`] backed by an async closure. Build one with [`evaluator_fn`].
pub struct FnEvaluator<F> {
    f: F,
}

/// Converts an async closure into an [`Evaluator`].
///
/// The closure receives the feature name and returns a future resolving to
/// `Result<bool, Err>`. The future must own everything it needs.
///
/// # Examples
///
/// ```rust
/// use std::convert::Infallible;
/// use flagscope::evaluator::evaluator_fn;
///
/// let evaluator = evaluator_fn(|feature: &str| {
///     let enabled = feature.starts_with("beta-");
///     async move { Ok::<_, Infallible>(enabled) }
/// });
/// # let _ = evaluator;
/// ```
pub fn evaluator_fn<F, Fut, Err>(f: F) -> FnEvaluator<F>
where
    F: Fn(&str) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, Err>> + Send + 'static,
    Err: std::error::Error + Send + Sync + 'static,
{
    FnEvaluator { f }
}

impl<F, Fut, Err> Evaluator for FnEvaluator<F>
where
    F: Fn(&str) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, Err>> + Send + 'static,
    Err: std::error::Error + Send + Sync + 'static,
{
    type Error = Err;

    fn evaluate<'a>(&'a self, feature: &'a str) -> EvaluationFuture<'a, Self::Error> {
        Box::pin((self.f)(feature))
    }
}

/// Accepted JSON shapes for [`InMemoryEvaluator::from_json`].
#[derive(Deserialize)]
#[serde(untagged)]
enum FlagTable {
    Rooted {
        #[serde(rename = "feature-management")]
        feature_management: HashMap<String, bool>,
    },
    Bare(HashMap<String, bool>),
}

/// A mutable table of feature states.
///
/// Features missing from the table evaluate to `false`. The table can be
/// changed at any time with [`set`](Self::set) and [`remove`](Self::remove);
/// snapshots that already recorded a feature keep their recorded answer.
#[derive(Debug, Default)]
pub struct InMemoryEvaluator {
    flags: RwLock<HashMap<String, bool>>,
}

impl InMemoryEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, enabled)` pairs.
    pub fn from_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let flags = flags
            .into_iter()
            .map(|(name, enabled)| (name.into(), enabled))
            .collect();
        Self {
            flags: RwLock::new(flags),
        }
    }

    /// Parse a flag table from JSON.
    ///
    /// Accepts either a bare object (`{"beta": true}`) or one nested under a
    /// `feature-management` key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] when the document is not one of those shapes.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let flags = match serde_json::from_str::<FlagTable>(json)? {
            FlagTable::Rooted { feature_management } => feature_management,
            FlagTable::Bare(flags) => flags,
        };
        Ok(Self {
            flags: RwLock::new(flags),
        })
    }

    /// Set the state of `feature`, returning the previous state if any.
    pub fn set(&self, feature: impl Into<String>, enabled: bool) -> Option<bool> {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(feature.into(), enabled)
    }

    /// Remove `feature` from the table, returning its state if it was present.
    pub fn remove(&self, feature: &str) -> Option<bool> {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(feature)
    }

    fn lookup(&self, feature: &str) -> bool {
        self.flags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(feature)
            .copied()
            .unwrap_or(false)
    }
}

impl Evaluator for InMemoryEvaluator {
    type Error = Infallible;

    fn evaluate<'a>(&'a self, feature: &'a str) -> EvaluationFuture<'a, Self::Error> {
        let enabled = self.lookup(feature);
        Box::pin(async move { Ok(enabled) })
    }
}
