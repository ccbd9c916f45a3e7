//! # flagscope
//!
//! Request-scoped feature-flag snapshots for async Rust services.
//!
//! A [`FeatureSnapshot`] wraps an [`Evaluator`] and remembers every answer it
//! gives for the lifetime of one request, so repeated checks of the same
//! feature within that request agree with each other and never re-run the
//! evaluation.
//!
//! ## Quick Start
//!
//! ```rust
//! use flagscope::{FeatureManager, InMemoryEvaluator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = FeatureManager::new(InMemoryEvaluator::from_flags([("beta", true)]));
//!
//!     // One snapshot per request.
//!     let features = manager.snapshot();
//!     assert_eq!(features.is_enabled("beta").await, Ok(true));
//!
//!     // Later flips do not leak into a request already in flight.
//!     manager.evaluator().set("beta", false);
//!     assert_eq!(features.is_enabled("beta").await, Ok(true));
//! }
//! ```

pub mod config;
pub mod evaluator;
pub mod manager;
pub mod snapshot;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ConfigError, FailurePolicy, SnapshotConfig};
pub use evaluator::{EvaluationError, Evaluator, InMemoryEvaluator, evaluator_fn};
pub use manager::FeatureManager;
pub use snapshot::FeatureSnapshot;
