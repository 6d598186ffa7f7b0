//! models — composition, training objective and the user-facing forecaster.
//!
//! - [`composer`]: `ŷ = T ⊙ (1 + Σ multiplicative) + Σ additive` and its
//!   backward routing.
//! - [`graph`]: the ordered component list as a trainer `Objective`.
//! - [`forecaster`]: configuration, `fit`, `predict` and evaluation.
pub mod composer;
pub mod forecaster;
pub mod graph;

pub use self::composer::Composition;
pub use self::forecaster::Forecaster;
pub use self::graph::ModelGraph;
