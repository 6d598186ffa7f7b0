//! Parameter scopes: shared (global) vs. per-series (local) coefficients.
//!
//! Purpose
//! -------
//! Decide, per component, where in the flat parameter vector the
//! coefficients used for a given series live. Components never branch on
//! the scope themselves: they ask their [`ParamBlock`] for the range that
//! belongs to a series and read/accumulate there.
//!
//! Key behaviors
//! -------------
//! - [`SharedParameterStore`] maps every series onto slot 0, so gradients of
//!   all series in a minibatch accumulate into the same coefficients.
//! - [`PerKeyParameterStore`] owns one slot per series identifier, so
//!   gradients stay isolated per series.
//! - [`LayoutBuilder`] hands out consecutive, non-overlapping blocks of the
//!   flat parameter vector.
//!
//! Invariants & assumptions
//! ------------------------
//! - Series are referred to by their 0-based position in the training set;
//!   the position of a series is fixed for the lifetime of a fitted model.
//! - Scopes are fixed at `fit` time and never change during training.
use std::{fmt::Debug, ops::Range, sync::Arc};

/// Sharing policy of one component's coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterScope {
    /// One coefficient set shared by all series.
    #[default]
    Global,
    /// One private coefficient set per series.
    Local,
}

/// Capability every parameter store offers: map a series onto a slot.
pub trait ParameterStore: Send + Sync + Debug {
    fn scope(&self) -> ParameterScope;
    fn n_slots(&self) -> usize;
    fn slot_for(&self, series: usize) -> usize;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SharedParameterStore;

impl ParameterStore for SharedParameterStore {
    fn scope(&self) -> ParameterScope {
        ParameterScope::Global
    }

    fn n_slots(&self) -> usize {
        1
    }

    fn slot_for(&self, _series: usize) -> usize {
        0
    }
}

/// One slot per series key, in training order.
#[derive(Debug, Clone)]
pub struct PerKeyParameterStore {
    keys: Arc<[String]>,
}

impl PerKeyParameterStore {
    pub fn new(keys: Arc<[String]>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl ParameterStore for PerKeyParameterStore {
    fn scope(&self) -> ParameterScope {
        ParameterScope::Local
    }

    fn n_slots(&self) -> usize {
        self.keys.len().max(1)
    }

    fn slot_for(&self, series: usize) -> usize {
        series.min(self.n_slots() - 1)
    }
}

/// Contiguous region of the parameter vector owned by one component.
///
/// The region holds `n_slots` consecutive slots of `slot_len` parameters.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    offset: usize,
    slot_len: usize,
    store: Arc<dyn ParameterStore>,
}

impl ParamBlock {
    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    pub fn n_slots(&self) -> usize {
        self.store.n_slots()
    }

    pub fn scope(&self) -> ParameterScope {
        self.store.scope()
    }

    /// Total number of parameters in the block.
    pub fn len(&self) -> usize {
        self.slot_len * self.n_slots()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole block.
    pub fn full_range(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }

    /// Range of the slot at position `slot`.
    pub fn slot_range(&self, slot: usize) -> Range<usize> {
        let start = self.offset + slot * self.slot_len;
        start..start + self.slot_len
    }

    /// Range holding the coefficients used for `series`.
    pub fn range_for(&self, series: usize) -> Range<usize> {
        self.slot_range(self.store.slot_for(series))
    }
}

/// Allocates consecutive [`ParamBlock`]s.
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    next: usize,
    keys: Arc<[String]>,
}

impl LayoutBuilder {
    pub fn new(series_keys: &[String]) -> Self {
        Self { next: 0, keys: series_keys.to_vec().into() }
    }

    /// Reserve a block of `slot_len` parameters per slot under `scope`.
    pub fn allocate(&mut self, slot_len: usize, scope: ParameterScope) -> ParamBlock {
        let store: Arc<dyn ParameterStore> = match scope {
            ParameterScope::Global => Arc::new(SharedParameterStore),
            ParameterScope::Local => Arc::new(PerKeyParameterStore::new(Arc::clone(&self.keys))),
        };
        let block = ParamBlock { offset: self.next, slot_len, store };
        self.next += block.len();
        block
    }

    /// Parameters allocated so far.
    pub fn total(&self) -> usize {
        self.next
    }
}

/// Scope per component family; everything is global by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeConfig {
    pub trend: ParameterScope,
    pub seasonality: ParameterScope,
    pub events: ParameterScope,
    pub future_regressors: ParameterScope,
    pub autoregression: ParameterScope,
    pub lagged_regressors: ParameterScope,
}

impl ScopeConfig {
    /// Every family local.
    pub fn all_local() -> Self {
        Self {
            trend: ParameterScope::Local,
            seasonality: ParameterScope::Local,
            events: ParameterScope::Local,
            future_regressors: ParameterScope::Local,
            autoregression: ParameterScope::Local,
            lagged_regressors: ParameterScope::Local,
        }
    }

    pub fn with_trend(mut self, scope: ParameterScope) -> Self {
        self.trend = scope;
        self
    }

    pub fn with_seasonality(mut self, scope: ParameterScope) -> Self {
        self.seasonality = scope;
        self
    }

    pub fn with_events(mut self, scope: ParameterScope) -> Self {
        self.events = scope;
        self
    }

    pub fn with_future_regressors(mut self, scope: ParameterScope) -> Self {
        self.future_regressors = scope;
        self
    }

    pub fn with_autoregression(mut self, scope: ParameterScope) -> Self {
        self.autoregression = scope;
        self
    }

    pub fn with_lagged_regressors(mut self, scope: ParameterScope) -> Self {
        self.lagged_regressors = scope;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    // Purpose
    // -------
    // Global blocks route every series to the same range; local blocks give
    // each series its own range.
    //
    // Given
    // -----
    // - Three series; a global block of 2 followed by a local block of 4.
    //
    // Expect
    // ------
    // - Global: [0, 2) for all series.
    // - Local: [2, 6), [6, 10), [10, 14); total 14.
    fn global_and_local_ranges() {
        let mut layout = LayoutBuilder::new(&keys());

        let global = layout.allocate(2, ParameterScope::Global);
        let local = layout.allocate(4, ParameterScope::Local);

        assert_eq!(global.range_for(0), 0..2);
        assert_eq!(global.range_for(2), 0..2);
        assert_eq!(local.range_for(0), 2..6);
        assert_eq!(local.range_for(1), 6..10);
        assert_eq!(local.range_for(2), 10..14);
        assert_eq!(local.full_range(), 2..14);
        assert_eq!(layout.total(), 14);
        assert_eq!(local.scope(), ParameterScope::Local);
    }

    #[test]
    // Purpose
    // -------
    // Zero-length blocks are allowed and take no space.
    fn empty_blocks_take_no_space() {
        let mut layout = LayoutBuilder::new(&keys());

        let empty = layout.allocate(0, ParameterScope::Local);
        let next = layout.allocate(1, ParameterScope::Global);

        assert!(empty.is_empty());
        assert_eq!(next.full_range(), 0..1);
    }
}
