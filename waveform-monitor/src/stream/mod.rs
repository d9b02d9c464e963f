//! Aggregators turning per-event values into time-bucketed monitoring series.
//!
//! Each aggregator holds a fixed number of slots. Values are added with
//! [StreamData::fill] during a time bucket, and [StreamData::update] closes the
//! bucket, folding it into the long-run value read back by [StreamData::data].
//! `update` must not run concurrently with `fill` on the same aggregator.
//!
//! Indices outside the aggregator are ignored by `fill` and read back as the
//! neutral value by `data`.
mod max;
mod mean;
mod rms;
mod sum;
mod variable_mean;

pub use max::Max;
pub use mean::Mean;
pub use rms::Rms;
pub use sum::Sum;
pub use variable_mean::VariableMean;

pub trait StreamData {
    type Datum: Copy;

    /// Adds `datum` to slot `instance_index` in the current bucket.
    ///
    /// `datum_index` selects a point within the slot and is only meaningful
    /// to aggregators tracking several points per slot.
    fn fill(&mut self, instance_index: usize, datum_index: usize, datum: Self::Datum);

    fn data(&self, index: usize) -> Self::Datum;

    /// Number of slots.
    fn size(&self) -> usize;

    /// Closes the current bucket.
    fn update(&mut self);

    /// Returns every slot to its neutral value and forgets all history.
    fn clear(&mut self);

    /// Sets the number of points expected per bucket for one slot.
    fn set_points_per_time(&mut self, index: usize, n_points: usize);
}
