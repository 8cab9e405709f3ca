//! Debounced digital input trait

/// A debounced digital input with edge detection
///
/// `update` is called exactly once per controller tick. Edges reported by
/// `rose`/`fell` refer to the change detected by the most recent update.
pub trait DigitalInput {
    /// Sample the pin and refresh the debounced state
    fn update(&mut self, now_ms: u64);

    /// Stable logical level (true = active)
    fn level(&self) -> bool;

    /// Level went inactive → active on the last update
    fn rose(&self) -> bool;

    /// Level went active → inactive on the last update
    fn fell(&self) -> bool;
}
