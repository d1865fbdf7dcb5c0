use crate::NodeKey;

/// Notifications pushed from the render thread to the control thread.
///
/// Everything here is `Copy` so the render thread can report without allocating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A time-stretch source was more than the drift tolerance away from the clock
    /// and was corrected. Positions are in output frames since the source started.
    Drift {
        key: NodeKey,
        expected: u64,
        actual: u64,
    },
    /// A source passed its stop time and went silent.
    SourceEnded { key: NodeKey },
    /// A new render graph replaced the previous one.
    GraphSwapped { nodes: usize, adopted: usize },
}
