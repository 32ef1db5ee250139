use std::fmt;

/// Lifecycle states of the traversal engine
///
/// The engine starts `Idle`, is `Running` while it works through the frontier,
/// drops into `PausedForIo` while a page is fetched and the politeness delay
/// elapses, and ends `Done` once the frontier is drained. A stop request
/// honoured between pages returns it to `Idle` so it can be run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Not yet started, or stopped between pages
    Idle,

    /// Working through the frontier
    Running,

    /// Waiting on a fetch or the inter-request delay
    PausedForIo,

    /// Frontier drained, crawl complete
    Done,
}

impl EngineState {
    /// Returns true if the engine may move from this state to `next`
    pub fn can_transition_to(&self, next: EngineState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::PausedForIo)
                | (Self::PausedForIo, Self::Running)
                | (Self::Running, Self::Done)
                | (Self::Running, Self::Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::PausedForIo => "paused_for_io",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
