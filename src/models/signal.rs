//! Signal types flowing out of the trailing-stop channels and the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Edge-triggered crossover flags for one channel on one sample.
///
/// `buy` and `sell` require opposite-direction crosses, so they are never
/// both set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawCrossSignal {
    pub buy: bool,
    pub sell: bool,
}

impl RawCrossSignal {
    pub const NONE: Self = Self {
        buy: false,
        sell: false,
    };

    pub fn buy() -> Self {
        Self {
            buy: true,
            sell: false,
        }
    }

    pub fn sell() -> Self {
        Self {
            buy: false,
            sell: true,
        }
    }

    pub fn is_none(&self) -> bool {
        !self.buy && !self.sell
    }
}

/// Higher-timeframe regime latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    /// Only ever the initial state
    #[default]
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Actionable event emitted for a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignalEvent {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    #[default]
    None,
}

impl SignalEvent {
    pub fn is_none(&self) -> bool {
        matches!(self, SignalEvent::None)
    }

    /// Identifier suffix used in alert signal ids (`OPEN_LONG`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            SignalEvent::OpenLong => "OPEN_LONG",
            SignalEvent::OpenShort => "OPEN_SHORT",
            SignalEvent::CloseLong => "CLOSE_LONG",
            SignalEvent::CloseShort => "CLOSE_SHORT",
            SignalEvent::None => "NONE",
        }
    }
}

impl fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
