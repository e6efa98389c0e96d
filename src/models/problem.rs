use serde::Serialize;

use crate::models::shed::{DataType, DeviceId, SiteId, ZoneId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdealStatus {
    DoesNotServe,
    Late,
    Extreme,
    Unknown,
    Over,
    Under,
    Okay,
}

impl IdealStatus {
    pub fn label(self) -> &'static str {
        match self {
            IdealStatus::Okay => "O.K.",
            IdealStatus::Extreme => "Giving extreme readings",
            IdealStatus::Over => "Over limit",
            IdealStatus::Under => "Under limit",
            IdealStatus::DoesNotServe => "Not serving that type of data",
            IdealStatus::Late => "Late to give valid responses",
            IdealStatus::Unknown => "Unknown",
        }
    }

    /// Statuses that make a whole scope not okay. Extreme and unknown
    /// readings do not.
    pub fn breaks_okay(self) -> bool {
        matches!(self, IdealStatus::Over | IdealStatus::Under | IdealStatus::Late)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Over,
    Under,
    Extreme,
    Late,
}

impl Direction {
    /// The statuses the detector reports on.
    pub fn from_status(status: IdealStatus) -> Option<Direction> {
        match status {
            IdealStatus::Over => Some(Direction::Over),
            IdealStatus::Under => Some(Direction::Under),
            IdealStatus::Extreme => Some(Direction::Extreme),
            IdealStatus::Late => Some(Direction::Late),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProblemScope {
    Site { site: SiteId },
    Zone { site: SiteId, zone: ZoneId },
    Device { device: DeviceId },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProblemCause {
    Reading { data_type: DataType, direction: Direction },
    Connectivity,
}

/// Display names captured at detection time, so messages can be rendered
/// without going back to the generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemNames {
    pub site: String,
    pub zone: Option<String>,
    pub device: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub scope: ProblemScope,
    pub cause: ProblemCause,
    pub names: ProblemNames,
}

impl Problem {
    pub fn message(&self) -> String {
        crate::services::messages::describe(self)
    }
}
