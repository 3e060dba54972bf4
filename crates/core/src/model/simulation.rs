use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{LearnerId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SimulationError {
    #[error("unknown simulation type: {0}")]
    UnknownKind(String),

    #[error("simulation must contain at least one decision")]
    NoDecisions,

    #[error("correct decisions ({correct}) exceed total ({total})")]
    ScoreOutOfRange { correct: u32, total: u32 },
}

/// Interactive exercise attached to some modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    Phishing,
    Pretexting,
    Baiting,
    QuidProQuo,
}

impl SimulationKind {
    pub const ALL: [SimulationKind; 4] = [
        SimulationKind::Phishing,
        SimulationKind::Pretexting,
        SimulationKind::Baiting,
        SimulationKind::QuidProQuo,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SimulationKind::Phishing => "phishing",
            SimulationKind::Pretexting => "pretexting",
            SimulationKind::Baiting => "baiting",
            SimulationKind::QuidProQuo => "quid_pro_quo",
        }
    }

    /// Module whose content the simulation exercises.
    #[must_use]
    pub fn module(self) -> ModuleId {
        match self {
            SimulationKind::QuidProQuo => ModuleId::new(2),
            SimulationKind::Phishing => ModuleId::new(3),
            SimulationKind::Pretexting => ModuleId::new(4),
            SimulationKind::Baiting => ModuleId::new(5),
        }
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| SimulationError::UnknownKind(s.to_owned()))
    }
}

/// Outcome of one simulation run. Informational only, never gates progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    pub learner_id: LearnerId,
    pub kind: SimulationKind,
    pub correct_decisions: u32,
    pub total_decisions: u32,
    pub time_taken_secs: u32,
    pub completed_at: DateTime<Utc>,
}

impl SimulationResult {
    /// # Errors
    ///
    /// Returns `SimulationError` when the decision counts are inconsistent.
    pub fn new(
        learner_id: LearnerId,
        kind: SimulationKind,
        correct_decisions: u32,
        total_decisions: u32,
        time_taken_secs: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, SimulationError> {
        if total_decisions == 0 {
            return Err(SimulationError::NoDecisions);
        }
        if correct_decisions > total_decisions {
            return Err(SimulationError::ScoreOutOfRange {
                correct: correct_decisions,
                total: total_decisions,
            });
        }
        Ok(Self {
            learner_id,
            kind,
            correct_decisions,
            total_decisions,
            time_taken_secs,
            completed_at,
        })
    }

    #[must_use]
    pub fn module(&self) -> ModuleId {
        self.kind.module()
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        crate::grading::percentage(self.correct_decisions, self.total_decisions)
    }
}
