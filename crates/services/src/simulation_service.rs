use std::sync::Arc;

use tracing::debug;

use awareness_core::model::{LearnerId, SimulationKind, SimulationResult};
use awareness_core::time::Clock;
use storage::repository::{LearnerRepository, SimulationRepository, StorageError};

use crate::error::SimulationServiceError;

/// Records interactive simulation runs. Results are informational and never
/// affect module access.
#[derive(Clone)]
pub struct SimulationService {
    clock: Clock,
    learners: Arc<dyn LearnerRepository>,
    simulations: Arc<dyn SimulationRepository>,
}

impl SimulationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        learners: Arc<dyn LearnerRepository>,
        simulations: Arc<dyn SimulationRepository>,
    ) -> Self {
        Self {
            clock,
            learners,
            simulations,
        }
    }

    /// # Errors
    ///
    /// Returns `SimulationServiceError::Simulation` for an unknown kind or
    /// inconsistent counts, and `UnknownLearner` for an unknown learner.
    pub async fn record(
        &self,
        learner: LearnerId,
        kind: &str,
        correct_decisions: u32,
        total_decisions: u32,
        time_taken_secs: u32,
    ) -> Result<SimulationResult, SimulationServiceError> {
        let kind: SimulationKind = kind.parse()?;
        match self.learners.get_learner(learner).await {
            Ok(_) => {}
            Err(StorageError::NotFound) => {
                return Err(SimulationServiceError::UnknownLearner(learner));
            }
            Err(e) => return Err(e.into()),
        }

        let result = SimulationResult::new(
            learner,
            kind,
            correct_decisions,
            total_decisions,
            time_taken_secs,
            self.clock.now(),
        )?;
        let id = self.simulations.record_simulation(&result).await?;
        debug!(learner = %learner, %kind, id, "simulation recorded");
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns `SimulationServiceError::Storage` on backend failures.
    pub async fn results(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<SimulationResult>, SimulationServiceError> {
        Ok(self.simulations.simulations_for(learner).await?)
    }
}
