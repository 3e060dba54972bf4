use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Course, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GateError {
    #[error("module not found: {0}")]
    UnknownModule(ModuleId),
}

/// Result of an access check. A denial names the module that must be
/// completed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub blocking_module: Option<ModuleId>,
}

impl GateDecision {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            blocking_module: None,
        }
    }

    #[must_use]
    pub fn deny(blocking_module: ModuleId) -> Self {
        Self {
            allowed: false,
            blocking_module: Some(blocking_module),
        }
    }
}

/// Module 1 is always open. Module K opens once K-1 is completed; only the
/// immediate predecessor is checked.
///
/// # Errors
///
/// Returns `GateError::UnknownModule` for a module outside the course.
pub fn module_access(
    course: &Course,
    module: ModuleId,
    completed: &BTreeSet<ModuleId>,
) -> Result<GateDecision, GateError> {
    if !course.contains(module) {
        return Err(GateError::UnknownModule(module));
    }
    Ok(match module.previous() {
        None => GateDecision::allow(),
        Some(prev) if completed.contains(&prev) => GateDecision::allow(),
        Some(prev) => GateDecision::deny(prev),
    })
}

/// The final assessment opens once every content module is completed. A
/// denial names the lowest incomplete module.
#[must_use]
pub fn final_access(course: &Course, completed: &BTreeSet<ModuleId>) -> GateDecision {
    course
        .content_modules()
        .map(|m| m.id())
        .find(|id| !completed.contains(id))
        .map_or_else(GateDecision::allow, GateDecision::deny)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Module;

    fn course(n: u64) -> Course {
        Course::new(
            (1..=n)
                .map(|i| Module::new(ModuleId::new(i), format!("Module {i}"), None, None).unwrap())
                .collect(),
        )
        .unwrap()
    }

    fn done(ids: &[u64]) -> BTreeSet<ModuleId> {
        ids.iter().copied().map(ModuleId::new).collect()
    }

    #[test]
    fn first_module_is_always_open() {
        let decision = module_access(&course(4), ModuleId::FIRST, &done(&[])).unwrap();
        assert_eq!(decision, GateDecision::allow());
    }

    #[test]
    fn module_follows_its_predecessor() {
        let course = course(4);
        for k in 2..=4 {
            let module = ModuleId::new(k);
            let open = module_access(&course, module, &done(&[k - 1])).unwrap();
            assert!(open.allowed);
            let closed = module_access(&course, module, &done(&[])).unwrap();
            assert_eq!(closed, GateDecision::deny(ModuleId::new(k - 1)));
        }
    }

    #[test]
    fn unknown_module_is_an_error() {
        let err = module_access(&course(3), ModuleId::new(9), &done(&[])).unwrap_err();
        assert_eq!(err, GateError::UnknownModule(ModuleId::new(9)));
    }

    #[test]
    fn final_requires_every_content_module() {
        let course = course(4);
        assert_eq!(
            final_access(&course, &done(&[1, 3])),
            GateDecision::deny(ModuleId::new(2))
        );
        assert!(final_access(&course, &done(&[1, 2, 3])).allowed);
    }
}
