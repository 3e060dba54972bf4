use thiserror::Error;

use crate::model::ids::ModuleId;
use crate::model::simulation::SimulationKind;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module id must be >= 1")]
    ZeroId,

    #[error("module title cannot be empty")]
    EmptyTitle,

    #[error("course must contain at least two modules (content plus final assessment)")]
    TooFewModules,

    #[error("module ordinals must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguous { expected: ModuleId, found: ModuleId },
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// One ordered unit of course content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
    description: Option<String>,
    simulation: Option<SimulationKind>,
}

impl Module {
    /// # Errors
    ///
    /// Returns `ModuleError` for a zero ordinal or blank title.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        description: Option<String>,
        simulation: Option<SimulationKind>,
    ) -> Result<Self, ModuleError> {
        if id.value() == 0 {
            return Err(ModuleError::ZeroId);
        }
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ModuleError::EmptyTitle);
        }
        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        Ok(Self {
            id,
            title,
            description,
            simulation,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn simulation(&self) -> Option<SimulationKind> {
        self.simulation
    }

    #[must_use]
    pub fn has_simulation(&self) -> bool {
        self.simulation.is_some()
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// The ordered module list. The last module hosts the final assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    modules: Vec<Module>,
}

impl Course {
    /// Builds a course, sorting modules by ordinal and checking contiguity.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::TooFewModules` or `ModuleError::NonContiguous`.
    pub fn new(mut modules: Vec<Module>) -> Result<Self, ModuleError> {
        if modules.len() < 2 {
            return Err(ModuleError::TooFewModules);
        }
        modules.sort_by_key(Module::id);
        for (expected, module) in (1_u64..).zip(&modules) {
            if module.id().value() != expected {
                return Err(ModuleError::NonContiguous {
                    expected: ModuleId::new(expected),
                    found: module.id(),
                });
            }
        }
        Ok(Self { modules })
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        let index = usize::try_from(id.value()).ok()?.checked_sub(1)?;
        self.modules.get(index)
    }

    #[must_use]
    pub fn contains(&self, id: ModuleId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The module hosting the final assessment (module N).
    #[must_use]
    pub fn final_module(&self) -> ModuleId {
        ModuleId::new(self.modules.len() as u64)
    }

    /// Modules 1..N-1, whose knowledge checks gate the final assessment.
    pub fn content_modules(&self) -> impl Iterator<Item = &Module> {
        let last = self.final_module();
        self.modules.iter().filter(move |m| m.id() != last)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: u64) -> Module {
        Module::new(ModuleId::new(id), format!("Module {id}"), None, None).unwrap()
    }

    #[test]
    fn module_rejects_zero_and_blank_title() {
        assert_eq!(
            Module::new(ModuleId::new(0), "x", None, None).unwrap_err(),
            ModuleError::ZeroId
        );
        assert_eq!(
            Module::new(ModuleId::new(1), "   ", None, None).unwrap_err(),
            ModuleError::EmptyTitle
        );
    }

    #[test]
    fn course_sorts_and_checks_contiguity() {
        let course = Course::new(vec![module(2), module(1), module(3)]).unwrap();
        assert_eq!(course.len(), 3);
        assert_eq!(course.final_module(), ModuleId::new(3));
        let content: Vec<_> = course.content_modules().map(Module::id).collect();
        assert_eq!(content, vec![ModuleId::new(1), ModuleId::new(2)]);

        let err = Course::new(vec![module(1), module(3)]).unwrap_err();
        assert_eq!(
            err,
            ModuleError::NonContiguous {
                expected: ModuleId::new(2),
                found: ModuleId::new(3)
            }
        );
    }

    #[test]
    fn course_lookup_by_ordinal() {
        let course = Course::new(vec![module(1), module(2)]).unwrap();
        assert_eq!(course.get(ModuleId::new(2)).map(Module::title), Some("Module 2"));
        assert!(course.get(ModuleId::new(0)).is_none());
        assert!(!course.contains(ModuleId::new(3)));
    }

    #[test]
    fn single_module_course_is_rejected() {
        assert_eq!(
            Course::new(vec![module(1)]).unwrap_err(),
            ModuleError::TooFewModules
        );
    }
}
