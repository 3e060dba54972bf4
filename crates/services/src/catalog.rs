//! TOML course catalog: modules and their question sets.
//!
//! Module ordinals follow file order starting at 1. Question ids are derived
//! from their place in the file as `module * 1000 + set * 100 + position`,
//! so reseeding the same file keeps ids stable.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use awareness_core::model::{
    Course, Module, ModuleId, OptionLabel, Question, QuestionId, QuestionSet, SimulationKind,
};
use storage::repository::Storage;

use crate::error::CatalogError;

const MAX_SET_NUMBER: u32 = 9;
const MAX_QUESTIONS_PER_SET: usize = 99;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    modules: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    simulation: Option<SimulationKind>,
    #[serde(default)]
    question_sets: Vec<RawSet>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSet {
    set_number: u32,
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuestion {
    text: String,
    options: Vec<String>,
    correct: OptionLabel,
    explanation: String,
}

/// Validated course content ready to be seeded.
#[derive(Debug, Clone)]
pub struct CourseCatalog {
    course: Course,
    question_sets: Vec<QuestionSet>,
}

impl CourseCatalog {
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// Returns `CatalogError` if the document fails to parse or validate.
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(content)?;

        let mut modules = Vec::with_capacity(raw.modules.len());
        let mut question_sets = Vec::new();
        for (ordinal, raw_module) in (1u64..).zip(raw.modules) {
            let module_id = ModuleId::new(ordinal);
            if let Some(kind) = raw_module.simulation.filter(|k| k.module() != module_id) {
                return Err(CatalogError::SimulationMismatch {
                    module: module_id,
                    kind,
                    expected: kind.module(),
                });
            }
            modules.push(Module::new(
                module_id,
                raw_module.title,
                raw_module.description,
                raw_module.simulation,
            )?);
            for raw_set in raw_module.question_sets {
                question_sets.push(build_set(module_id, raw_set)?);
            }
        }

        Ok(Self {
            course: Course::new(modules)?,
            question_sets,
        })
    }

    #[must_use]
    pub fn course(&self) -> &Course {
        &self.course
    }

    #[must_use]
    pub fn question_sets(&self) -> &[QuestionSet] {
        &self.question_sets
    }

    /// Upserts every module, then every question set.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if a write fails.
    pub async fn seed(&self, storage: &Storage) -> Result<(), CatalogError> {
        for module in self.course.modules() {
            storage.course.upsert_module(module).await?;
        }
        for set in &self.question_sets {
            storage.questions.upsert_question_set(set).await?;
        }
        info!(
            modules = self.course.len(),
            question_sets = self.question_sets.len(),
            "course catalog seeded"
        );
        Ok(())
    }
}

fn build_set(module: ModuleId, raw: RawSet) -> Result<QuestionSet, CatalogError> {
    if raw.set_number > MAX_SET_NUMBER || raw.questions.len() > MAX_QUESTIONS_PER_SET {
        return Err(CatalogError::SetOutOfRange {
            module,
            set_number: raw.set_number,
        });
    }
    let base = module.value() * 1000 + u64::from(raw.set_number) * 100;

    let mut questions = Vec::with_capacity(raw.questions.len());
    for (position, raw_q) in (1u64..).zip(raw.questions) {
        let options: [String; 4] =
            raw_q
                .options
                .try_into()
                .map_err(|_| CatalogError::OptionCount {
                    module,
                    position: position as usize,
                })?;
        questions.push(Question::new(
            QuestionId::new(base + position),
            raw_q.text,
            options,
            raw_q.correct,
            raw_q.explanation,
        )?);
    }
    Ok(QuestionSet::new(module, raw.set_number, questions)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use awareness_core::model::ModuleError;
    use std::path::PathBuf;

    const TWO_MODULES: &str = r#"
[[modules]]
title = "Basics"

[[modules.question_sets]]
set_number = 1

[[modules.question_sets.questions]]
text = "Pick b"
options = ["a", "b", "c", "d"]
correct = "b"
explanation = "b is right"

[[modules]]
title = "Final Assessment"
"#;

    fn fixture_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/course.toml")
    }

    #[test]
    fn fixture_loads_eight_modules() {
        let catalog = CourseCatalog::load(&fixture_path()).unwrap();
        let course = catalog.course();
        assert_eq!(course.len(), 8);
        assert_eq!(course.final_module(), ModuleId::new(8));
        assert_eq!(course.content_modules().count(), 7);

        // Two sets of five for every content module.
        assert_eq!(catalog.question_sets().len(), 14);
        assert!(catalog.question_sets().iter().all(|s| s.len() == 5));
        assert!(
            catalog
                .question_sets()
                .iter()
                .all(|s| s.module() != course.final_module())
        );
    }

    #[test]
    fn fixture_simulations_map_to_their_modules() {
        let catalog = CourseCatalog::load(&fixture_path()).unwrap();
        for module in catalog.course().modules() {
            if let Some(kind) = module.simulation() {
                assert_eq!(kind.module(), module.id());
            }
        }
        let with_simulation = catalog
            .course()
            .modules()
            .iter()
            .filter(|m| m.has_simulation())
            .count();
        assert_eq!(with_simulation, 4);
    }

    #[test]
    fn question_ids_follow_file_position() {
        let catalog = CourseCatalog::from_toml_str(TWO_MODULES).unwrap();
        let set = &catalog.question_sets()[0];
        assert_eq!(set.questions()[0].id(), QuestionId::new(1101));
        assert_eq!(set.questions()[0].correct(), OptionLabel::B);
    }

    #[test]
    fn three_options_are_rejected() {
        let doc = TWO_MODULES.replace(r#"["a", "b", "c", "d"]"#, r#"["a", "b", "c"]"#);
        let err = CourseCatalog::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, CatalogError::OptionCount { position: 1, .. }));
    }

    #[test]
    fn single_module_course_is_rejected() {
        let doc = "[[modules]]\ntitle = \"Only\"\n";
        let err = CourseCatalog::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, CatalogError::Module(ModuleError::TooFewModules)));
    }

    #[test]
    fn misplaced_simulation_is_rejected() {
        let doc = TWO_MODULES.replace(
            "title = \"Basics\"",
            "title = \"Basics\"\nsimulation = \"phishing\"",
        );
        let err = CourseCatalog::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, CatalogError::SimulationMismatch { .. }));
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let storage = Storage::in_memory();
        let catalog = CourseCatalog::load(&fixture_path()).unwrap();
        catalog.seed(&storage).await.unwrap();
        catalog.seed(&storage).await.unwrap();

        assert_eq!(storage.course.list_modules().await.unwrap().len(), 8);
        let sets = storage.questions.question_sets(ModuleId::new(3)).await.unwrap();
        assert_eq!(sets.len(), 2);
    }
}
