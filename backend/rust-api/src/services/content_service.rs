use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::content::{
    Category, CatalogItem, Challenge, Exercise, Island, Module, QuestionKind,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate catalog id: {0}")]
    DuplicateId(String),

    #[error("Island {island} lists unknown module {module}")]
    UnknownModule { island: String, module: String },

    #[error("Module {module} is not listed by its island {island}")]
    OrphanModule { module: String, island: String },

    #[error("Module {module} uses tier {tier} which island {island} does not define")]
    MissingBadgeTier {
        module: String,
        island: String,
        tier: &'static str,
    },

    #[error("Question {question} in module {module} is malformed: {reason}")]
    InvalidQuestion {
        module: String,
        question: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Island(usize),
    Module(usize),
    Challenge(usize),
    Exercise(usize),
}

/// Read-only content catalog. Built once at start-up and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Catalog {
    islands: Vec<Island>,
    modules: Vec<Module>,
    challenges: Vec<Challenge>,
    exercises: Vec<Exercise>,
    index: HashMap<String, Slot>,
}

impl Catalog {
    pub fn new(
        islands: Vec<Island>,
        modules: Vec<Module>,
        challenges: Vec<Challenge>,
        exercises: Vec<Exercise>,
    ) -> Result<Self, CatalogError> {
        let mut index = HashMap::new();
        let mut insert = |id: &str, slot: Slot| {
            if index.insert(id.to_string(), slot).is_some() {
                return Err(CatalogError::DuplicateId(id.to_string()));
            }
            Ok(())
        };

        for (pos, island) in islands.iter().enumerate() {
            insert(&island.id, Slot::Island(pos))?;
        }
        for (pos, module) in modules.iter().enumerate() {
            insert(&module.id, Slot::Module(pos))?;
        }
        for (pos, challenge) in challenges.iter().enumerate() {
            insert(&challenge.id, Slot::Challenge(pos))?;
        }
        for (pos, exercise) in exercises.iter().enumerate() {
            insert(&exercise.id, Slot::Exercise(pos))?;
        }

        let catalog = Self {
            islands,
            modules,
            challenges,
            exercises,
            index,
        };
        catalog.check_structure()?;

        tracing::debug!(
            islands = catalog.islands.len(),
            modules = catalog.modules.len(),
            challenges = catalog.challenges.len(),
            exercises = catalog.exercises.len(),
            "Catalog built"
        );
        Ok(catalog)
    }

    fn check_structure(&self) -> Result<(), CatalogError> {
        for island in &self.islands {
            for module_id in &island.module_ids {
                let listed_here = self
                    .module(module_id)
                    .is_some_and(|module| module.island_id == island.id);
                if !listed_here {
                    return Err(CatalogError::UnknownModule {
                        island: island.id.clone(),
                        module: module_id.clone(),
                    });
                }
            }
        }

        for module in &self.modules {
            let island = self
                .island(&module.island_id)
                .filter(|island| island.module_ids.contains(&module.id))
                .ok_or_else(|| CatalogError::OrphanModule {
                    module: module.id.clone(),
                    island: module.island_id.clone(),
                })?;

            if !island.badges.contains_key(&module.tier) {
                return Err(CatalogError::MissingBadgeTier {
                    module: module.id.clone(),
                    island: island.id.clone(),
                    tier: module.tier.as_str(),
                });
            }

            let mut question_ids = HashSet::new();
            for question in &module.questions {
                let invalid = |reason: &str| CatalogError::InvalidQuestion {
                    module: module.id.clone(),
                    question: question.id.clone(),
                    reason: reason.to_string(),
                };
                if !question_ids.insert(question.id.as_str()) {
                    return Err(invalid("duplicate question id"));
                }
                match &question.kind {
                    QuestionKind::Scale { min, max } if min >= max => {
                        return Err(invalid("scale min must be below max"));
                    }
                    QuestionKind::MultipleChoice { options } if options.is_empty() => {
                        return Err(invalid("no options"));
                    }
                    QuestionKind::Checkbox {
                        options,
                        max_selectable,
                    } if options.is_empty() || *max_selectable == 0 => {
                        return Err(invalid("no selectable options"));
                    }
                    QuestionKind::Text { max_length } if *max_length == 0 => {
                        return Err(invalid("zero max length"));
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn island(&self, id: &str) -> Option<&Island> {
        match self.index.get(id)? {
            Slot::Island(pos) => self.islands.get(*pos),
            _ => None,
        }
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        match self.index.get(id)? {
            Slot::Module(pos) => self.modules.get(*pos),
            _ => None,
        }
    }

    pub fn challenge(&self, id: &str) -> Option<&Challenge> {
        match self.index.get(id)? {
            Slot::Challenge(pos) => self.challenges.get(*pos),
            _ => None,
        }
    }

    pub fn exercise(&self, id: &str) -> Option<&Exercise> {
        match self.index.get(id)? {
            Slot::Exercise(pos) => self.exercises.get(*pos),
            _ => None,
        }
    }

    /// Any catalog entry by id.
    pub fn item(&self, id: &str) -> Option<CatalogItem<'_>> {
        let item = match self.index.get(id)? {
            Slot::Island(pos) => CatalogItem::Island(self.islands.get(*pos)?),
            Slot::Module(pos) => CatalogItem::Module(self.modules.get(*pos)?),
            Slot::Challenge(pos) => CatalogItem::Challenge(self.challenges.get(*pos)?),
            Slot::Exercise(pos) => CatalogItem::Exercise(self.exercises.get(*pos)?),
        };
        Some(item)
    }

    /// Modules of an island in the island's order. Empty for unknown islands.
    pub fn modules_of_island(&self, island_id: &str) -> Vec<&Module> {
        self.island(island_id)
            .map(|island| {
                island
                    .module_ids
                    .iter()
                    .filter_map(|id| self.module(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every entry of a category: islands, then modules, challenges and
    /// exercises, each in definition order.
    pub fn by_category(&self, category: Category) -> Vec<CatalogItem<'_>> {
        let islands = self.islands.iter().map(CatalogItem::Island);
        let modules = self.modules.iter().map(CatalogItem::Module);
        let challenges = self.challenges.iter().map(CatalogItem::Challenge);
        let exercises = self.exercises.iter().map(CatalogItem::Exercise);

        islands
            .chain(modules)
            .chain(challenges)
            .chain(exercises)
            .filter(|item| item.category() == category)
            .collect()
    }

    pub fn islands_by_category(&self, category: Option<Category>) -> Vec<&Island> {
        self.islands
            .iter()
            .filter(|island| category.map_or(true, |c| island.category == c))
            .collect()
    }

    pub fn challenges_by_category(&self, category: Option<Category>) -> Vec<&Challenge> {
        self.challenges
            .iter()
            .filter(|challenge| category.map_or(true, |c| challenge.category == c))
            .collect()
    }

    pub fn exercises_by_category(&self, category: Option<Category>) -> Vec<&Exercise> {
        self.exercises
            .iter()
            .filter(|exercise| category.map_or(true, |c| exercise.category == c))
            .collect()
    }
}
