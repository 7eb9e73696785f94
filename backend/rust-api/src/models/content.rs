use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Mindfulness,
    Productivity,
    Stress,
    Balance,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mindfulness => "mindfulness",
            Category::Productivity => "productivity",
            Category::Stress => "stress",
            Category::Balance => "balance",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mindfulness" => Ok(Category::Mindfulness),
            "productivity" => Ok(Category::Productivity),
            "stress" => Ok(Category::Stress),
            "balance" => Ok(Category::Balance),
            _ => Err(format!("Invalid category: {}", value)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge tiers inside an island. Ordering follows difficulty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl BadgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeTier::Beginner => "beginner",
            BadgeTier::Intermediate => "intermediate",
            BadgeTier::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BadgeDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Island {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: Category,
    pub points: u32,
    /// Module ids in display order.
    pub module_ids: Vec<String>,
    pub badges: BTreeMap<BadgeTier, BadgeDefinition>,
}

impl Island {
    pub fn module_count(&self) -> usize {
        self.module_ids.len()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Module {
    pub id: String,
    pub island_id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: Category,
    pub points: u32,
    pub tier: BadgeTier,
    pub questions: Vec<Question>,
}

impl Module {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Checks a responses payload against this module's questions.
    ///
    /// Drafts skip the `required` check; completions enforce it.
    pub fn validate_responses(
        &self,
        responses: &ModuleResponses,
        mode: ResponseCheck,
    ) -> Result<(), ValidationError> {
        for (question_id, answer) in responses {
            let question = self.question(question_id).ok_or_else(|| {
                ValidationError::new(
                    format!("responses.{}", question_id),
                    format!("module {} has no such question", self.id),
                )
            })?;
            question.validate_answer(answer)?;
        }

        if mode == ResponseCheck::Complete {
            if let Some(missing) = self
                .questions
                .iter()
                .find(|q| q.required && responses.get(&q.id).map_or(true, Answer::is_blank))
            {
                return Err(ValidationError::new(
                    format!("responses.{}", missing.id),
                    "answer is required",
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCheck {
    Draft,
    Complete,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    fn validate_answer(&self, answer: &Answer) -> Result<(), ValidationError> {
        let field = format!("responses.{}", self.id);

        match (&self.kind, answer) {
            (QuestionKind::Scale { min, max }, Answer::Number(value)) => {
                if value < min || value > max {
                    return Err(ValidationError::new(
                        field,
                        format!("{} is outside the scale {}..={}", value, min, max),
                    ));
                }
            }
            (QuestionKind::MultipleChoice { options }, Answer::Text(choice)) => {
                if !options.contains(choice) {
                    return Err(ValidationError::new(
                        field,
                        format!("'{}' is not one of the options", choice),
                    ));
                }
            }
            (
                QuestionKind::Checkbox {
                    options,
                    max_selectable,
                },
                Answer::Selections(selected),
            ) => {
                if selected.len() > *max_selectable {
                    return Err(ValidationError::new(
                        field,
                        format!("at most {} options may be selected", max_selectable),
                    ));
                }
                let mut seen = HashSet::new();
                for choice in selected {
                    if !options.contains(choice) {
                        return Err(ValidationError::new(
                            field,
                            format!("'{}' is not one of the options", choice),
                        ));
                    }
                    if !seen.insert(choice.as_str()) {
                        return Err(ValidationError::new(
                            field,
                            format!("'{}' is selected more than once", choice),
                        ));
                    }
                }
            }
            (QuestionKind::Text { max_length }, Answer::Text(text)) => {
                if text.chars().count() > *max_length {
                    return Err(ValidationError::new(
                        field,
                        format!("text is longer than {} characters", max_length),
                    ));
                }
            }
            _ => {
                return Err(ValidationError::new(
                    field,
                    format!("expected a {} answer", self.kind.type_name()),
                ))
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Scale { min: i64, max: i64 },
    MultipleChoice { options: Vec<String> },
    Checkbox { options: Vec<String>, max_selectable: usize },
    Text { max_length: usize },
}

impl QuestionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::Scale { .. } => "scale",
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::Checkbox { .. } => "checkbox",
            QuestionKind::Text { .. } => "text",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: Category,
    pub points: u32,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: Category,
    pub points: u32,
    pub duration_minutes: u32,
}

/// Borrowed view over any catalog entry.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "item", rename_all = "snake_case")]
pub enum CatalogItem<'a> {
    Island(&'a Island),
    Module(&'a Module),
    Challenge(&'a Challenge),
    Exercise(&'a Exercise),
}

impl<'a> CatalogItem<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            CatalogItem::Island(island) => &island.id,
            CatalogItem::Module(module) => &module.id,
            CatalogItem::Challenge(challenge) => &challenge.id,
            CatalogItem::Exercise(exercise) => &exercise.id,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            CatalogItem::Island(island) => island.category,
            CatalogItem::Module(module) => module.category,
            CatalogItem::Challenge(challenge) => challenge.category,
            CatalogItem::Exercise(exercise) => exercise.category,
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            CatalogItem::Island(island) => island.points,
            CatalogItem::Module(module) => module.points,
            CatalogItem::Challenge(challenge) => challenge.points,
            CatalogItem::Exercise(exercise) => exercise.points,
        }
    }
}

/// A single answer inside a responses payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Answer {
    Number(i64),
    Text(String),
    Selections(Vec<String>),
}

impl Answer {
    /// An empty selection or whitespace-only text does not answer a
    /// required question.
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Number(_) => false,
            Answer::Text(text) => text.trim().is_empty(),
            Answer::Selections(selected) => selected.is_empty(),
        }
    }
}

/// Question id to answer.
pub type ModuleResponses = BTreeMap<String, Answer>;

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Stress".parse::<Category>(), Ok(Category::Stress));
        assert_eq!(" balance ".parse::<Category>(), Ok(Category::Balance));
        assert!("sleep".parse::<Category>().is_err());
    }

    #[test]
    fn answers_deserialize_by_shape() {
        let responses: ModuleResponses = serde_json::from_value(serde_json::json!({
            "q1": 4,
            "q2": "calm",
            "q3": ["walk", "read"]
        }))
        .unwrap();

        assert_eq!(responses["q1"], Answer::Number(4));
        assert_eq!(responses["q2"], Answer::Text("calm".to_string()));
        assert_eq!(
            responses["q3"],
            Answer::Selections(vec!["walk".to_string(), "read".to_string()])
        );
    }

    fn sample_module() -> Module {
        Module {
            id: "breath_basics".to_string(),
            island_id: "calm_island".to_string(),
            title: "Breath basics".to_string(),
            description: String::new(),
            icon: String::new(),
            category: Category::Mindfulness,
            points: 20,
            tier: BadgeTier::Beginner,
            questions: vec![
                Question {
                    id: "calm".to_string(),
                    prompt: "How calm do you feel?".to_string(),
                    required: true,
                    kind: QuestionKind::Scale { min: 1, max: 5 },
                },
                Question {
                    id: "habits".to_string(),
                    prompt: "Pick up to two habits".to_string(),
                    required: false,
                    kind: QuestionKind::Checkbox {
                        options: vec!["walk".into(), "read".into(), "stretch".into()],
                        max_selectable: 2,
                    },
                },
                Question {
                    id: "note".to_string(),
                    prompt: "Anything else?".to_string(),
                    required: false,
                    kind: QuestionKind::Text { max_length: 10 },
                },
            ],
        }
    }

    fn responses(value: serde_json::Value) -> ModuleResponses {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn complete_responses_require_required_answers() {
        let module = sample_module();
        let draft = responses(serde_json::json!({ "note": "ok" }));

        assert!(module
            .validate_responses(&draft, ResponseCheck::Draft)
            .is_ok());
        let err = module
            .validate_responses(&draft, ResponseCheck::Complete)
            .unwrap_err();
        assert_eq!(err.field, "responses.calm");
    }

    #[test]
    fn blank_answers_do_not_satisfy_required_questions() {
        let mut module = sample_module();
        for question in &mut module.questions {
            question.required = true;
        }

        let empty_selection =
            responses(serde_json::json!({ "calm": 3, "habits": [], "note": "ok" }));
        let err = module
            .validate_responses(&empty_selection, ResponseCheck::Complete)
            .unwrap_err();
        assert_eq!(err.field, "responses.habits");

        let blank_text = responses(serde_json::json!({ "calm": 3, "habits": ["walk"], "note": "  " }));
        let err = module
            .validate_responses(&blank_text, ResponseCheck::Complete)
            .unwrap_err();
        assert_eq!(err.field, "responses.note");

        // Drafts may hold blank answers.
        assert!(module
            .validate_responses(&blank_text, ResponseCheck::Draft)
            .is_ok());

        let answered = responses(serde_json::json!({ "calm": 3, "habits": ["walk"], "note": "ok" }));
        assert!(module
            .validate_responses(&answered, ResponseCheck::Complete)
            .is_ok());
    }

    #[test]
    fn scale_answers_must_stay_in_range() {
        let module = sample_module();
        let err = module
            .validate_responses(&responses(serde_json::json!({ "calm": 9 })), ResponseCheck::Draft)
            .unwrap_err();
        assert!(err.message.contains("outside the scale"));
    }

    #[test]
    fn checkbox_answers_respect_options_and_limit() {
        let module = sample_module();
        let too_many = responses(serde_json::json!({ "habits": ["walk", "read", "stretch"] }));
        let unknown = responses(serde_json::json!({ "habits": ["swim"] }));
        let repeated = responses(serde_json::json!({ "habits": ["walk", "walk"] }));

        assert!(module.validate_responses(&too_many, ResponseCheck::Draft).is_err());
        assert!(module.validate_responses(&unknown, ResponseCheck::Draft).is_err());
        assert!(module.validate_responses(&repeated, ResponseCheck::Draft).is_err());
    }

    #[test]
    fn wrong_shape_and_unknown_questions_are_rejected() {
        let module = sample_module();
        let wrong_shape = responses(serde_json::json!({ "calm": "very" }));
        let unknown = responses(serde_json::json!({ "calm": 3, "mood": 2 }));
        let long_text = responses(serde_json::json!({ "calm": 3, "note": "far too long a note" }));

        let err = module
            .validate_responses(&wrong_shape, ResponseCheck::Draft)
            .unwrap_err();
        assert_eq!(err.message, "expected a scale answer");
        assert!(module.validate_responses(&unknown, ResponseCheck::Complete).is_err());
        assert!(module.validate_responses(&long_text, ResponseCheck::Complete).is_err());
    }

    #[test]
    fn question_kind_serializes_with_type_tag() {
        let question = Question {
            id: "q1".to_string(),
            prompt: "How calm do you feel?".to_string(),
            required: true,
            kind: QuestionKind::Scale { min: 1, max: 5 },
        };
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["type"], "scale");
        assert_eq!(json["max"], 5);
    }
}
