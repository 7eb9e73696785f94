//! Bundled content definitions. The catalog is fixed at build time; nothing
//! here is fetched or edited at runtime.

use std::collections::BTreeMap;

use crate::models::content::{
    BadgeDefinition, BadgeTier, Category, Challenge, Exercise, Island, Module, Question,
    QuestionKind,
};
use crate::services::content_service::{Catalog, CatalogError};

pub fn builtin_catalog() -> Result<Catalog, CatalogError> {
    let mut islands = Vec::new();
    let mut modules = Vec::new();

    let mindful = [
        module(
            "breath_awareness",
            "Breath Awareness",
            "Notice the breath without changing it.",
            BadgeTier::Beginner,
            20,
            vec![
                scale("calm_before", "How calm do you feel right now?", 1, 10, true),
                choice(
                    "breath_location",
                    "Where do you feel your breath most clearly?",
                    &["nose", "chest", "belly"],
                    true,
                ),
                text("observation", "What did you notice?", 500, false),
            ],
        ),
        module(
            "present_moment",
            "The Present Moment",
            "Anchor attention in what is happening now.",
            BadgeTier::Beginner,
            20,
            vec![
                scale("distraction", "How often does your mind wander?", 1, 5, true),
                checkbox(
                    "anchors",
                    "Which anchors help you return?",
                    &["breath", "sounds", "body", "sight"],
                    2,
                    false,
                ),
            ],
        ),
        module(
            "mindful_eating",
            "Mindful Eating",
            "Slow down and taste a single meal.",
            BadgeTier::Intermediate,
            30,
            vec![
                choice(
                    "meal_pace",
                    "How fast do you usually eat?",
                    &["slowly", "normally", "quickly"],
                    true,
                ),
                text("taste_notes", "Describe one flavour you noticed.", 300, false),
            ],
        ),
        module(
            "body_signals",
            "Listening to the Body",
            "Read tension and ease across the day.",
            BadgeTier::Intermediate,
            30,
            vec![scale("tension", "How tense is your body today?", 1, 10, true)],
        ),
        module(
            "open_awareness",
            "Open Awareness",
            "Rest in awareness without an object.",
            BadgeTier::Advanced,
            50,
            vec![
                scale("stillness", "How still did your mind feel?", 1, 10, true),
                text("insight", "What insight stayed with you?", 1000, false),
            ],
        ),
    ];
    push_island(
        &mut islands,
        &mut modules,
        "mindful_island",
        "Island of Mindfulness",
        "Train attention and presence.",
        "lotus",
        Category::Mindfulness,
        &mindful,
    );

    let focus = [
        module(
            "priorities",
            "Finding Priorities",
            "Separate the important from the urgent.",
            BadgeTier::Beginner,
            20,
            vec![
                checkbox(
                    "time_sinks",
                    "Where does your time leak?",
                    &["email", "meetings", "social media", "context switching"],
                    3,
                    true,
                ),
                scale("clarity", "How clear are your priorities?", 1, 10, true),
            ],
        ),
        module(
            "deep_focus",
            "Deep Focus",
            "Protect long, undisturbed blocks of work.",
            BadgeTier::Beginner,
            20,
            vec![choice(
                "focus_window",
                "When do you focus best?",
                &["morning", "afternoon", "evening"],
                true,
            )],
        ),
        module(
            "energy_management",
            "Managing Energy",
            "Plan work around energy, not just time.",
            BadgeTier::Intermediate,
            30,
            vec![
                scale("energy", "How is your energy today?", 1, 10, true),
                text("recharge", "What recharges you?", 300, false),
            ],
        ),
        module(
            "purposeful_work",
            "Purposeful Work",
            "Connect daily tasks to what matters to you.",
            BadgeTier::Advanced,
            50,
            vec![text(
                "purpose_statement",
                "Write one sentence about why your work matters.",
                280,
                true,
            )],
        ),
    ];
    push_island(
        &mut islands,
        &mut modules,
        "focus_island",
        "Island of Focus",
        "Build habits for meaningful productivity.",
        "compass",
        Category::Productivity,
        &focus,
    );

    let calm = [
        module(
            "stress_triggers",
            "Knowing Your Triggers",
            "Map the situations that raise your stress.",
            BadgeTier::Beginner,
            20,
            vec![
                checkbox(
                    "triggers",
                    "Which situations stress you most?",
                    &["deadlines", "conflict", "uncertainty", "crowds"],
                    2,
                    true,
                ),
                scale("stress_level", "How stressed are you this week?", 1, 10, true),
            ],
        ),
        module(
            "calming_breath",
            "Calming Breath",
            "Use the exhale to settle the nervous system.",
            BadgeTier::Beginner,
            20,
            vec![scale("after_breath", "How do you feel after three slow breaths?", 1, 10, true)],
        ),
        module(
            "reframing",
            "Reframing Thoughts",
            "Question the stories stress tells you.",
            BadgeTier::Intermediate,
            30,
            vec![
                text("stressful_thought", "Write down a stressful thought.", 300, true),
                text("reframe", "How else could you see it?", 300, true),
            ],
        ),
        module(
            "resilience",
            "Building Resilience",
            "Recover faster from setbacks.",
            BadgeTier::Advanced,
            50,
            vec![choice(
                "support",
                "Who do you turn to when things get hard?",
                &["family", "friends", "colleagues", "nobody yet"],
                true,
            )],
        ),
    ];
    push_island(
        &mut islands,
        &mut modules,
        "calm_island",
        "Island of Calm",
        "Understand and soften stress.",
        "wave",
        Category::Stress,
        &calm,
    );

    let harmony = [
        module(
            "life_wheel",
            "Wheel of Life",
            "Rate the areas of your life side by side.",
            BadgeTier::Beginner,
            20,
            vec![
                scale("work_satisfaction", "How satisfied are you with work?", 1, 10, true),
                scale("health_satisfaction", "How satisfied are you with your health?", 1, 10, true),
                scale(
                    "relationships_satisfaction",
                    "How satisfied are you with your relationships?",
                    1,
                    10,
                    true,
                ),
            ],
        ),
        module(
            "boundaries",
            "Healthy Boundaries",
            "Say no so you can say yes.",
            BadgeTier::Intermediate,
            30,
            vec![choice(
                "hardest_no",
                "Where is it hardest to say no?",
                &["work", "family", "friends"],
                true,
            )],
        ),
        module(
            "ikigai_map",
            "Your Ikigai Map",
            "Find where love, skill, need and reward meet.",
            BadgeTier::Advanced,
            50,
            vec![
                text("love", "What do you love?", 200, true),
                text("good_at", "What are you good at?", 200, true),
                text("world_needs", "What does the world need from you?", 200, true),
                text("paid_for", "What can you be paid for?", 200, true),
            ],
        ),
    ];
    push_island(
        &mut islands,
        &mut modules,
        "harmony_island",
        "Island of Harmony",
        "Balance work, rest and relationships.",
        "yin-yang",
        Category::Balance,
        &harmony,
    );

    let challenges = vec![
        challenge(
            "gratitude_practice",
            "Gratitude Practice",
            "Write down three things you are grateful for.",
            Category::Mindfulness,
            15,
            5,
        ),
        challenge(
            "digital_detox",
            "Digital Detox",
            "Spend two hours without screens.",
            Category::Balance,
            30,
            120,
        ),
        challenge(
            "single_tasking",
            "Single-Tasking Hour",
            "Work on one task for an hour with notifications off.",
            Category::Productivity,
            25,
            60,
        ),
        challenge(
            "worry_journal",
            "Worry Journal",
            "Give your worries ten minutes on paper, then close the notebook.",
            Category::Stress,
            15,
            10,
        ),
        challenge(
            "nature_walk",
            "Nature Walk",
            "Walk outside for twenty minutes and notice five things.",
            Category::Balance,
            20,
            20,
        ),
        challenge(
            "kind_message",
            "Kind Message",
            "Send an unexpected thank-you to someone.",
            Category::Mindfulness,
            10,
            5,
        ),
    ];

    let exercises = vec![
        exercise(
            "box_breathing",
            "Box Breathing",
            "Inhale, hold, exhale, hold: four counts each.",
            Category::Stress,
            5,
            3,
        ),
        exercise(
            "body_scan",
            "Body Scan",
            "Move attention slowly from feet to head.",
            Category::Mindfulness,
            10,
            10,
        ),
        exercise(
            "five_senses",
            "Five Senses Grounding",
            "Name five things you see, four you hear, three you feel.",
            Category::Stress,
            5,
            2,
        ),
        exercise(
            "desk_stretch",
            "Desk Stretch",
            "Loosen neck, shoulders and wrists.",
            Category::Balance,
            5,
            3,
        ),
        exercise(
            "pomodoro_sprint",
            "Pomodoro Sprint",
            "Twenty-five minutes of focus, then five of rest.",
            Category::Productivity,
            10,
            30,
        ),
    ];

    Catalog::new(islands, modules, challenges, exercises)
}

struct ModuleSeed {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    tier: BadgeTier,
    points: u32,
    questions: Vec<Question>,
}

#[allow(clippy::too_many_arguments)]
fn push_island(
    islands: &mut Vec<Island>,
    modules: &mut Vec<Module>,
    id: &str,
    title: &str,
    description: &str,
    icon: &str,
    category: Category,
    seeds: &[ModuleSeed],
) {
    let mut badges = BTreeMap::new();
    for tier in [BadgeTier::Beginner, BadgeTier::Intermediate, BadgeTier::Advanced] {
        if seeds.iter().any(|seed| seed.tier == tier) {
            badges.insert(
                tier,
                BadgeDefinition {
                    id: format!("{}_{}", id, tier.as_str()),
                    name: format!("{} {}", title, tier_title(tier)),
                    description: format!(
                        "Completed every {} module of the {}",
                        tier.as_str(),
                        title
                    ),
                },
            );
        }
    }

    islands.push(Island {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        category,
        points: 0,
        module_ids: seeds.iter().map(|seed| seed.id.to_string()).collect(),
        badges,
    });

    modules.extend(seeds.iter().map(|seed| Module {
        id: seed.id.to_string(),
        island_id: id.to_string(),
        title: seed.title.to_string(),
        description: seed.description.to_string(),
        icon: icon.to_string(),
        category,
        points: seed.points,
        tier: seed.tier,
        questions: seed.questions.clone(),
    }));
}

fn tier_title(tier: BadgeTier) -> &'static str {
    match tier {
        BadgeTier::Beginner => "Explorer",
        BadgeTier::Intermediate => "Practitioner",
        BadgeTier::Advanced => "Master",
    }
}

fn module(
    id: &'static str,
    title: &'static str,
    description: &'static str,
    tier: BadgeTier,
    points: u32,
    questions: Vec<Question>,
) -> ModuleSeed {
    ModuleSeed {
        id,
        title,
        description,
        tier,
        points,
        questions,
    }
}

fn scale(id: &str, prompt: &str, min: i64, max: i64, required: bool) -> Question {
    question(id, prompt, required, QuestionKind::Scale { min, max })
}

fn choice(id: &str, prompt: &str, options: &[&str], required: bool) -> Question {
    question(
        id,
        prompt,
        required,
        QuestionKind::MultipleChoice {
            options: options.iter().map(|o| o.to_string()).collect(),
        },
    )
}

fn checkbox(
    id: &str,
    prompt: &str,
    options: &[&str],
    max_selectable: usize,
    required: bool,
) -> Question {
    question(
        id,
        prompt,
        required,
        QuestionKind::Checkbox {
            options: options.iter().map(|o| o.to_string()).collect(),
            max_selectable,
        },
    )
}

fn text(id: &str, prompt: &str, max_length: usize, required: bool) -> Question {
    question(id, prompt, required, QuestionKind::Text { max_length })
}

fn question(id: &str, prompt: &str, required: bool, kind: QuestionKind) -> Question {
    Question {
        id: id.to_string(),
        prompt: prompt.to_string(),
        required,
        kind,
    }
}

fn challenge(
    id: &str,
    title: &str,
    description: &str,
    category: Category,
    points: u32,
    duration_minutes: u32,
) -> Challenge {
    Challenge {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon: id.to_string(),
        category,
        points,
        duration_minutes,
    }
}

fn exercise(
    id: &str,
    title: &str,
    description: &str,
    category: Category,
    points: u32,
    duration_minutes: u32,
) -> Exercise {
    Exercise {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon: id.to_string(),
        category,
        points,
        duration_minutes,
    }
}
