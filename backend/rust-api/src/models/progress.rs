use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::content::{BadgeTier, Challenge, Exercise, Module, ModuleResponses};
use crate::services::content_service::Catalog;

pub const POINTS_PER_LEVEL: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCompletion {
    #[serde(default)]
    pub responses: ModuleResponses,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IslandProgress {
    pub completed_module_count: u32,
    pub progress_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnedBadge {
    pub island_id: String,
    pub tier: BadgeTier,
    pub earned_at: DateTime<Utc>,
}

/// Gamification state of one user.
///
/// Fields are private: completion sets only grow through the `record_*`
/// methods, and `island_progress`/`badges` are only ever written by
/// [`UserProgress::recompute_derived`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProgress {
    total_points: u32,
    streak: u32,
    last_active_date: Option<NaiveDate>,
    completed_modules: BTreeMap<String, ModuleCompletion>,
    completed_challenges: BTreeSet<String>,
    completed_exercises: BTreeSet<String>,
    island_progress: BTreeMap<String, IslandProgress>,
    badges: BTreeMap<String, EarnedBadge>,
    module_responses: BTreeMap<String, ModuleResponses>,
    updated_at: Option<DateTime<Utc>>,
}

impl UserProgress {
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn last_active_date(&self) -> Option<NaiveDate> {
        self.last_active_date
    }

    pub fn completed_modules(&self) -> &BTreeMap<String, ModuleCompletion> {
        &self.completed_modules
    }

    pub fn completed_challenges(&self) -> &BTreeSet<String> {
        &self.completed_challenges
    }

    pub fn completed_exercises(&self) -> &BTreeSet<String> {
        &self.completed_exercises
    }

    pub fn island_progress(&self) -> &BTreeMap<String, IslandProgress> {
        &self.island_progress
    }

    pub fn badges(&self) -> &BTreeMap<String, EarnedBadge> {
        &self.badges
    }

    pub fn module_responses(&self) -> &BTreeMap<String, ModuleResponses> {
        &self.module_responses
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_module_completed(&self, module_id: &str) -> bool {
        self.completed_modules.contains_key(module_id)
    }

    pub fn is_challenge_completed(&self, challenge_id: &str) -> bool {
        self.completed_challenges.contains(challenge_id)
    }

    pub fn level(&self) -> u32 {
        self.total_points / POINTS_PER_LEVEL + 1
    }

    pub fn points_to_next_level(&self) -> u32 {
        POINTS_PER_LEVEL - self.total_points % POINTS_PER_LEVEL
    }

    /// Marks a module complete. Returns `false` when it already was, in
    /// which case only the stored responses are refreshed.
    pub fn record_module_completion(
        &mut self,
        catalog: &Catalog,
        module: &Module,
        responses: ModuleResponses,
        at: DateTime<Utc>,
    ) -> bool {
        self.module_responses
            .insert(module.id.clone(), responses.clone());

        let first_time = !self.completed_modules.contains_key(&module.id);
        if first_time {
            self.completed_modules.insert(
                module.id.clone(),
                ModuleCompletion {
                    responses,
                    completed_at: at,
                },
            );
            self.total_points = self.total_points.saturating_add(module.points);
            self.recompute_derived(catalog);
        }

        self.record_activity(at.date_naive());
        self.updated_at = Some(at);
        first_time
    }

    pub fn record_challenge(&mut self, challenge: &Challenge, at: DateTime<Utc>) -> bool {
        let first_time = self.completed_challenges.insert(challenge.id.clone());
        if first_time {
            self.total_points = self.total_points.saturating_add(challenge.points);
        }
        self.record_activity(at.date_naive());
        self.updated_at = Some(at);
        first_time
    }

    pub fn record_exercise(&mut self, exercise: &Exercise, at: DateTime<Utc>) -> bool {
        let first_time = self.completed_exercises.insert(exercise.id.clone());
        if first_time {
            self.total_points = self.total_points.saturating_add(exercise.points);
        }
        self.record_activity(at.date_naive());
        self.updated_at = Some(at);
        first_time
    }

    /// Draft save; does not touch completion state.
    pub fn save_responses(&mut self, module_id: &str, responses: ModuleResponses, at: DateTime<Utc>) {
        self.module_responses.insert(module_id.to_string(), responses);
        self.updated_at = Some(at);
    }

    /// Session-start streak update. Returns whether anything changed.
    ///
    /// A record without a last-active date is left alone so that brand-new
    /// users keep the zero-value record until they complete something.
    pub fn apply_session_start(&mut self, today: NaiveDate) -> bool {
        let Some(last) = self.last_active_date else {
            return false;
        };
        if today <= last {
            return false;
        }
        self.streak = next_streak(Some(last), self.streak, today);
        self.last_active_date = Some(today);
        true
    }

    fn record_activity(&mut self, today: NaiveDate) {
        match self.last_active_date {
            None => {
                self.streak = 1;
                self.last_active_date = Some(today);
            }
            Some(last) if today > last => {
                self.streak = next_streak(Some(last), self.streak, today);
                self.last_active_date = Some(today);
            }
            Some(_) => {
                self.streak = self.streak.max(1);
            }
        }
    }

    /// Rebuilds `island_progress` and grants any badge whose tier is fully
    /// completed. Badges already present are kept as they are.
    pub fn recompute_derived(&mut self, catalog: &Catalog) {
        let mut island_progress = BTreeMap::new();

        for island in catalog.islands() {
            let completed = island
                .module_ids
                .iter()
                .filter(|id| self.completed_modules.contains_key(id.as_str()))
                .count();
            if completed == 0 {
                continue;
            }

            island_progress.insert(
                island.id.clone(),
                IslandProgress {
                    completed_module_count: completed as u32,
                    progress_percent: progress_percent(completed, island.module_count()),
                },
            );

            for (tier, badge) in &island.badges {
                if self.badges.contains_key(&badge.id) {
                    continue;
                }
                let tier_modules: Vec<&Module> = catalog
                    .modules_of_island(&island.id)
                    .into_iter()
                    .filter(|module| module.tier == *tier)
                    .collect();
                if tier_modules.is_empty() {
                    continue;
                }

                let earned_at = tier_modules
                    .iter()
                    .map(|module| {
                        self.completed_modules
                            .get(&module.id)
                            .map(|completion| completion.completed_at)
                    })
                    .collect::<Option<Vec<_>>>()
                    .and_then(|times| times.into_iter().max());

                if let Some(earned_at) = earned_at {
                    tracing::debug!(badge = %badge.id, island = %island.id, "Badge earned");
                    self.badges.insert(
                        badge.id.clone(),
                        EarnedBadge {
                            island_id: island.id.clone(),
                            tier: *tier,
                            earned_at,
                        },
                    );
                }
            }
        }

        self.island_progress = island_progress;
    }

    /// Combines the remote record with a local record that has writes the
    /// remote store never acknowledged. Applying the merge again with the
    /// same local record yields the same result.
    pub fn merge(remote: &UserProgress, local: &UserProgress, catalog: &Catalog) -> UserProgress {
        let mut merged = remote.clone();
        let mut local_only_points = 0u32;

        for (module_id, completion) in &local.completed_modules {
            match merged.completed_modules.get_mut(module_id) {
                Some(existing) => {
                    if completion.completed_at < existing.completed_at {
                        *existing = completion.clone();
                    }
                }
                None => {
                    local_only_points = local_only_points
                        .saturating_add(catalog.module(module_id).map_or(0, |m| m.points));
                    merged
                        .completed_modules
                        .insert(module_id.clone(), completion.clone());
                }
            }
        }

        for challenge_id in &local.completed_challenges {
            if merged.completed_challenges.insert(challenge_id.clone()) {
                local_only_points = local_only_points
                    .saturating_add(catalog.challenge(challenge_id).map_or(0, |c| c.points));
            }
        }

        for exercise_id in &local.completed_exercises {
            if merged.completed_exercises.insert(exercise_id.clone()) {
                local_only_points = local_only_points
                    .saturating_add(catalog.exercise(exercise_id).map_or(0, |e| e.points));
            }
        }

        for (module_id, responses) in &local.module_responses {
            merged
                .module_responses
                .insert(module_id.clone(), responses.clone());
        }

        for (badge_id, badge) in &local.badges {
            match merged.badges.get_mut(badge_id) {
                Some(existing) if badge.earned_at < existing.earned_at => *existing = badge.clone(),
                Some(_) => {}
                None => {
                    merged.badges.insert(badge_id.clone(), badge.clone());
                }
            }
        }

        merged.total_points = local
            .total_points
            .max(remote.total_points.saturating_add(local_only_points));

        match (remote.last_active_date, local.last_active_date) {
            (Some(r), Some(l)) if l > r => {
                merged.last_active_date = Some(l);
                merged.streak = local.streak;
            }
            (Some(r), Some(l)) if l == r => {
                merged.streak = remote.streak.max(local.streak);
            }
            (None, Some(l)) => {
                merged.last_active_date = Some(l);
                merged.streak = local.streak;
            }
            _ => {}
        }

        merged.updated_at = remote.updated_at.max(local.updated_at);
        merged.recompute_derived(catalog);
        merged
    }
}

/// Streak after visiting on `today`: unchanged on the same day, +1 after
/// exactly one day, back to 1 after a longer gap.
pub fn next_streak(last_active: Option<NaiveDate>, streak: u32, today: NaiveDate) -> u32 {
    let Some(last) = last_active else {
        return 1;
    };
    match (today - last).num_days() {
        days if days <= 0 => streak,
        1 => streak.saturating_add(1),
        _ => 1,
    }
}

/// `round(100 * completed / total)`, half rounding up.
pub fn progress_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * completed + total) / (2 * total)) as u32
}

/// Progress plus computed level information, as returned to clients.
#[derive(Debug, Serialize)]
pub struct ProgressSummary<'a> {
    #[serde(flatten)]
    pub progress: &'a UserProgress,
    pub level: u32,
    pub points_to_next_level: u32,
}

impl<'a> From<&'a UserProgress> for ProgressSummary<'a> {
    fn from(progress: &'a UserProgress) -> Self {
        Self {
            progress,
            level: progress.level(),
            points_to_next_level: progress.points_to_next_level(),
        }
    }
}

/// Body of `POST /progress/modules/{id}/complete`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteModuleRequest {
    pub island_id: String,
    #[serde(default)]
    pub responses: ModuleResponses,
}

/// Body of `PUT /progress/modules/{id}/responses`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveResponsesRequest {
    pub responses: ModuleResponses,
}
