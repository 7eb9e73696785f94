use serde::Serialize;

use crate::models::content::{Challenge, Island, Module};
use crate::models::progress::UserProgress;
use crate::services::content_service::Catalog;

const MAX_MODULES: usize = 2;
const MAX_CHALLENGES: usize = 2;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Recommendations<'a> {
    pub modules: Vec<&'a Module>,
    pub challenges: Vec<&'a Challenge>,
}

/// Picks what to surface next from the user's completion history.
///
/// Users without any island progress get nothing. Otherwise the island
/// furthest along (earliest defined on a tie) supplies up to two unfinished
/// modules, and up to two unfinished challenges are taken from the whole
/// catalog. Both lists keep catalog order.
pub fn recommend<'a>(progress: &UserProgress, catalog: &'a Catalog) -> Recommendations<'a> {
    let Some(focus) = focus_island(progress, catalog) else {
        return Recommendations::default();
    };

    let modules = catalog
        .modules_of_island(&focus.id)
        .into_iter()
        .filter(|module| !progress.is_module_completed(&module.id))
        .take(MAX_MODULES)
        .collect();

    let challenges = catalog
        .challenges()
        .iter()
        .filter(|challenge| !progress.is_challenge_completed(&challenge.id))
        .take(MAX_CHALLENGES)
        .collect();

    Recommendations {
        modules,
        challenges,
    }
}

fn focus_island<'a>(progress: &UserProgress, catalog: &'a Catalog) -> Option<&'a Island> {
    let mut best: Option<(&Island, u32)> = None;
    for island in catalog.islands() {
        let Some(entry) = progress.island_progress().get(&island.id) else {
            continue;
        };
        // Strictly greater keeps the earlier island on a tie.
        if best.map_or(true, |(_, percent)| entry.progress_percent > percent) {
            best = Some((island, entry.progress_percent));
        }
    }
    best.map(|(island, _)| island)
}
