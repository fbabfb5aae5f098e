use std::collections::HashSet;

use crate::{
    db::{CompanyStore, WatchlistStore},
    error::AppResult,
    models::Company,
};

/// Maximum number of scored recommendations returned
pub const DEFAULT_LIMIT: usize = 10;

/// Number of companies returned when nothing in the catalog scores above zero
pub const FALLBACK_SIZE: usize = 5;

const FUNDING_ROUND_MATCH: u32 = 2;
const LOCATION_MATCH: u32 = 2;
const LOCATION_PROXIMITY: u32 = 1;

/// Preferences inferred from the companies a user has saved
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile<'a> {
    pub dominant_funding_round: &'a str,
    pub dominant_location: &'a str,
    /// Every saved company's location, duplicates included
    pub all_locations: Vec<&'a str>,
}

impl<'a> UserProfile<'a> {
    /// Builds the profile for a watchlist. Returns `None` for an empty watchlist,
    /// which has no preferences to infer.
    pub fn infer(watchlisted: &'a [Company]) -> Option<Self> {
        let dominant_funding_round =
            dominant_value(watchlisted.iter().map(|c| c.funding_round.as_str()))?;
        let dominant_location = dominant_value(watchlisted.iter().map(|c| c.location.as_str()))?;

        Some(Self {
            dominant_funding_round,
            dominant_location,
            all_locations: watchlisted.iter().map(|c| c.location.as_str()).collect(),
        })
    }

    /// Scores how closely a candidate matches this profile
    ///
    /// An exact location match also satisfies the substring check, so it earns
    /// both bonuses (+3 in total from location).
    pub fn score(&self, candidate: &Company) -> u32 {
        let mut score = 0;

        if candidate.funding_round == self.dominant_funding_round {
            score += FUNDING_ROUND_MATCH;
        }

        if candidate.location == self.dominant_location {
            score += LOCATION_MATCH;
        }

        let location = candidate.location.as_str();
        if location.contains(self.dominant_location)
            || self
                .all_locations
                .iter()
                .any(|saved| location.contains(saved) || saved.contains(location))
        {
            score += LOCATION_PROXIMITY;
        }

        score
    }
}

/// Returns the most frequent value, preferring the one seen first on a tie.
///
/// Counts are kept in first-seen order so the result never depends on hashing.
fn dominant_value<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&'a str, usize)> = Vec::new();

    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&'a str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }

    best.map(|(value, _)| value)
}

/// Ranks unsaved companies by similarity to a user's watchlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationEngine {
    limit: usize,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }

    /// Caps the number of scored recommendations. Does not affect the fallback.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    /// Recommends companies from `candidates` for the owner of `watchlisted`
    ///
    /// `candidates` must already exclude every watchlisted company. Results are
    /// ordered by score, then funding, both descending; only positive scores are
    /// kept. When nothing scores, the best-funded candidates are returned instead.
    pub fn recommend(&self, watchlisted: &[Company], candidates: &[Company]) -> Vec<Company> {
        let Some(profile) = UserProfile::infer(watchlisted) else {
            return Vec::new();
        };

        let mut scored: Vec<(u32, &Company)> = candidates
            .iter()
            .map(|company| (profile.score(company), company))
            .collect();

        // Stable sort: equal (score, funding) keep catalog order
        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .cmp(score_a)
                .then_with(|| b.funding.cmp(&a.funding))
        });

        let recommended: Vec<Company> = scored
            .into_iter()
            .filter(|(score, _)| *score > 0)
            .take(self.limit)
            .map(|(_, company)| company.clone())
            .collect();

        if recommended.is_empty() {
            return top_funded(candidates, FALLBACK_SIZE);
        }

        recommended
    }
}

/// The `n` best-funded companies, funding descending
fn top_funded(companies: &[Company], n: usize) -> Vec<Company> {
    let mut ranked: Vec<&Company> = companies.iter().collect();
    ranked.sort_by(|a, b| b.funding.cmp(&a.funding));
    ranked.into_iter().take(n).cloned().collect()
}

/// Generates recommendations for a user
///
/// Loads the user's watchlist and the catalog, removes saved companies from the
/// catalog to form the candidate set, and runs the engine with default settings.
pub async fn get_recommendations(
    companies: &dyn CompanyStore,
    watchlist: &dyn WatchlistStore,
    user_id: i64,
) -> AppResult<Vec<Company>> {
    let watchlisted = watchlist.list_for_user(user_id).await?;
    if watchlisted.is_empty() {
        tracing::debug!(user_id, "Empty watchlist, no recommendations");
        return Ok(Vec::new());
    }

    let saved_ids: HashSet<i64> = watchlisted.iter().map(|c| c.id).collect();
    let candidates: Vec<Company> = companies
        .list_all()
        .await?
        .into_iter()
        .filter(|c| !saved_ids.contains(&c.id))
        .collect();

    let recommendations = RecommendationEngine::new().recommend(&watchlisted, &candidates);

    tracing::info!(
        user_id,
        watchlist_size = watchlisted.len(),
        candidates = candidates.len(),
        recommended = recommendations.len(),
        "Recommendations generated"
    );

    Ok(recommendations)
}
