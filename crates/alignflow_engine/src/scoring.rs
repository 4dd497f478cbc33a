//! Weighted score rollups and grade bands.
//!
//! All functions here are pure. Scores are rounded to one decimal at each
//! rollup step, so `rollup_objectives` on unchanged inputs always yields the
//! same total.

use crate::model::{Grade, KeyResult, Objective, Okr};
use serde::{Deserialize, Serialize};

/// One grade band; `max_score` is inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub grade: Grade,
    pub min_score: f64,
    pub max_score: f64,
    /// Target share of the population, percent
    #[serde(default)]
    pub quota: f64,
    #[serde(default)]
    pub description: String,
}

impl GradeBand {
    pub fn new(grade: Grade, min_score: f64, max_score: f64) -> Self {
        Self {
            grade,
            min_score,
            max_score,
            quota: 0.0,
            description: String::new(),
        }
    }

    pub fn with_quota(mut self, quota: f64) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min_score && score <= self.max_score
    }
}

/// Ordered grade configuration with a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBands {
    #[serde(default = "default_fallback_grade")]
    pub fallback_grade: Grade,
    #[serde(default = "default_bands")]
    pub bands: Vec<GradeBand>,
}

fn default_fallback_grade() -> Grade {
    Grade::B
}

fn default_bands() -> Vec<GradeBand> {
    vec![
        GradeBand::new(Grade::S, 100.0, 120.0)
            .with_quota(20.0)
            .with_description("Outstanding: far exceeded expectations"),
        GradeBand::new(Grade::A, 90.0, 99.0)
            .with_quota(60.0)
            .with_description("Excellent: exceeded expectations"),
        GradeBand::new(Grade::B, 70.0, 89.0)
            .with_quota(15.0)
            .with_description("Good: met expectations"),
        GradeBand::new(Grade::C, 0.0, 69.0)
            .with_quota(5.0)
            .with_description("Needs improvement"),
    ]
}

impl Default for GradeBands {
    fn default() -> Self {
        Self {
            fallback_grade: default_fallback_grade(),
            bands: default_bands(),
        }
    }
}

impl GradeBands {
    pub fn new(bands: Vec<GradeBand>, fallback_grade: Grade) -> Self {
        Self {
            fallback_grade,
            bands,
        }
    }

    /// Grade of the first band containing `score`, else the fallback.
    pub fn determine_grade(&self, score: f64) -> Grade {
        determine_grade(score, &self.bands, self.fallback_grade)
    }
}

/// Grade of the first band in `bands` whose inclusive range holds `score`.
pub fn determine_grade(score: f64, bands: &[GradeBand], fallback: Grade) -> Grade {
    bands
        .iter()
        .find(|band| band.contains(score))
        .map(|band| band.grade)
        .unwrap_or(fallback)
}

// ============================================================================
// Rollups
// ============================================================================

/// Which score column a rollup reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    SelfAssessed,
    Manager,
}

fn kr_score(kr: &KeyResult, source: ScoreSource) -> f64 {
    match source {
        ScoreSource::SelfAssessed => kr.self_score,
        ScoreSource::Manager => kr.manager_score,
    }
    .unwrap_or(0.0)
}

fn objective_score(objective: &Objective, source: ScoreSource) -> f64 {
    match source {
        ScoreSource::SelfAssessed => objective.self_score,
        ScoreSource::Manager => objective.manager_score,
    }
    .unwrap_or(0.0)
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Objective score: sum of key result scores weighted by key result weight.
pub fn rollup_key_results(objective: &Objective, source: ScoreSource) -> f64 {
    round1(
        objective
            .key_results
            .iter()
            .map(|kr| kr_score(kr, source) * kr.weight / 100.0)
            .sum(),
    )
}

/// Total score: sum of objective scores weighted by objective weight.
pub fn rollup_objectives(okr: &Okr, source: ScoreSource) -> f64 {
    round1(
        okr.objectives
            .iter()
            .map(|o| objective_score(o, source) * o.weight / 100.0)
            .sum(),
    )
}

/// Recompute objective self scores and the overall self score.
pub fn refresh_self_scores(okr: &mut Okr) {
    for objective in &mut okr.objectives {
        objective.self_score = Some(rollup_key_results(objective, ScoreSource::SelfAssessed));
    }
    let total = rollup_objectives(okr, ScoreSource::SelfAssessed);
    okr.overall_self_assessment
        .get_or_insert_with(Default::default)
        .score = total;
}

/// Recompute one objective's manager score from its key results.
pub fn refresh_objective_manager_score(objective: &mut Objective) {
    objective.manager_score = Some(rollup_key_results(objective, ScoreSource::Manager));
}

/// Recompute total, grade and overall manager score from objective scores.
pub fn refresh_manager_total(okr: &mut Okr, bands: &GradeBands) {
    let total = rollup_objectives(okr, ScoreSource::Manager);
    okr.total_score = Some(total);
    okr.final_grade = Some(bands.determine_grade(total));
    okr.overall_manager_assessment
        .get_or_insert_with(Default::default)
        .score = total;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeyResult, Objective, OkrLevel, User};
    use crate::role::Role;
    use alignflow_ids::UserId;

    fn example_bands() -> Vec<GradeBand> {
        vec![
            GradeBand::new(Grade::S, 90.0, 100.0),
            GradeBand::new(Grade::A, 80.0, 89.0),
            GradeBand::new(Grade::B, 0.0, 79.0),
        ]
    }

    #[test]
    fn test_determine_grade_bands() {
        let bands = example_bands();
        assert_eq!(determine_grade(95.0, &bands, Grade::C), Grade::S);
        assert_eq!(determine_grade(80.0, &bands, Grade::C), Grade::A);
        assert_eq!(determine_grade(10.0, &bands, Grade::C), Grade::B);
        assert_eq!(determine_grade(200.0, &bands, Grade::C), Grade::C);
    }

    #[test]
    fn test_first_matching_band_wins_on_overlap() {
        let bands = vec![
            GradeBand::new(Grade::A, 80.0, 100.0),
            GradeBand::new(Grade::S, 90.0, 100.0),
        ];
        assert_eq!(determine_grade(95.0, &bands, Grade::B), Grade::A);
    }

    #[test]
    fn test_gap_uses_fallback() {
        let bands = GradeBands::default();
        // 99.5 sits between the A and S bands
        assert_eq!(bands.determine_grade(99.5), Grade::B);
        assert_eq!(bands.determine_grade(95.0), Grade::A);
    }

    fn scored_okr() -> Okr {
        let owner = User::new(UserId::parse("u1").unwrap(), "Li", Role::RdEmployee, "Crypto");
        let mut okr = Okr::draft(&owner, OkrLevel::Personal);

        let mut kr1 = KeyResult::new("Latency", 70.0);
        kr1.manager_score = Some(90.0);
        kr1.self_score = Some(100.0);
        let mut kr2 = KeyResult::new("Coverage", 30.0);
        kr2.manager_score = Some(75.0);
        kr2.self_score = Some(80.0);
        let mut kr3 = KeyResult::new("Docs", 100.0);
        kr3.manager_score = Some(66.6);

        okr.objectives.push(
            Objective::new("Performance", 60.0)
                .with_key_result(kr1)
                .with_key_result(kr2),
        );
        okr.objectives
            .push(Objective::new("Knowledge", 40.0).with_key_result(kr3));
        okr
    }

    #[test]
    fn test_rollup_key_results() {
        let okr = scored_okr();
        // 90*0.7 + 75*0.3 = 85.5
        assert_eq!(rollup_key_results(&okr.objectives[0], ScoreSource::Manager), 85.5);
        // 100*0.7 + 80*0.3 = 94
        assert_eq!(
            rollup_key_results(&okr.objectives[0], ScoreSource::SelfAssessed),
            94.0
        );
        // unscored key results count as zero
        assert_eq!(
            rollup_key_results(&okr.objectives[1], ScoreSource::SelfAssessed),
            0.0
        );
    }

    #[test]
    fn test_manager_total_is_idempotent() {
        let mut okr = scored_okr();
        for objective in &mut okr.objectives {
            refresh_objective_manager_score(objective);
        }
        let bands = GradeBands::default();
        refresh_manager_total(&mut okr, &bands);
        let first = okr.total_score;

        refresh_manager_total(&mut okr, &bands);
        assert_eq!(okr.total_score, first);
        // 85.5*0.6 + 66.6*0.4 = 51.3 + 26.64 = 77.94
        assert_eq!(first, Some(77.9));
        assert_eq!(okr.final_grade, Some(Grade::B));
        assert_eq!(
            okr.overall_manager_assessment.as_ref().map(|a| a.score),
            Some(77.9)
        );
    }

    #[test]
    fn test_refresh_self_scores() {
        let mut okr = scored_okr();
        refresh_self_scores(&mut okr);
        assert_eq!(okr.objectives[0].self_score, Some(94.0));
        assert_eq!(okr.objectives[1].self_score, Some(0.0));
        // 94*0.6 = 56.4
        assert_eq!(
            okr.overall_self_assessment.as_ref().map(|a| a.score),
            Some(56.4)
        );
    }
}
