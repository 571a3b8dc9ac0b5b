//! Scoreboard for the reveal phase.
//!
//! | side         | outcome                         | points |
//! |--------------|---------------------------------|--------|
//! | fabrication  | substitution flagged `fake`     | 0      |
//! | fabrication  | flagged `legit` or not flagged  | +2     |
//! | verification | `fake` on a substituted cite    | +2     |
//! | verification | `fake` on an untouched cite     | -1     |
//! | verification | `legit` or skipped              | 0      |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::brief::Document;
use crate::catalog::Catalog;
use crate::logging::{info, obj, v_num, v_str, Domain, ProfileScope};
use crate::records::{FlagRecord, SubstitutionRecord, Team, Verdict};

pub const UNDETECTED_POINTS: i64 = 2;
pub const CORRECT_FLAG_POINTS: i64 = 2;
pub const WRONG_FLAG_POINTS: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricationDetail {
    pub citation_id: String,
    pub hallucination_type: String,
    pub option_label: String,
    pub caught: bool,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDetail {
    pub citation_id: String,
    pub verdict: Verdict,
    pub is_fake: bool,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScore {
    pub team_name: String,
    pub fabrication_score: i64,
    pub verification_score: i64,
    pub total_score: i64,
    pub fabrication_details: Vec<FabricationDetail>,
    pub verification_details: Vec<VerificationDetail>,
    pub swaps_made: usize,
    pub flags_made: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStats {
    pub total: u32,
    pub caught: u32,
    /// Percentage caught, rounded half to even; 0 when nothing was planted.
    pub detection_rate: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub scores: BTreeMap<String, TeamScore>,
    pub type_stats: BTreeMap<String, TypeStats>,
}

/// Points for one verification call.
pub fn verification_points(verdict: Verdict, is_fake: bool) -> i64 {
    match (verdict, is_fake) {
        (Verdict::Fake, true) => CORRECT_FLAG_POINTS,
        (Verdict::Fake, false) => WRONG_FLAG_POINTS,
        (Verdict::Legit, _) | (Verdict::Skip, _) => 0,
    }
}

/// Points for one planted substitution given the verifier's call.
pub fn fabrication_points(verifier_verdict: Verdict) -> i64 {
    if verifier_verdict == Verdict::Fake {
        0
    } else {
        UNDETECTED_POINTS
    }
}

pub fn detection_rate(caught: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (caught as f64 / total as f64 * 100.0).round_ties_even() as u32
}

fn verdicts(flags: &[FlagRecord]) -> HashMap<&str, Verdict> {
    flags
        .iter()
        .map(|f| (f.citation_id.as_str(), f.verdict))
        .collect()
}

pub fn score(
    teams: &[Team],
    substitutions_by_team: &HashMap<String, Vec<SubstitutionRecord>>,
    flags_by_team: &HashMap<String, Vec<FlagRecord>>,
    document: &Document,
    catalog: &Catalog,
) -> Scoreboard {
    let _scope = ProfileScope::with_context("score", &[("teams", v_num(teams.len() as f64))]);
    let universe = document.citation_ids();
    let no_subs: Vec<SubstitutionRecord> = Vec::new();
    let no_flags: Vec<FlagRecord> = Vec::new();

    let mut board = Scoreboard::default();

    for team in teams {
        let tid = team.team_id.as_str();
        let team_subs = substitutions_by_team.get(tid).unwrap_or(&no_subs);
        let team_flags = flags_by_team.get(tid).unwrap_or(&no_flags);
        let own_verdicts = verdicts(team_flags);

        // calls made on this team's work by whoever verifies it
        let mut verifier_verdicts: HashMap<&str, Verdict> = HashMap::new();
        for other in teams.iter().filter(|t| t.fabrication_team.as_deref() == Some(tid)) {
            if let Some(flags) = flags_by_team.get(&other.team_id) {
                verifier_verdicts.extend(verdicts(flags));
            }
        }

        let fabrication_details: Vec<FabricationDetail> = team_subs
            .iter()
            .map(|s| {
                let verdict = verifier_verdicts
                    .get(s.citation_id.as_str())
                    .copied()
                    .unwrap_or(Verdict::Skip);
                FabricationDetail {
                    citation_id: s.citation_id.clone(),
                    hallucination_type: s.hallucination_type.clone(),
                    option_label: catalog.option_label(&s.citation_id, &s.hallucination_type, &s.option_id),
                    caught: verdict == Verdict::Fake,
                    points: fabrication_points(verdict),
                }
            })
            .collect();

        let planted: Vec<&str> = team
            .fabrication_team
            .as_deref()
            .and_then(|fab| substitutions_by_team.get(fab))
            .map(|subs| subs.iter().map(|s| s.citation_id.as_str()).collect())
            .unwrap_or_default();

        let verification_details: Vec<VerificationDetail> = universe
            .iter()
            .map(|cid| {
                let verdict = own_verdicts.get(cid.as_str()).copied().unwrap_or(Verdict::Skip);
                let is_fake = planted.contains(&cid.as_str());
                VerificationDetail {
                    citation_id: cid.clone(),
                    verdict,
                    is_fake,
                    points: verification_points(verdict, is_fake),
                }
            })
            .collect();

        let fabrication_score: i64 = fabrication_details.iter().map(|d| d.points).sum();
        let verification_score: i64 = verification_details.iter().map(|d| d.points).sum();

        board.scores.insert(
            team.team_id.clone(),
            TeamScore {
                team_name: team.team_name.clone(),
                fabrication_score,
                verification_score,
                total_score: fabrication_score + verification_score,
                fabrication_details,
                verification_details,
                swaps_made: team_subs.len(),
                flags_made: team_flags.iter().filter(|f| f.verdict == Verdict::Fake).count(),
            },
        );
    }

    board.type_stats = type_stats(&board.scores);

    for (tid, s) in &board.scores {
        info(
            Domain::Score,
            "team_scored",
            obj(&[
                ("team_id", v_str(tid)),
                ("fabrication", v_num(s.fabrication_score as f64)),
                ("verification", v_num(s.verification_score as f64)),
                ("total", v_num(s.total_score as f64)),
            ]),
        );
    }
    board
}

/// Detection statistics per hallucination type across every team's plants.
pub fn type_stats(scores: &BTreeMap<String, TeamScore>) -> BTreeMap<String, TypeStats> {
    let mut stats: BTreeMap<String, TypeStats> = BTreeMap::new();
    for detail in scores.values().flat_map(|s| s.fabrication_details.iter()) {
        let entry = stats.entry(detail.hallucination_type.clone()).or_default();
        entry.total += 1;
        if detail.caught {
            entry.caught += 1;
        }
    }
    for entry in stats.values_mut() {
        entry.detection_rate = detection_rate(entry.caught, entry.total);
    }
    stats
}
