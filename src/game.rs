//! Round lifecycle and team pairing.
//!
//! ```text
//! lobby ──► fabrication ──► verification ──► reveal
//!   ▲                                          │
//!   └──────────────── reset ◄──────────────────┘
//! ```
//! Substitutions are recorded only during fabrication, flags only during
//! verification, and the scoreboard is shown only at reveal.

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::logging::{info, obj, v_num, v_str, Domain};
use crate::records::Team;

pub const GAME_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const GAME_CODE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Fabrication,
    Verification,
    Reveal,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Fabrication => "fabrication",
            Phase::Verification => "verification",
            Phase::Reveal => "reveal",
        }
    }

    /// Forward transition; `None` at reveal (only a reset leaves it).
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Lobby => Some(Phase::Fabrication),
            Phase::Fabrication => Some(Phase::Verification),
            Phase::Verification => Some(Phase::Reveal),
            Phase::Reveal => None,
        }
    }

    pub fn reset(&self) -> Phase {
        Phase::Lobby
    }

    pub fn accepts_substitutions(&self) -> bool {
        *self == Phase::Fabrication
    }

    pub fn accepts_flags(&self) -> bool {
        *self == Phase::Verification
    }

    pub fn is_scorable(&self) -> bool {
        *self == Phase::Reveal
    }

    /// Validate a requested move to `to`.
    pub fn transition(&self, to: Phase) -> Result<Phase> {
        if to == Phase::Lobby || self.next() == Some(to) {
            return Ok(to);
        }
        bail!("illegal phase transition {} -> {}", self, to)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lobby" => Ok(Phase::Lobby),
            "fabrication" => Ok(Phase::Fabrication),
            "verification" => Ok(Phase::Verification),
            "reveal" => Ok(Phase::Reveal),
            other => bail!("unknown phase: {}", other),
        }
    }
}

/// Pair teams in a cycle: team *i* verifies the work of team *i − 1*.
pub fn assign_fabrication_teams(teams: &mut [Team]) -> Result<()> {
    let n = teams.len();
    if n < 2 {
        bail!("need at least 2 teams, have {}", n);
    }
    let ids: Vec<String> = teams.iter().map(|t| t.team_id.clone()).collect();
    for (i, team) in teams.iter_mut().enumerate() {
        let source = &ids[(i + n - 1) % n];
        team.fabrication_team = Some(source.clone());
        info(
            Domain::Game,
            "paired",
            obj(&[
                ("team_id", v_str(&team.team_id)),
                ("verifies", v_str(source)),
                ("position", v_num(i as f64)),
            ]),
        );
    }
    Ok(())
}

/// RFC3339 deadline `minutes` from now.
pub fn timer_end(minutes: i64) -> String {
    (Utc::now() + Duration::minutes(minutes)).to_rfc3339()
}

/// Six-character join code without ambiguous glyphs (no I, O, 0, 1).
pub fn generate_game_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GAME_CODE_LEN)
        .map(|_| GAME_CODE_ALPHABET[rng.gen_range(0..GAME_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_phase_cycle() {
        assert_eq!(Phase::Lobby.next(), Some(Phase::Fabrication));
        assert_eq!(Phase::Fabrication.next(), Some(Phase::Verification));
        assert_eq!(Phase::Verification.next(), Some(Phase::Reveal));
        assert_eq!(Phase::Reveal.next(), None);
        assert_eq!(Phase::Verification.reset(), Phase::Lobby);
    }

    #[test]
    fn test_phase_gates() {
        assert!(Phase::Fabrication.accepts_substitutions());
        assert!(!Phase::Verification.accepts_substitutions());
        assert!(Phase::Verification.accepts_flags());
        assert!(!Phase::Reveal.accepts_flags());
        assert!(Phase::Reveal.is_scorable());
        assert!(!Phase::Lobby.is_scorable());
    }

    #[test]
    fn test_transition_rules() {
        assert_eq!(Phase::Lobby.transition(Phase::Fabrication).unwrap(), Phase::Fabrication);
        assert!(Phase::Lobby.transition(Phase::Reveal).is_err());
        assert!(Phase::Reveal.transition(Phase::Fabrication).is_err());
        assert_eq!(Phase::Reveal.transition(Phase::Lobby).unwrap(), Phase::Lobby);
    }

    #[test]
    fn test_phase_string_round_trip() {
        for p in [Phase::Lobby, Phase::Fabrication, Phase::Verification, Phase::Reveal] {
            assert_eq!(p.as_str().parse::<Phase>().unwrap(), p);
        }
        assert!("intermission".parse::<Phase>().is_err());
    }

    #[test]
    fn test_three_team_rotation() {
        let mut teams = vec![Team::new("a", "Team A"), Team::new("b", "Team B"), Team::new("c", "Team C")];
        assign_fabrication_teams(&mut teams).unwrap();
        assert_eq!(teams[0].fabrication_team.as_deref(), Some("c"));
        assert_eq!(teams[1].fabrication_team.as_deref(), Some("a"));
        assert_eq!(teams[2].fabrication_team.as_deref(), Some("b"));
    }

    #[test]
    fn test_rotation_needs_two_teams() {
        let mut teams = vec![Team::new("a", "Team A")];
        assert!(assign_fabrication_teams(&mut teams).is_err());
        assert!(teams[0].fabrication_team.is_none());
    }

    #[test]
    fn test_game_code_alphabet() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let code = generate_game_code(&mut rng);
            assert_eq!(code.len(), GAME_CODE_LEN);
            assert!(code.bytes().all(|b| GAME_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_timer_end_is_in_future() {
        let end = DateTime::parse_from_rfc3339(&timer_end(20)).unwrap();
        let delta = end.with_timezone(&Utc) - Utc::now();
        assert!(delta > Duration::minutes(19));
        assert!(delta <= Duration::minutes(20));
    }
}
