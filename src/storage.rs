use anyhow::{anyhow, bail, Result};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

use crate::brief::Document;
use crate::catalog::Catalog;
use crate::game::{assign_fabrication_teams, generate_game_code, Phase};
use crate::logging::{debug, info, obj, v_num, v_str, Domain};
use crate::mutate::render;
use crate::records::{FlagRecord, SubstitutionRecord, Team, Verdict};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamProgress {
    pub swap_count: usize,
    /// Citations flagged `fake`.
    pub flag_count: usize,
    /// Citations given any verdict.
    pub review_count: usize,
    pub swaps: Vec<SubstitutionRecord>,
    pub flags: Vec<FlagRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub game_id: String,
    pub game_code: String,
    pub phase: Phase,
    pub timer_end: Option<String>,
    pub brief_id: Option<String>,
}

/// SQLite persistence for games, teams and their per-round records.
pub struct GameStore {
    conn: Connection,
}

impl GameStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            BEGIN;
            CREATE TABLE IF NOT EXISTS games (
                game_id TEXT PRIMARY KEY,
                game_code TEXT UNIQUE NOT NULL,
                phase TEXT NOT NULL DEFAULT 'lobby',
                timer_end TEXT,
                brief_id TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS teams (
                team_id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL REFERENCES games(game_id),
                team_name TEXT NOT NULL,
                fabrication_team TEXT,
                position INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS swaps (
                game_id TEXT NOT NULL REFERENCES games(game_id),
                team_id TEXT NOT NULL REFERENCES teams(team_id),
                citation_id TEXT NOT NULL,
                hallucination_type TEXT NOT NULL,
                option_id TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (game_id, team_id, citation_id)
            );
            CREATE TABLE IF NOT EXISTS flags (
                game_id TEXT NOT NULL REFERENCES games(game_id),
                team_id TEXT NOT NULL REFERENCES teams(team_id),
                citation_id TEXT NOT NULL,
                verdict TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (game_id, team_id, citation_id)
            );
            COMMIT;",
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Games
    // -------------------------------------------------------------------------

    pub fn create_game<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Game> {
        let game_id = new_id(rng);
        let game_code = generate_game_code(rng);
        self.conn.execute(
            "INSERT INTO games (game_id, game_code, phase) VALUES (?1, ?2, 'lobby')",
            params![game_id, game_code],
        )?;
        info(
            Domain::Storage,
            "game_created",
            obj(&[("game_id", v_str(&game_id)), ("game_code", v_str(&game_code))]),
        );
        Ok(Game {
            game_id,
            game_code,
            phase: Phase::Lobby,
            timer_end: None,
            brief_id: None,
        })
    }

    pub fn get_game(&self, game_id: &str) -> Result<Option<Game>> {
        self.query_game("WHERE game_id = ?1", game_id)
    }

    /// Join codes are matched case-insensitively.
    pub fn get_game_by_code(&self, code: &str) -> Result<Option<Game>> {
        self.query_game("WHERE game_code = ?1", &code.trim().to_uppercase())
    }

    fn query_game(&self, clause: &str, key: &str) -> Result<Option<Game>> {
        let sql = format!(
            "SELECT game_id, game_code, phase, timer_end, brief_id FROM games {}",
            clause
        );
        let row = self
            .conn
            .query_row(&sql, params![key], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<String>>(4)?,
                ))
            })
            .optional()?;
        row.map(|(game_id, game_code, phase, timer_end, brief_id)| {
            Ok(Game {
                game_id,
                game_code,
                phase: phase.parse()?,
                timer_end,
                brief_id,
            })
        })
        .transpose()
    }

    fn require_game(&self, game_id: &str) -> Result<Game> {
        self.get_game(game_id)?
            .ok_or_else(|| anyhow!("game not found: {}", game_id))
    }

    /// Move the game to `to`, enforcing the phase cycle. Going back to lobby
    /// is a full reset of the round.
    pub fn set_phase(&mut self, game_id: &str, to: Phase, timer_end: Option<&str>) -> Result<()> {
        let game = self.require_game(game_id)?;
        game.phase.transition(to)?;
        if to == Phase::Lobby {
            return self.reset_game(game_id);
        }
        self.conn.execute(
            "UPDATE games SET phase = ?1, timer_end = ?2 WHERE game_id = ?3",
            params![to.as_str(), timer_end, game_id],
        )?;
        info(
            Domain::Game,
            "phase_changed",
            obj(&[
                ("game_id", v_str(game_id)),
                ("from", v_str(game.phase.as_str())),
                ("to", v_str(to.as_str())),
            ]),
        );
        Ok(())
    }

    pub fn set_brief(&mut self, game_id: &str, brief_id: &str) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE games SET brief_id = ?1 WHERE game_id = ?2",
            params![brief_id, game_id],
        )?;
        if n == 0 {
            bail!("game not found: {}", game_id);
        }
        Ok(())
    }

    /// Back to lobby: clears swaps, flags and pairings.
    pub fn reset_game(&mut self, game_id: &str) -> Result<()> {
        self.require_game(game_id)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM swaps WHERE game_id = ?1", params![game_id])?;
        tx.execute("DELETE FROM flags WHERE game_id = ?1", params![game_id])?;
        tx.execute(
            "UPDATE teams SET fabrication_team = NULL WHERE game_id = ?1",
            params![game_id],
        )?;
        tx.execute(
            "UPDATE games SET phase = 'lobby', timer_end = NULL WHERE game_id = ?1",
            params![game_id],
        )?;
        tx.commit()?;
        info(Domain::Game, "reset", obj(&[("game_id", v_str(game_id))]));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Teams
    // -------------------------------------------------------------------------

    pub fn create_team<R: Rng + ?Sized>(&mut self, game_id: &str, team_name: &str, rng: &mut R) -> Result<Team> {
        let team_id = new_id(rng);
        self.conn.execute(
            "INSERT INTO teams (team_id, game_id, team_name, position)
             VALUES (?1, ?2, ?3, (SELECT COUNT(*) FROM teams WHERE game_id = ?2))",
            params![team_id, game_id, team_name],
        )?;
        Ok(Team::new(&team_id, team_name))
    }

    /// Roster in creation order.
    pub fn teams(&self, game_id: &str) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(
            "SELECT team_id, team_name, fabrication_team FROM teams
             WHERE game_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![game_id], |r| {
            Ok(Team {
                team_id: r.get(0)?,
                team_name: r.get(1)?,
                fabrication_team: r.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_fabrication_team(&mut self, team_id: &str, fabrication_team: Option<&str>) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE teams SET fabrication_team = ?1 WHERE team_id = ?2",
            params![fabrication_team, team_id],
        )?;
        if n == 0 {
            bail!("team not found: {}", team_id);
        }
        Ok(())
    }

    /// Assign the rotation for the game's roster and persist it.
    pub fn pair_teams(&mut self, game_id: &str) -> Result<Vec<Team>> {
        let mut teams = self.teams(game_id)?;
        assign_fabrication_teams(&mut teams)?;
        let tx = self.conn.transaction()?;
        for team in &teams {
            tx.execute(
                "UPDATE teams SET fabrication_team = ?1 WHERE team_id = ?2",
                params![team.fabrication_team, team.team_id],
            )?;
        }
        tx.commit()?;
        Ok(teams)
    }

    // -------------------------------------------------------------------------
    // Swaps and flags
    // -------------------------------------------------------------------------

    fn require_phase(&self, game_id: &str, allowed: fn(&Phase) -> bool, what: &str) -> Result<()> {
        let game = self.require_game(game_id)?;
        if !allowed(&game.phase) {
            bail!("cannot record {} during {} phase", what, game.phase);
        }
        Ok(())
    }

    /// Insert or replace the team's substitution for a citation.
    pub fn upsert_swap(&mut self, game_id: &str, team_id: &str, record: &SubstitutionRecord) -> Result<()> {
        self.require_phase(game_id, Phase::accepts_substitutions, "substitutions")?;
        self.conn.execute(
            "INSERT OR REPLACE INTO swaps (game_id, team_id, citation_id, hallucination_type, option_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![game_id, team_id, record.citation_id, record.hallucination_type, record.option_id],
        )?;
        Ok(())
    }

    pub fn delete_swap(&mut self, game_id: &str, team_id: &str, citation_id: &str) -> Result<()> {
        self.require_phase(game_id, Phase::accepts_substitutions, "substitutions")?;
        self.conn.execute(
            "DELETE FROM swaps WHERE game_id = ?1 AND team_id = ?2 AND citation_id = ?3",
            params![game_id, team_id, citation_id],
        )?;
        Ok(())
    }

    pub fn swaps(&self, game_id: &str, team_id: &str) -> Result<Vec<SubstitutionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT citation_id, hallucination_type, option_id FROM swaps
             WHERE game_id = ?1 AND team_id = ?2 ORDER BY created_at, citation_id",
        )?;
        let rows = stmt.query_map(params![game_id, team_id], |r| {
            Ok(SubstitutionRecord {
                citation_id: r.get(0)?,
                hallucination_type: r.get(1)?,
                option_id: r.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Insert or replace the team's verdict for a citation. Only `legit` and
    /// `fake` are stored; an absent row means skip.
    pub fn upsert_flag(&mut self, game_id: &str, team_id: &str, record: &FlagRecord) -> Result<()> {
        if record.verdict == Verdict::Skip {
            bail!("verdict must be legit or fake");
        }
        self.require_phase(game_id, Phase::accepts_flags, "flags")?;
        self.conn.execute(
            "INSERT OR REPLACE INTO flags (game_id, team_id, citation_id, verdict)
             VALUES (?1, ?2, ?3, ?4)",
            params![game_id, team_id, record.citation_id, record.verdict.as_str()],
        )?;
        Ok(())
    }

    pub fn flags(&self, game_id: &str, team_id: &str) -> Result<Vec<FlagRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT citation_id, verdict FROM flags
             WHERE game_id = ?1 AND team_id = ?2 ORDER BY citation_id",
        )?;
        let rows = stmt.query_map(params![game_id, team_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (citation_id, verdict) = row?;
            let verdict = verdict.parse::<Verdict>().map_err(|e| anyhow!(e))?;
            out.push(FlagRecord { citation_id, verdict });
        }
        Ok(out)
    }

    pub fn team(&self, team_id: &str) -> Result<Option<Team>> {
        Ok(self
            .conn
            .query_row(
                "SELECT team_id, team_name, fabrication_team FROM teams WHERE team_id = ?1",
                params![team_id],
                |r| {
                    Ok(Team {
                        team_id: r.get(0)?,
                        team_name: r.get(1)?,
                        fabrication_team: r.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Counts of what a team has recorded so far this round.
    pub fn team_progress(&self, game_id: &str, team_id: &str) -> Result<TeamProgress> {
        let swaps = self.swaps(game_id, team_id)?;
        let flags = self.flags(game_id, team_id)?;
        Ok(TeamProgress {
            swap_count: swaps.len(),
            flag_count: flags.iter().filter(|f| f.verdict == Verdict::Fake).count(),
            review_count: flags.len(),
            swaps,
            flags,
        })
    }

    /// The brief a verifying team reviews: `document` rendered with the
    /// substitutions of the team it verifies. Only available during
    /// verification.
    pub fn verification_view(
        &self,
        game_id: &str,
        team_id: &str,
        document: &Document,
        catalog: &Catalog,
    ) -> Result<Document> {
        let game = self.require_game(game_id)?;
        if !game.phase.accepts_flags() {
            bail!("verification view unavailable during {} phase", game.phase);
        }
        let team = self
            .team(team_id)?
            .ok_or_else(|| anyhow!("team not found: {}", team_id))?;
        let source = team
            .fabrication_team
            .ok_or_else(|| anyhow!("no fabrication team assigned to {}", team.team_name))?;
        let swaps = self.swaps(game_id, &source)?;
        debug(
            Domain::Storage,
            "verification_view",
            obj(&[
                ("game_id", v_str(game_id)),
                ("team_id", v_str(team_id)),
                ("source", v_str(&source)),
                ("swaps", v_num(swaps.len() as f64)),
            ]),
        );
        Ok(render(document, catalog, &swaps))
    }

    pub fn swaps_by_team(&self, game_id: &str) -> Result<HashMap<String, Vec<SubstitutionRecord>>> {
        let mut out = HashMap::new();
        for team in self.teams(game_id)? {
            let swaps = self.swaps(game_id, &team.team_id)?;
            out.insert(team.team_id, swaps);
        }
        Ok(out)
    }

    pub fn flags_by_team(&self, game_id: &str) -> Result<HashMap<String, Vec<FlagRecord>>> {
        let mut out = HashMap::new();
        for team in self.teams(game_id)? {
            let flags = self.flags(game_id, &team.team_id)?;
            out.insert(team.team_id, flags);
        }
        Ok(out)
    }
}

/// Random 128-bit id rendered as hyphenated hex (UUID layout).
fn new_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.gen();
    let h = hex::encode(bytes);
    format!("{}-{}-{}-{}-{}", &h[0..8], &h[8..12], &h[12..16], &h[16..20], &h[20..32])
}
