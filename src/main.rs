use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;
use std::env;
use std::fs;

use citeswap::config::Config;
use citeswap::game::Phase;
use citeswap::logging::{info, obj, v_str, Domain};
use citeswap::mutate::render_with_report;
use citeswap::records::SubstitutionRecord;
use citeswap::score::score;
use citeswap::select::select;
use citeswap::storage::GameStore;
use citeswap::store::ReferenceDataStore;

const USAGE: &str = "usage: citeswap <command>
  briefs                        list available briefs
  render <brief_id> <swaps.json> render a brief with substitutions applied
  select <brief_id> [count]     pick a balanced random substitution set
  score <game_id>               score a game from the sqlite store";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let args: Vec<String> = env::args().skip(1).collect();
    let store = ReferenceDataStore::global(&cfg.data_dir);
    info(
        Domain::System,
        "start",
        obj(&[
            ("command", v_str(args.first().map(String::as_str).unwrap_or(""))),
            ("data_dir", v_str(&cfg.data_dir.to_string_lossy())),
        ]),
    );

    match args.first().map(String::as_str) {
        Some("briefs") => print_json(&store.list_briefs()?),
        Some("render") => {
            let (brief_id, swaps_path) = match (args.get(1), args.get(2)) {
                (Some(b), Some(s)) => (b, s),
                _ => bail!("{}", USAGE),
            };
            let raw = fs::read_to_string(swaps_path)
                .with_context(|| format!("cannot read substitutions {}", swaps_path))?;
            let swaps: Vec<SubstitutionRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("malformed substitutions {}", swaps_path))?;
            let document = store.document(brief_id)?;
            let catalog = store.catalog(brief_id)?;
            let (rendered, report) = render_with_report(&document, &catalog, &swaps);
            print_json(&json!({ "brief": rendered, "report": report }))
        }
        Some("select") => {
            let brief_id = args.get(1).cloned().unwrap_or_else(|| cfg.default_brief.clone());
            let count = match args.get(2) {
                Some(n) => n.parse::<usize>().map_err(|_| anyhow!("count must be a number: {}", n))?,
                None => cfg.default_swap_count,
            };
            let catalog = store.catalog(&brief_id)?;
            let mut rng = match cfg.select_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            print_json(&select(&catalog, count, &mut rng))
        }
        Some("score") => {
            let game_id = args.get(1).ok_or_else(|| anyhow!("{}", USAGE))?;
            let mut db = GameStore::new(&cfg.sqlite_path)?;
            db.init()?;
            let game = db.get_game(game_id)?.ok_or_else(|| anyhow!("game not found: {}", game_id))?;
            if !game.phase.is_scorable() {
                bail!("game {} is in {} phase; scores are shown at {}", game_id, game.phase, Phase::Reveal);
            }
            let brief_id = game.brief_id.clone().unwrap_or_else(|| cfg.default_brief.clone());
            let document = store.document(&brief_id)?;
            let catalog = store.catalog(&brief_id)?;
            let teams = db.teams(game_id)?;
            let board = score(
                &teams,
                &db.swaps_by_team(game_id)?,
                &db.flags_by_team(game_id)?,
                &document,
                &catalog,
            );
            info(
                Domain::Score,
                "scoreboard",
                obj(&[("game_id", v_str(game_id)), ("brief_id", v_str(&brief_id))]),
            );
            print_json(&board)
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}
