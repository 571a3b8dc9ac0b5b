//! Random substitution sets, balanced across hallucination types.
//!
//! Each type gets its own shuffled pool of `(citation, option)` candidates.
//! Types are visited round-robin in [`HallucinationType::ALL`] order, each
//! visit taking the next candidate whose citation is still unused. Balance
//! comes from the fixed cycling order; randomness from the pool contents.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::catalog::{Catalog, HallucinationType};
use crate::logging::{debug, obj, v_num, Domain};
use crate::records::SubstitutionRecord;

struct Pool<'c> {
    kind: HallucinationType,
    candidates: Vec<(&'c str, &'c str)>,
    cursor: usize,
}

impl<'c> Pool<'c> {
    /// Advance past used citations; take the first unused one.
    fn take_unused(&mut self, used: &HashSet<&'c str>) -> Option<(&'c str, &'c str)> {
        while self.cursor < self.candidates.len() {
            let candidate = self.candidates[self.cursor];
            self.cursor += 1;
            if !used.contains(candidate.0) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Pick up to `count` substitutions, never two for the same citation.
pub fn select<R: Rng + ?Sized>(catalog: &Catalog, count: usize, rng: &mut R) -> Vec<SubstitutionRecord> {
    let mut pools: Vec<Pool> = HallucinationType::ALL
        .iter()
        .map(|&kind| {
            let mut candidates: Vec<(&str, &str)> = catalog
                .triples_of(kind)
                .into_iter()
                .map(|(cid, opt)| (cid, opt.id.as_str()))
                .collect();
            candidates.shuffle(&mut *rng);
            Pool {
                kind,
                candidates,
                cursor: 0,
            }
        })
        .collect();

    let mut used: HashSet<&str> = HashSet::new();
    let mut picked = Vec::new();

    'cycle: while picked.len() < count {
        let mut progressed = false;
        for pool in pools.iter_mut() {
            if picked.len() >= count {
                break 'cycle;
            }
            if let Some((cid, oid)) = pool.take_unused(&used) {
                used.insert(cid);
                picked.push(SubstitutionRecord::new(cid, pool.kind, oid));
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    debug(
        Domain::Select,
        "selected",
        obj(&[
            ("requested", v_num(count as f64)),
            ("picked", v_num(picked.len() as f64)),
        ]),
    );
    picked
}
