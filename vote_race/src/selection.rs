//! Which rounds are played, and which votes still count.
//!
//! A season can leave rounds out of the playback (by name, or all the
//! wildcard rounds at once) and can stop counting the votes an entity
//! receives once it has been eliminated. The number of participating
//! entities of each round is derived from the elimination lists over all
//! the rounds, before any round is left out.

use log::{debug, info};
use std::collections::{HashMap, HashSet};

use crate::config::*;

pub const DEFAULT_KNOCKOUT_MARKER: &str = "淘汰赛";

/// An entity listed as eliminated at the end of a round.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct EliminatedEntity {
    pub entity: String,
    pub group: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundSelection {
    /// Rounds left out of the playback.
    pub excluded_rounds: Vec<String>,
    pub wildcard_rounds: Vec<String>,
    /// Leaves all the wildcard rounds out.
    pub exclude_wildcard: bool,
    /// Drops the votes received from the elimination round on.
    pub exclude_after_elimination: bool,
    /// Eliminated entities, by round name.
    pub eliminated: HashMap<String, Vec<EliminatedEntity>>,
    /// Rounds whose name contains the marker are knockout rounds: the votes
    /// of the elimination round itself still count.
    pub knockout_marker: String,
}

impl Default for RoundSelection {
    fn default() -> Self {
        RoundSelection {
            excluded_rounds: Vec::new(),
            wildcard_rounds: Vec::new(),
            exclude_wildcard: false,
            exclude_after_elimination: false,
            eliminated: HashMap::new(),
            knockout_marker: DEFAULT_KNOCKOUT_MARKER.to_string(),
        }
    }
}

impl RoundSelection {
    pub fn is_selected(&self, round_name: &str) -> bool {
        if self.excluded_rounds.iter().any(|r| r == round_name) {
            return false;
        }
        !(self.exclude_wildcard && self.wildcard_rounds.iter().any(|r| r == round_name))
    }

    /// The rounds to play, in the given order.
    pub fn select_rounds(&self, rounds: &[String]) -> Vec<String> {
        let (kept, dropped): (Vec<String>, Vec<String>) =
            rounds.iter().cloned().partition(|r| self.is_selected(r));
        if !dropped.is_empty() {
            info!("select_rounds: leaving out rounds {:?}", dropped);
        }
        kept
    }

    fn eliminated_in(&self, round_name: &str) -> &[EliminatedEntity] {
        self.eliminated
            .get(round_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn is_eliminated_in(&self, round_name: &str, record: &RawEntityRecord) -> bool {
        self.eliminated_in(round_name)
            .iter()
            .any(|e| e.entity == record.entity && e.group == record.group)
    }

    /// The first round in which the entity is listed as eliminated.
    pub fn elimination_round(&self, record: &RawEntityRecord, rounds: &[String]) -> Option<usize> {
        rounds
            .iter()
            .position(|r| self.is_eliminated_in(r, record))
    }

    /// Removes the votes an entity received after its elimination.
    ///
    /// The elimination round itself is cleared too, unless it is a knockout
    /// round.
    pub fn clear_after_elimination(
        &self,
        records: &[RawEntityRecord],
        rounds: &[String],
    ) -> Vec<RawEntityRecord> {
        records
            .iter()
            .map(|record| {
                let out_at = match self.elimination_round(record, rounds) {
                    Some(idx) => idx,
                    None => return record.clone(),
                };
                let mut res = record.clone();
                for (idx, round_name) in rounds.iter().enumerate() {
                    let is_knockout = round_name.contains(&self.knockout_marker);
                    let cleared = if is_knockout { idx > out_at } else { idx >= out_at };
                    if cleared {
                        res.rounds.insert(round_name.clone(), None);
                    }
                }
                debug!(
                    "clear_after_elimination: {:?} ({:?}) eliminated in {:?}",
                    record.entity, record.group, rounds[out_at]
                );
                res
            })
            .collect()
    }

    /// For each round, the number of entities not eliminated in an earlier
    /// round. Empty when no elimination is known.
    pub fn participating_counts(
        &self,
        records: &[RawEntityRecord],
        rounds: &[String],
    ) -> HashMap<String, u32> {
        if self.eliminated.values().all(|v| v.is_empty()) {
            return HashMap::new();
        }
        let everyone: HashSet<(&str, &str)> = records
            .iter()
            .map(|r| (r.entity.as_str(), r.group.as_str()))
            .collect();
        let mut out: HashSet<(&str, &str)> = HashSet::new();
        let mut res: HashMap<String, u32> = HashMap::new();
        for round_name in rounds.iter() {
            let remaining = everyone.difference(&out).count() as u32;
            res.insert(round_name.clone(), remaining);
            out.extend(
                self.eliminated_in(round_name)
                    .iter()
                    .map(|e| (e.entity.as_str(), e.group.as_str())),
            );
        }
        res
    }
}
