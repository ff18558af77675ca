pub use crate::config::*;

use log::debug;
use std::collections::HashMap;

use crate::selection::RoundSelection;

/// A builder for assembling the data of a race.
///
/// The vote table is normalized once, when the builder is finalized.
///
/// ```
/// pub use vote_race::builder::RaceBuilder;
/// # use vote_race::RaceErrors;
///
/// let data = RaceBuilder::new()
///     .rounds(&["Round 1".to_string(), "Round 2".to_string()])
///     .add_votes("Anna", "Series A", &[Some(10.0), None])
///     .add_votes("Bob", "Series B", &[Some(4.0), Some(8.0)])
///     .participating("Round 2", 1)
///     .build()?;
///
/// assert_eq!(data.entities[0].entity, "Bob");
/// # Ok::<(), RaceErrors>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RaceBuilder {
    _rounds: Vec<RoundInfo>,
    _records: Vec<RawEntityRecord>,
    _participating: HashMap<String, u32>,
    _milestones: HashMap<String, Vec<MilestoneEvent>>,
    _roster: Vec<RosterEntry>,
    _selection: Option<RoundSelection>,
}

impl RaceBuilder {
    pub fn new() -> RaceBuilder {
        RaceBuilder::default()
    }

    /// Sets the rounds by name, in playback order.
    pub fn rounds(self, names: &[String]) -> RaceBuilder {
        let infos: Vec<RoundInfo> = names.iter().map(|n| RoundInfo::named(n)).collect();
        self.round_infos(&infos)
    }

    /// Sets the rounds with their side information, in playback order.
    pub fn round_infos(self, infos: &[RoundInfo]) -> RaceBuilder {
        RaceBuilder {
            _rounds: infos.to_vec(),
            ..self
        }
    }

    pub fn records(mut self, records: &[RawEntityRecord]) -> RaceBuilder {
        self._records.extend(records.iter().cloned());
        self
    }

    /// Adds the votes of an entity, aligned with the rounds already declared.
    ///
    /// Extra values beyond the declared rounds are ignored.
    pub fn add_votes(mut self, entity: &str, group: &str, votes: &[Option<f64>]) -> RaceBuilder {
        let rounds: HashMap<String, Option<f64>> = self
            ._rounds
            .iter()
            .zip(votes.iter())
            .map(|(r, v)| (r.name.clone(), *v))
            .collect();
        self._records.push(RawEntityRecord {
            entity: entity.to_string(),
            group: group.to_string(),
            rounds,
        });
        self
    }

    pub fn participating(mut self, round_name: &str, count: u32) -> RaceBuilder {
        self._participating.insert(round_name.to_string(), count);
        self
    }

    /// Milestones of a round, in display priority order.
    pub fn milestones(mut self, round_name: &str, events: &[MilestoneEvent]) -> RaceBuilder {
        self._milestones
            .entry(round_name.to_string())
            .or_insert_with(Vec::new)
            .extend(events.iter().cloned());
        self
    }

    pub fn roster(mut self, roster: &[RosterEntry]) -> RaceBuilder {
        self._roster.extend(roster.iter().cloned());
        self
    }

    /// Leaves rounds out and drops the votes received after an elimination.
    ///
    /// Participating counts derived from the eliminations only apply to the
    /// rounds without an explicit count.
    pub fn selection(self, selection: &RoundSelection) -> RaceBuilder {
        RaceBuilder {
            _selection: Some(selection.clone()),
            ..self
        }
    }

    /// Normalizes the votes and assembles the race.
    ///
    /// Side data (participating counts, milestones) must refer to declared rounds.
    pub fn build(self) -> Result<RaceData, RaceErrors> {
        let all_rounds: Vec<String> = self._rounds.iter().map(|r| r.name.clone()).collect();
        for name in self._participating.keys().chain(self._milestones.keys()) {
            if !all_rounds.contains(name) {
                return Err(RaceErrors::UnknownRound(name.clone()));
            }
        }

        let selection = self._selection.clone().unwrap_or_default();
        let records = if selection.exclude_after_elimination {
            selection.clear_after_elimination(&self._records, &all_rounds)
        } else {
            self._records.clone()
        };
        // Counted over all the rounds, before leaving any out.
        let derived = selection.participating_counts(&records, &all_rounds);

        let rounds: Vec<RoundInfo> = self
            ._rounds
            .iter()
            .filter(|r| selection.is_selected(&r.name))
            .map(|r| RoundInfo {
                participating_count: self
                    ._participating
                    .get(&r.name)
                    .cloned()
                    .or(r.participating_count)
                    .or_else(|| derived.get(&r.name).cloned()),
                ..r.clone()
            })
            .collect();
        let round_names: Vec<String> = rounds.iter().map(|r| r.name.clone()).collect();
        let mut milestones = self._milestones;
        milestones.retain(|name, _| round_names.contains(name));

        let entities = crate::normalize(&records, &round_names);
        debug!(
            "RaceBuilder::build: {} entities, {} rounds, milestones for {} rounds",
            entities.len(),
            rounds.len(),
            milestones.len()
        );
        Ok(RaceData {
            entities,
            rounds,
            milestones,
            roster: self._roster,
        })
    }
}
