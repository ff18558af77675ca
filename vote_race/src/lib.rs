mod config;
pub mod builder;
pub mod countdown;
pub mod decor;
pub mod manual;
pub mod milestones;
pub mod selection;
pub mod sequencer;
pub mod stats_text;
pub mod timeline;

use log::{debug, info, warn};

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

pub use crate::config::*;

// **** Data normalization ****

fn to_round_vote(entity: &str, round_name: &str, raw: Option<f64>) -> RoundVote {
    match raw {
        None => RoundVote::NoData,
        Some(x) if x.is_finite() && x >= 0.0 => RoundVote::Votes(x.round() as u64),
        Some(x) => {
            warn!(
                "to_round_vote: entity {:?} round {:?}: dropping invalid vote value {:?}",
                entity, round_name, x
            );
            RoundVote::NoData
        }
    }
}

/// Decreasing cumulative vote, then increasing name.
fn compare_standing(a_votes: u64, a_name: &str, b_votes: u64, b_name: &str) -> Ordering {
    b_votes.cmp(&a_votes).then_with(|| a_name.cmp(b_name))
}

/// Turns the raw vote table into per-round and cumulative vote sequences.
///
/// Arguments:
/// * `records` the raw table, one record per entity
/// * `round_names` the names of the rounds, in playback order
///
/// The entities are returned by decreasing final cumulative vote, then by name.
/// An empty table or an empty list of rounds yields an empty result: an empty
/// chart is a valid state. A round missing from a record counts as no data.
pub fn normalize(records: &[RawEntityRecord], round_names: &[String]) -> Vec<ProcessedEntity> {
    if records.is_empty() || round_names.is_empty() {
        debug!(
            "normalize: nothing to process: {} records, {} rounds",
            records.len(),
            round_names.len()
        );
        return Vec::new();
    }
    info!(
        "normalize: processing {} entities over {} rounds",
        records.len(),
        round_names.len()
    );

    let mut seen: HashSet<&str> = HashSet::new();
    let mut res: Vec<ProcessedEntity> = Vec::new();
    for record in records.iter() {
        if !seen.insert(record.entity.as_str()) {
            warn!("normalize: duplicate entity name {:?}", record.entity);
        }
        let mut round_votes: Vec<RoundVote> = Vec::with_capacity(round_names.len());
        let mut cumulative_votes: Vec<u64> = Vec::with_capacity(round_names.len());
        let mut running: u64 = 0;
        for round_name in round_names.iter() {
            let raw = record.rounds.get(round_name).cloned().flatten();
            let vote = to_round_vote(&record.entity, round_name, raw);
            running = running.saturating_add(vote.count());
            round_votes.push(vote);
            cumulative_votes.push(running);
        }
        res.push(ProcessedEntity {
            entity: record.entity.clone(),
            group: record.group.clone(),
            round_votes,
            cumulative_votes,
        });
    }

    res.sort_by(|a, b| {
        compare_standing(
            a.final_cumulative(),
            &a.entity,
            b.final_cumulative(),
            &b.entity,
        )
    });
    res
}

// **** Snapshots ****

/// The full ranking of all the entities after the given round.
pub fn standings_at(entities: &[ProcessedEntity], round_index: usize) -> Vec<Standing> {
    let mut res: Vec<Standing> = entities
        .iter()
        .map(|pe| Standing {
            entity: pe.entity.clone(),
            cumulative_vote: pe.cumulative_votes[round_index],
        })
        .collect();
    res.sort_by(|a, b| compare_standing(a.cumulative_vote, &a.entity, b.cumulative_vote, &b.entity));
    res
}

/// Collects the leaders of a round by actual vote.
///
/// Entities with zero votes did not vote in this round and are never part of
/// the group. The group grows until it holds `distinct_values` distinct vote
/// values, then takes every entity tied with the last one.
pub fn tied_top_group(round_votes: &[(String, u64)], distinct_values: usize) -> TiedTopGroup {
    let mut voters: Vec<&(String, u64)> = round_votes.iter().filter(|(_, v)| *v > 0).collect();
    voters.sort_by(|a, b| compare_standing(a.1, &a.0, b.1, &b.0));

    let mut values: Vec<u64> = Vec::new();
    let mut members: Vec<(String, u64)> = Vec::new();
    for (name, votes) in voters.iter() {
        let known = values.contains(votes);
        if !known && values.len() >= distinct_values {
            break;
        }
        if !known {
            values.push(*votes);
        }
        members.push((name.clone(), *votes));
    }
    TiedTopGroup {
        members,
        distinct_values: values.len(),
        voting_entities: voters.len(),
    }
}

fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Median of the given votes. Zero when there is no vote.
fn median(sorted_votes: &[u64]) -> f64 {
    let n = sorted_votes.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    if n % 2 == 0 {
        (sorted_votes[mid - 1] as f64 + sorted_votes[mid] as f64) / 2.0
    } else {
        sorted_votes[mid] as f64
    }
}

// The numbers of the statistics panel, before any text is rendered.
fn compute_statistics(
    round_votes: &[(String, u64)],
    participating_count: Option<u32>,
    config: &RaceConfig,
) -> Statistics {
    let total_actual_votes: u64 = saturating_sum(round_votes.iter().map(|(_, v)| *v));
    let mut voting: Vec<u64> = round_votes
        .iter()
        .filter_map(|(_, v)| if *v > 0 { Some(*v) } else { None })
        .collect();
    voting.sort_unstable();

    let average_votes = if voting.is_empty() {
        0.0
    } else {
        round_2(saturating_sum(voting.iter().cloned()) as f64 / voting.len() as f64)
    };
    let median_votes = median(&voting);

    let tied_top_group = tied_top_group(round_votes, config.top_distinct_values);
    let top_percentage = if total_actual_votes == 0 {
        0.0
    } else {
        round_2(tied_top_group.total_votes() as f64 / total_actual_votes as f64 * 100.0)
    };

    Statistics {
        total_actual_votes,
        participating_count,
        median_votes,
        average_votes,
        top_percentage,
        tied_top_group,
        lines: Vec::new(),
    }
}

/// Builds the ranked view of one round.
///
/// Arguments:
/// * `data` the normalized race
/// * `round_index` the round to display. It must exist: asking for a round
/// outside of the race is a programming error and panics.
/// * `previous` the snapshot of the previous round, if available. Its
/// standings are reused to compute the gaps of the previous round.
/// * `config` the display limits and statistics templates
pub fn build_snapshot(
    data: &RaceData,
    round_index: usize,
    previous: Option<&RoundSnapshot>,
    config: &RaceConfig,
) -> RoundSnapshot {
    assert!(
        round_index < data.round_count(),
        "build_snapshot: round index {} out of range (number of rounds: {})",
        round_index,
        data.round_count()
    );
    let round_info = &data.rounds[round_index];

    // (entity, actual, cumulative, eliminated), in ranking order
    let mut rows: Vec<(&ProcessedEntity, u64, u64, bool)> = data
        .entities
        .iter()
        .map(|pe| {
            (
                pe,
                pe.round_votes[round_index].count(),
                pe.cumulative_votes[round_index],
                pe.is_eliminated_at(round_index),
            )
        })
        .collect();
    rows.sort_by(|a, b| compare_standing(a.2, &a.0.entity, b.2, &b.0.entity));

    let standings: Vec<Standing> = rows
        .iter()
        .map(|(pe, _, cumulative, _)| Standing {
            entity: pe.entity.clone(),
            cumulative_vote: *cumulative,
        })
        .collect();

    let previous_standings: Vec<Standing> = match previous {
        _ if round_index == 0 => Vec::new(),
        Some(prev) if prev.round_index + 1 == round_index => prev.standings.clone(),
        Some(prev) => {
            debug!(
                "build_snapshot: previous snapshot is for round {}, recomputing round {}",
                prev.round_index,
                round_index - 1
            );
            standings_at(&data.entities, round_index - 1)
        }
        None => standings_at(&data.entities, round_index - 1),
    };
    let previous_positions: HashMap<&str, usize> = previous_standings
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.entity.as_str(), idx))
        .collect();

    let entries: Vec<RankedEntry> = rows
        .iter()
        .take(config.max_display)
        .enumerate()
        .map(|(idx, (pe, actual, cumulative, eliminated))| {
            let prev_round_gap_to_above = match previous_positions.get(pe.entity.as_str()) {
                Some(&pos) if idx > 0 && pos > 0 => previous_standings[pos - 1]
                    .cumulative_vote
                    .saturating_sub(previous_standings[pos].cumulative_vote),
                _ => 0,
            };
            let gap_to_above = if idx == 0 { 0 } else { rows[idx - 1].2 - *cumulative };
            RankedEntry {
                rank: (idx + 1) as u32,
                entity: pe.entity.clone(),
                group: pe.group.clone(),
                cumulative_vote: *cumulative,
                actual_round_vote: *actual,
                eliminated: *eliminated,
                prev_round_vote: pe.cumulative_before(round_index),
                prev_round_gap_to_above,
                gap_to_above,
            }
        })
        .collect();

    // The statistics use every entity, not only the displayed ones.
    let round_votes: Vec<(String, u64)> = rows
        .iter()
        .map(|(pe, actual, _, _)| (pe.entity.clone(), *actual))
        .collect();
    let mut statistics = compute_statistics(&round_votes, round_info.participating_count, config);
    statistics.lines = stats_text::render_lines(&config.stats, round_info, &statistics, data, config);

    debug!(
        "build_snapshot: round {} ({:?}): {} entries, total votes {}, top group {:?}",
        round_index,
        round_info.name,
        entries.len(),
        statistics.total_actual_votes,
        statistics.tied_top_group.members
    );

    RoundSnapshot {
        round_index,
        round_name: round_info.name.clone(),
        entries,
        standings,
        statistics,
    }
}
