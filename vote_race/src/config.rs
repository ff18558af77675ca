// ********* Input data structures ***********

use regex::Regex;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::time::Duration;

/// Sums vote counts, staying at `u64::MAX` instead of overflowing.
pub fn saturating_sum(votes: impl Iterator<Item = u64>) -> u64 {
    votes.fold(0, |acc, v| acc.saturating_add(v))
}

/// One row of the raw vote table, as handed over by the data provider.
///
/// The `rounds` map is keyed by round name. A `None` value, or a round
/// that does not appear in the map at all, means that the entity did not
/// receive any vote in this round. It is not the same as a zero.
#[derive(PartialEq, Debug, Clone)]
pub struct RawEntityRecord {
    pub entity: String,
    pub group: String,
    pub rounds: HashMap<String, Option<f64>>,
}

/// The vote of one entity in one round.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum RoundVote {
    /// The entity took part in the round and received this many votes.
    Votes(u64),
    /// No value was recorded for this round.
    NoData,
}

impl RoundVote {
    /// The number of votes, counting a missing value as zero.
    pub fn count(&self) -> u64 {
        match self {
            RoundVote::Votes(v) => *v,
            RoundVote::NoData => 0,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, RoundVote::NoData)
    }
}

/// Information about a round that does not come from the vote table itself.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundInfo {
    pub name: String,
    pub start_time: Option<String>,
    pub total_voters: Option<u64>,
    /// Externally supplied number of entities still in the competition.
    pub participating_count: Option<u32>,
}

impl RoundInfo {
    pub fn named(name: &str) -> RoundInfo {
        RoundInfo {
            name: name.to_string(),
            start_time: None,
            total_voters: None,
            participating_count: None,
        }
    }
}

/// Display enrichment for an entity. Never used for ranking.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RosterEntry {
    pub entity: String,
    pub group: String,
    pub avatar: Option<String>,
    pub final_rank: Option<u32>,
}

/// A timed textual callout attached to an entity in a given round.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct MilestoneEvent {
    pub entity: String,
    pub text: String,
}

// ******** Output data structures *********

/// The votes of an entity, aligned with the order of the rounds.
///
/// Invariant: `cumulative_votes[i] = cumulative_votes[i - 1] + round_votes[i].count()`
/// (with an implicit zero before the first round).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProcessedEntity {
    pub entity: String,
    pub group: String,
    pub round_votes: Vec<RoundVote>,
    pub cumulative_votes: Vec<u64>,
}

impl ProcessedEntity {
    /// The cumulative vote after the given round, zero before the first round.
    pub fn cumulative_before(&self, round_index: usize) -> u64 {
        if round_index == 0 {
            0
        } else {
            self.cumulative_votes[round_index - 1]
        }
    }

    /// Eliminated: no value in this round while votes were collected before.
    pub fn is_eliminated_at(&self, round_index: usize) -> bool {
        self.round_votes[round_index].is_no_data() && self.cumulative_votes[round_index] > 0
    }

    pub fn final_cumulative(&self) -> u64 {
        self.cumulative_votes.last().cloned().unwrap_or(0)
    }
}

/// One bar of the chart for a given round.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankedEntry {
    /// 1-based, dense.
    pub rank: u32,
    pub entity: String,
    pub group: String,
    pub cumulative_vote: u64,
    pub actual_round_vote: u64,
    pub eliminated: bool,
    /// Cumulative vote of this entity after the previous round.
    pub prev_round_vote: u64,
    /// Gap to the entity ranked just above this one in the previous round.
    pub prev_round_gap_to_above: u64,
    /// Gap to the entity ranked just above this one in this round.
    pub gap_to_above: u64,
}

/// The cumulative vote of every entity in ranking order (not truncated).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Standing {
    pub entity: String,
    pub cumulative_vote: u64,
}

/// The leaders of a round by actual (not cumulative) votes.
///
/// Holds at least `min(5, number of entities with votes)` members, and
/// every entity tied with the last distinct value.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct TiedTopGroup {
    /// (entity, actual round vote), by decreasing vote then name.
    pub members: Vec<(String, u64)>,
    pub distinct_values: usize,
    /// Number of entities with a non-zero vote in this round.
    pub voting_entities: usize,
}

impl TiedTopGroup {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_ties(&self) -> bool {
        self.distinct_values < self.members.len()
    }

    pub fn total_votes(&self) -> u64 {
        saturating_sum(self.members.iter().map(|(_, v)| *v))
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StatLineKind {
    Title,
    Text,
    TopTitle,
    TopItem,
}

/// One rendered line of the statistics panel.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StatLine {
    pub id: String,
    pub kind: StatLineKind,
    pub text: String,
    pub avatar: Option<String>,
}

/// Statistics for one round
#[derive(PartialEq, Debug, Clone)]
pub struct Statistics {
    pub total_actual_votes: u64,
    pub participating_count: Option<u32>,
    pub median_votes: f64,
    /// Rounded to two decimals.
    pub average_votes: f64,
    /// Share of the tied top group in the total votes, in percent, two decimals.
    pub top_percentage: f64,
    pub tied_top_group: TiedTopGroup,
    pub lines: Vec<StatLine>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RoundSnapshot {
    pub round_index: usize,
    pub round_name: String,
    /// The renderable bars, truncated to the display limit.
    pub entries: Vec<RankedEntry>,
    /// The full ranking of this round.
    pub standings: Vec<Standing>,
    pub statistics: Statistics,
}

impl RoundSnapshot {
    pub fn entry(&self, entity: &str) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| e.entity == entity)
    }
}

/// Errors that prevent the engine from being set up.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RaceErrors {
    EmptyRace,
    InvalidConfiguration(String),
    UnknownRound(String),
}

impl Error for RaceErrors {}

impl Display for RaceErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaceErrors::EmptyRace => write!(f, "RaceError: no round or no entity to display"),
            RaceErrors::InvalidConfiguration(msg) => {
                write!(f, "RaceError: invalid configuration: {}", msg)
            }
            RaceErrors::UnknownRound(name) => write!(f, "RaceError: unknown round {:?}", name),
        }
    }
}

// ********* Configuration **********

/// Timing of the bar animation. The cycle of one round is the sum of the
/// animation of one bar, the stagger of all the other bars, a buffer and the
/// pause between two rounds.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct AnimationTiming {
    pub animation_duration: Duration,
    /// Delay between the start of two consecutive bars.
    pub stagger: Duration,
    pub buffer: Duration,
    pub round_gap: Duration,
}

impl AnimationTiming {
    pub const DEFAULT: AnimationTiming = AnimationTiming {
        animation_duration: Duration::from_millis(500),
        stagger: Duration::from_millis(50),
        buffer: Duration::from_millis(200),
        round_gap: Duration::from_millis(5000),
    };

    /// The duration of one full round for the given number of rendered bars.
    pub fn cycle_duration(&self, entity_count: usize) -> Duration {
        let staggered = entity_count.saturating_sub(1) as u32;
        self.animation_duration + self.stagger * staggered + self.buffer + self.round_gap
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct MilestoneTiming {
    pub enter_duration: Duration,
    pub exit_duration: Duration,
    /// Shortest time a batch stays on screen before its exit starts.
    pub min_dwell: Duration,
    pub vertical_spacing: f32,
    /// Delay between the entrance of two items of the same batch.
    pub delay_between: Duration,
    pub margin: f32,
}

impl MilestoneTiming {
    pub const DEFAULT: MilestoneTiming = MilestoneTiming {
        enter_duration: Duration::from_millis(1600),
        exit_duration: Duration::from_millis(1000),
        min_dwell: Duration::from_millis(500),
        vertical_spacing: 160.0,
        delay_between: Duration::from_millis(200),
        margin: 20.0,
    };
}

/// The kind of a statistics template.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StatTemplateKind {
    /// A single line with placeholders.
    Text,
    /// A title followed by one line per member of the tied top group.
    TopTitle,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StatTemplate {
    pub id: String,
    pub kind: StatTemplateKind,
    pub template: String,
}

/// Colors the title of the rounds whose name matches the pattern.
#[derive(Debug, Clone)]
pub struct StageColorRule {
    pub pattern: Regex,
    pub color: String,
}

impl StageColorRule {
    pub fn new(pattern: &str, color: &str) -> Result<StageColorRule, RaceErrors> {
        let regex = Regex::new(pattern).map_err(|e| {
            RaceErrors::InvalidConfiguration(format!("stage pattern {:?}: {}", pattern, e))
        })?;
        Ok(StageColorRule {
            pattern: regex,
            color: color.to_string(),
        })
    }

    pub fn matches(&self, round_name: &str) -> bool {
        self.pattern.is_match(round_name)
    }
}

impl PartialEq for StageColorRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.as_str() == other.pattern.as_str() && self.color == other.color
    }
}

impl Eq for StageColorRule {}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Palette {
    pub safe: Vec<String>,
    pub default: String,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            safe: Vec::new(),
            default: "#999".to_string(),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct RaceConfig {
    pub animation: AnimationTiming,
    pub milestone: MilestoneTiming,
    /// Maximum number of bars rendered.
    pub max_display: usize,
    pub max_visible_per_group: usize,
    /// Number of distinct vote values captured by the tied top group.
    pub top_distinct_values: usize,
    pub countdown_fps: u32,
    pub stats: Vec<StatTemplate>,
    /// Appended to the top title when the top group contains ties.
    pub tie_suffix: String,
    pub stage_colors: Vec<StageColorRule>,
    pub palette: Palette,
    pub final_rank_badge_limit: u32,
}

impl RaceConfig {
    pub const DEFAULT_MAX_DISPLAY: usize = 50;
    pub const DEFAULT_MAX_VISIBLE_PER_GROUP: usize = 3;

    pub fn validate(&self) -> Result<(), RaceErrors> {
        if self.max_display == 0 {
            return Err(RaceErrors::InvalidConfiguration(
                "max_display must be at least 1".to_string(),
            ));
        }
        if self.max_visible_per_group == 0 {
            return Err(RaceErrors::InvalidConfiguration(
                "max_visible_per_group must be at least 1".to_string(),
            ));
        }
        if self.top_distinct_values == 0 {
            return Err(RaceErrors::InvalidConfiguration(
                "top_distinct_values must be at least 1".to_string(),
            ));
        }
        if self.countdown_fps == 0 {
            return Err(RaceErrors::InvalidConfiguration(
                "countdown_fps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig {
            animation: AnimationTiming::DEFAULT,
            milestone: MilestoneTiming::DEFAULT,
            max_display: RaceConfig::DEFAULT_MAX_DISPLAY,
            max_visible_per_group: RaceConfig::DEFAULT_MAX_VISIBLE_PER_GROUP,
            top_distinct_values: 5,
            countdown_fps: 120,
            stats: Vec::new(),
            tie_suffix: "(含并列)".to_string(),
            stage_colors: Vec::new(),
            palette: Palette::default(),
            final_rank_badge_limit: 16,
        }
    }
}

/// Everything the engine needs for one chart: the normalized entities and
/// the per-round side data.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RaceData {
    /// Ordered by final cumulative vote (decreasing), then name.
    pub entities: Vec<ProcessedEntity>,
    pub rounds: Vec<RoundInfo>,
    /// Milestones by round name, in priority order.
    pub milestones: HashMap<String, Vec<MilestoneEvent>>,
    pub roster: Vec<RosterEntry>,
}

impl RaceData {
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty() || self.entities.is_empty()
    }

    pub fn milestones_for(&self, round_index: usize) -> &[MilestoneEvent] {
        self.rounds
            .get(round_index)
            .and_then(|r| self.milestones.get(&r.name))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn roster_entry(&self, entity: &str) -> Option<&RosterEntry> {
        self.roster.iter().find(|r| r.entity == entity)
    }
}
