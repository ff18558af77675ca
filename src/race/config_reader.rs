use crate::race::io_common::normalize_round_name;
use crate::race::*;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vote_race::selection::{EliminatedEntity, RoundSelection, DEFAULT_KNOCKOUT_MARKER};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    pub name: String,
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "totalVoters")]
    pub total_voters: Option<u64>,
    #[serde(rename = "participatingCount")]
    pub participating_count: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StatConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub _kind: Option<String>,
    pub template: String,
}

impl StatConfig {
    pub fn kind(&self) -> RaceResult<StatTemplateKind> {
        match self._kind.as_deref() {
            None | Some("text") => Ok(StatTemplateKind::Text),
            Some("top-title") => Ok(StatTemplateKind::TopTitle),
            Some(x) => whatever!("unknown statistics type {:?} for {:?}", x, self.id),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StageColorConfig {
    pub pattern: String,
    pub color: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ColorsConfig {
    #[serde(default)]
    pub safe: Vec<String>,
    pub default: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneConfig {
    pub character: String,
    pub text: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    pub character: String,
    pub series: Option<String>,
    pub avatar: Option<String>,
    pub rank: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EliminatedConfig {
    pub character: String,
    pub series: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneLayout {
    #[serde(rename = "maxVisiblePerGroup")]
    pub max_visible_per_group: Option<usize>,
    pub margin: Option<f32>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(rename = "maxDisplay")]
    pub max_display: Option<usize>,
    pub milestone: Option<MilestoneLayout>,
}

/// Durations are in milliseconds.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub duration: Option<u64>,
    #[serde(rename = "delayFactor")]
    pub delay_factor: Option<u64>,
    pub buffer: Option<u64>,
    #[serde(rename = "roundDelay")]
    pub round_delay: Option<u64>,
    #[serde(rename = "countdownFps")]
    pub countdown_fps: Option<u32>,
    #[serde(rename = "milestoneEnter")]
    pub milestone_enter: Option<u64>,
    #[serde(rename = "milestoneExit")]
    pub milestone_exit: Option<u64>,
    #[serde(rename = "milestoneMinDwell")]
    pub milestone_min_dwell: Option<u64>,
}

/// The configuration of one season, as written in the JSON configuration file.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonConfig {
    /// The rounds to play, in order. Empty: all the rounds of the input.
    #[serde(default)]
    pub rounds: Vec<RoundConfig>,
    #[serde(default)]
    pub stats: Vec<StatConfig>,
    #[serde(rename = "stageColors", default)]
    pub stage_colors: Vec<StageColorConfig>,
    pub colors: Option<ColorsConfig>,
    #[serde(default)]
    pub milestones: HashMap<String, Vec<MilestoneConfig>>,
    #[serde(default)]
    pub roster: Vec<RosterConfig>,
    pub layout: Option<LayoutConfig>,
    pub animation: Option<AnimationConfig>,
    #[serde(rename = "tieSuffix")]
    pub tie_suffix: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    /// Rounds left out of the playback.
    #[serde(rename = "excludedRounds", default)]
    pub excluded_rounds: Vec<String>,
    #[serde(rename = "wildcardRounds", default)]
    pub wildcard_rounds: Vec<String>,
    #[serde(rename = "excludeWildcard", default)]
    pub exclude_wildcard: bool,
    /// Drops the votes received after an elimination.
    #[serde(rename = "excludeRanking", default)]
    pub exclude_ranking: bool,
    /// The entities eliminated at the end of each round.
    #[serde(rename = "eliminatedCharacters", default)]
    pub eliminated_characters: HashMap<String, Vec<EliminatedConfig>>,
    #[serde(rename = "knockoutMarker")]
    pub knockout_marker: Option<String>,
}

fn millis(x: Option<u64>, default: Duration) -> Duration {
    x.map(Duration::from_millis).unwrap_or(default)
}

impl SeasonConfig {
    pub fn race_config(&self) -> RaceResult<RaceConfig> {
        let mut config = RaceConfig::default();

        if let Some(anim) = &self.animation {
            config.animation = AnimationTiming {
                animation_duration: millis(anim.duration, config.animation.animation_duration),
                stagger: millis(anim.delay_factor, config.animation.stagger),
                buffer: millis(anim.buffer, config.animation.buffer),
                round_gap: millis(anim.round_delay, config.animation.round_gap),
            };
            config.milestone.enter_duration =
                millis(anim.milestone_enter, config.milestone.enter_duration);
            config.milestone.exit_duration =
                millis(anim.milestone_exit, config.milestone.exit_duration);
            config.milestone.min_dwell =
                millis(anim.milestone_min_dwell, config.milestone.min_dwell);
            config.countdown_fps = anim.countdown_fps.unwrap_or(config.countdown_fps);
        }
        if let Some(layout) = &self.layout {
            config.max_display = layout.max_display.unwrap_or(config.max_display);
            if let Some(ml) = &layout.milestone {
                config.max_visible_per_group = ml
                    .max_visible_per_group
                    .unwrap_or(config.max_visible_per_group);
                config.milestone.margin = ml.margin.unwrap_or(config.milestone.margin);
            }
        }
        if let Some(colors) = &self.colors {
            config.palette = Palette {
                safe: colors.safe.clone(),
                default: colors
                    .default
                    .clone()
                    .unwrap_or(config.palette.default.clone()),
            };
        }
        if let Some(suffix) = &self.tie_suffix {
            config.tie_suffix = suffix.clone();
        }

        let mut stats: Vec<StatTemplate> = Vec::new();
        for s in self.stats.iter() {
            stats.push(StatTemplate {
                id: s.id.clone(),
                kind: s.kind()?,
                template: s.template.clone(),
            });
        }
        config.stats = stats;
        config.stage_colors = self
            .stage_colors
            .iter()
            .map(|sc| StageColorRule::new(&sc.pattern, &sc.color))
            .collect::<Result<Vec<StageColorRule>, RaceErrors>>()
            .context(RaceSnafu {})?;

        config.validate().context(RaceSnafu {})?;
        Ok(config)
    }

    /// The rounds to play. The configured rounds take precedence over the
    /// rounds found in the input.
    pub fn round_infos(&self, input_rounds: &[String]) -> Vec<RoundInfo> {
        if self.rounds.is_empty() {
            return input_rounds.iter().map(|n| RoundInfo::named(n)).collect();
        }
        let infos: Vec<RoundInfo> = self
            .rounds
            .iter()
            .map(|rc| RoundInfo {
                name: normalize_round_name(&rc.name),
                start_time: rc.start_time.clone(),
                total_voters: rc.total_voters,
                participating_count: rc.participating_count,
            })
            .collect();
        for info in infos.iter() {
            if !input_rounds.contains(&info.name) {
                warn!("round_infos: round {:?} has no data in the input", info.name);
            }
        }
        for name in input_rounds.iter() {
            if !infos.iter().any(|info| &info.name == name) {
                debug!("round_infos: skipping input round {:?}", name);
            }
        }
        infos
    }

    /// The rounds left out and the eliminations, with normalized round names.
    pub fn round_selection(&self) -> RoundSelection {
        let normalized = |names: &[String]| -> Vec<String> {
            names.iter().map(|n| normalize_round_name(n)).collect()
        };
        RoundSelection {
            excluded_rounds: normalized(&self.excluded_rounds),
            wildcard_rounds: normalized(&self.wildcard_rounds),
            exclude_wildcard: self.exclude_wildcard,
            exclude_after_elimination: self.exclude_ranking,
            eliminated: self
                .eliminated_characters
                .iter()
                .map(|(round, entities)| {
                    (
                        normalize_round_name(round),
                        entities
                            .iter()
                            .map(|e| EliminatedEntity {
                                entity: e.character.clone(),
                                group: e.series.clone().unwrap_or_default(),
                            })
                            .collect(),
                    )
                })
                .collect(),
            knockout_marker: self
                .knockout_marker
                .clone()
                .unwrap_or_else(|| DEFAULT_KNOCKOUT_MARKER.to_string()),
        }
    }

    pub fn roster_entries(&self) -> Vec<RosterEntry> {
        self.roster
            .iter()
            .map(|r| RosterEntry {
                entity: r.character.clone(),
                group: r.series.clone().unwrap_or_default(),
                avatar: match r.avatar.clone() {
                    Some(x) if x.is_empty() => None,
                    x => x,
                },
                final_rank: r.rank,
            })
            .collect()
    }

    /// The milestones by round, ordered by round name for stable logs.
    pub fn milestone_events(&self) -> Vec<(String, Vec<MilestoneEvent>)> {
        let mut res: Vec<(String, Vec<MilestoneEvent>)> = self
            .milestones
            .iter()
            .map(|(round, events)| {
                (
                    normalize_round_name(round),
                    events
                        .iter()
                        .map(|e| MilestoneEvent {
                            entity: e.character.clone(),
                            text: e.text.clone(),
                        })
                        .collect(),
                )
            })
            .collect();
        res.sort_by(|a, b| a.0.cmp(&b.0));
        res
    }
}

pub fn read_config(path: &str) -> RaceResult<SeasonConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SeasonConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    info!(
        "read_config: {} rounds, {} statistics, {} rounds with milestones",
        config.rounds.len(),
        config.stats.len(),
        config.milestones.len()
    );
    Ok(config)
}

pub fn read_summary(path: &str) -> RaceResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
