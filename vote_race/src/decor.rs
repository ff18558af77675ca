// Display enrichment: colors, badges and labels. Nothing in here takes part in
// the ranking.

use crate::config::*;
use crate::stats_text::format_count;

pub const DEFAULT_STAGE_COLOR: &str = "#333";

// 32-bit rolling hash over UTF-16 code units: h = c + (h << 5) - h.
// The shift wraps on 32 bits while the subtraction does not.
fn name_hash(name: &str) -> i64 {
    name.encode_utf16().fold(0i64, |acc, c| {
        let shifted = (acc as i32).wrapping_shl(5) as i64;
        c as i64 + (shifted - acc)
    })
}

/// The palette color of an entity, stable for a given name.
pub fn entity_color<'a>(name: &str, palette: &'a Palette) -> &'a str {
    if name.is_empty() || palette.safe.is_empty() {
        return palette.default.as_str();
    }
    let idx = (name_hash(name).unsigned_abs() % palette.safe.len() as u64) as usize;
    palette.safe[idx].as_str()
}

/// The color of the round title: the first rule whose pattern matches the
/// round name.
pub fn stage_color<'a>(round_name: &str, rules: &'a [StageColorRule]) -> &'a str {
    if round_name.is_empty() {
        return DEFAULT_STAGE_COLOR;
    }
    rules
        .iter()
        .find(|rule| rule.matches(round_name))
        .map(|rule| rule.color.as_str())
        .unwrap_or(DEFAULT_STAGE_COLOR)
}

/// "1st", "2nd", ... for final ranks up to the limit. No badge after that.
pub fn final_rank_badge(final_rank: Option<u32>, limit: u32) -> Option<String> {
    match final_rank {
        Some(r) if r >= 1 && r <= limit => {
            let suffix = match r {
                1 => "st",
                2 => "nd",
                3 => "rd",
                _ => "th",
            };
            Some(format!("{}{}", r, suffix))
        }
        _ => None,
    }
}

/// The label of a bar showing the given number of votes.
pub fn bar_label(entity: &str, badge: Option<&str>, votes: u64) -> String {
    match badge {
        Some(b) => format!("{}({})：{}", entity, b, format_count(votes)),
        None => format!("{}：{}", entity, format_count(votes)),
    }
}

/// The gap to the bar above, as displayed next to a bar.
pub fn trend_label(gap: u64) -> String {
    if gap == 0 {
        " =0".to_string()
    } else {
        format!(" ↓{}", format_count(gap))
    }
}

/// Start and end labels of a bar during the round animation, and its trend
/// labels when the bar is not the leader.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BarLabels {
    pub start: String,
    pub end: String,
    pub trend: Option<(String, String)>,
}

pub fn bar_labels(entry: &RankedEntry, data: &RaceData, config: &RaceConfig) -> BarLabels {
    let badge = final_rank_badge(
        data.roster_entry(&entry.entity).and_then(|r| r.final_rank),
        config.final_rank_badge_limit,
    );
    let trend = if entry.rank > 1 {
        Some((
            trend_label(entry.prev_round_gap_to_above),
            trend_label(entry.gap_to_above),
        ))
    } else {
        None
    };
    BarLabels {
        start: bar_label(&entry.entity, badge.as_deref(), entry.prev_round_vote),
        end: bar_label(&entry.entity, badge.as_deref(), entry.cumulative_vote),
        trend,
    }
}
