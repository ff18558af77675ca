//! Text of the statistics panel.
//!
//! Templates use named placeholders between braces, for example
//! `"Total: {totalVotes} votes"`. Placeholders that are not known are
//! kept verbatim in the output.

use log::warn;
use std::collections::HashMap;

use crate::config::*;

/// Formats a count with a comma between groups of three digits.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut res = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            res.push(',');
        }
        res.push(c);
    }
    res
}

/// Formats a number with at most two decimals, trailing zeros removed, and
/// grouped digits on the integer part.
pub fn format_decimal(x: f64) -> String {
    let fixed = format!("{:.2}", x.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let grouped = format_count(int_part.parse::<u64>().unwrap_or(0));
    let frac = frac_part.trim_end_matches('0');
    let sign = if x < 0.0 && fixed != "0.00" { "-" } else { "" };
    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

/// Replaces every `{name}` in the template with its value.
pub fn substitute(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut res = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        res.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let name_len = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];
        let closed = after[name_len..].starts_with('}');
        match vars.get(name) {
            Some(value) if closed && !name.is_empty() => {
                res.push_str(value);
                rest = &after[name_len + 1..];
            }
            _ => {
                if closed && !name.is_empty() {
                    warn!("substitute: unknown placeholder {{{}}}", name);
                }
                res.push('{');
                rest = after;
            }
        }
    }
    res.push_str(rest);
    res
}

/// Number of leaders announced in the top title: five, or fewer when fewer
/// entities received votes.
pub fn top_count(group: &TiedTopGroup, config: &RaceConfig) -> usize {
    group.voting_entities.min(config.top_distinct_values)
}

fn template_vars<'a>(
    round_info: &RoundInfo,
    stats: &Statistics,
    config: &RaceConfig,
) -> HashMap<&'a str, String> {
    let group = &stats.tied_top_group;
    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert(
        "startTime",
        round_info.start_time.clone().unwrap_or_default(),
    );
    vars.insert("totalVotes", format_count(stats.total_actual_votes));
    vars.insert(
        "totalVoters",
        round_info.total_voters.map(format_count).unwrap_or_default(),
    );
    vars.insert("averageVotes", format_decimal(stats.average_votes));
    vars.insert("medianVotes", format_decimal(stats.median_votes));
    vars.insert("percentage", format!("{:.2}", stats.top_percentage));
    vars.insert(
        "actualParticipatingCount",
        stats
            .participating_count
            .map(|c| c.to_string())
            .unwrap_or_default(),
    );
    vars.insert("topCount", top_count(group, config).to_string());
    vars.insert(
        "tieSuffix",
        if group.has_ties() {
            config.tie_suffix.clone()
        } else {
            String::new()
        },
    );
    vars
}

/// Renders the statistics panel of a round: the round title followed by one
/// or more lines per template.
pub fn render_lines(
    templates: &[StatTemplate],
    round_info: &RoundInfo,
    stats: &Statistics,
    data: &RaceData,
    config: &RaceConfig,
) -> Vec<StatLine> {
    let vars = template_vars(round_info, stats, config);
    let mut lines: Vec<StatLine> = vec![StatLine {
        id: "title".to_string(),
        kind: StatLineKind::Title,
        text: round_info.name.clone(),
        avatar: None,
    }];
    for template in templates.iter() {
        match template.kind {
            StatTemplateKind::Text => lines.push(StatLine {
                id: template.id.clone(),
                kind: StatLineKind::Text,
                text: substitute(&template.template, &vars),
                avatar: None,
            }),
            StatTemplateKind::TopTitle => {
                let group = &stats.tied_top_group;
                // An empty title keeps the layout of the panel stable.
                let text = if group.is_empty() {
                    String::new()
                } else {
                    substitute(&template.template, &vars)
                };
                lines.push(StatLine {
                    id: template.id.clone(),
                    kind: StatLineKind::TopTitle,
                    text,
                    avatar: None,
                });
                for (idx, (entity, votes)) in group.members.iter().enumerate() {
                    lines.push(StatLine {
                        id: format!("top-{}", idx),
                        kind: StatLineKind::TopItem,
                        text: format!("{}：{}", entity, format_count(*votes)),
                        avatar: data.roster_entry(entity).and_then(|r| r.avatar.clone()),
                    });
                }
            }
        }
    }
    lines
}
