mod config_reader;
mod io_common;
mod io_json;
mod io_xlsx;
mod player;

use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use vote_race::builder::RaceBuilder;
use vote_race::decor;
use vote_race::milestones::MilestoneBatch;
use vote_race::selection::RoundSelection;
use vote_race::sequencer::Sequencer;
use vote_race::*;

use crate::args::Args;
use crate::race::config_reader::*;
use crate::race::player::RoundReport;

#[derive(Debug, Snafu)]
pub enum RaceError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet found in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Column {column} is missing in the header of {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Line {lineno}: could not understand cell {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid race"))]
    Race { source: RaceErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RaceResult<T> = Result<T, RaceError>;

/// The vote table, as parsed by the readers.
///
/// This is before any normalization: values are what the file contains.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct VoteInput {
    pub round_names: Vec<String>,
    pub records: Vec<RawEntityRecord>,
    pub participating: HashMap<String, u32>,
}

fn read_vote_input(args: &Args, config: &SeasonConfig) -> RaceResult<VoteInput> {
    let input_type = match &args.input_type {
        Some(t) => t.clone(),
        None => {
            let ext = Path::new(&args.input)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if ext == "xlsx" {
                "xlsx".to_string()
            } else {
                "json".to_string()
            }
        }
    };
    info!("read_vote_input: {:?} as {}", args.input, input_type);
    match input_type.as_str() {
        "json" => io_json::read_json(&args.input),
        "xlsx" => {
            let worksheet = args
                .excel_worksheet_name
                .clone()
                .or_else(|| config.excel_worksheet_name.clone());
            io_xlsx::read_excel_file(&args.input, worksheet.as_deref())
        }
        x => whatever!("Provider not implemented {:?}", x),
    }
}

/// The round selection of the season, extended by the command line.
fn round_selection(args: &Args, config: &SeasonConfig) -> RoundSelection {
    let mut selection = config.round_selection();
    selection.excluded_rounds.extend(
        args.exclude_round
            .iter()
            .map(|r| io_common::normalize_round_name(r)),
    );
    selection.exclude_wildcard |= args.exclude_wildcard;
    selection.exclude_after_elimination |= args.exclude_ranking;
    selection
}

/// Puts together the vote table and the season configuration.
fn assemble_race(
    input: &VoteInput,
    config: &SeasonConfig,
    selection: &RoundSelection,
) -> RaceResult<RaceData> {
    let rounds = config.round_infos(&input.round_names);
    let round_names: Vec<&str> = rounds.iter().map(|r| r.name.as_str()).collect();

    let mut builder = RaceBuilder::new()
        .round_infos(&rounds)
        .records(&input.records)
        .roster(&config.roster_entries())
        .selection(selection);
    for (round_name, count) in input.participating.iter() {
        if round_names.contains(&round_name.as_str()) {
            builder = builder.participating(round_name, *count);
        } else {
            debug!(
                "assemble_race: participating count for unused round {:?}",
                round_name
            );
        }
    }
    for (round_name, events) in config.milestone_events() {
        if round_names.contains(&round_name.as_str()) {
            builder = builder.milestones(&round_name, &events);
        } else {
            warn!(
                "assemble_race: milestones for unknown round {:?} are dropped",
                round_name
            );
        }
    }
    builder.build().context(RaceSnafu {})
}

fn ms(d: std::time::Duration) -> u64 {
    d.as_millis() as u64
}

fn batch_to_json(batch: &MilestoneBatch) -> JSValue {
    let events: Vec<JSValue> = batch
        .events
        .iter()
        .map(|e| json!({"character": e.entity, "text": e.text}))
        .collect();
    json!({
        "id": batch.id,
        "revealMs": ms(batch.reveal_at),
        "hideMs": batch.hide_at.map(ms),
        "events": events,
    })
}

fn round_to_json(report: &RoundReport, data: &RaceData, config: &RaceConfig) -> JSValue {
    let snapshot = &report.snapshot;
    let entries: Vec<JSValue> = snapshot
        .entries
        .iter()
        .map(|e| {
            let labels = decor::bar_labels(e, data, config);
            json!({
                "rank": e.rank,
                "character": e.entity,
                "series": e.group,
                "cumulative": e.cumulative_vote,
                "actual": e.actual_round_vote,
                "eliminated": e.eliminated,
                "color": decor::entity_color(&e.entity, &config.palette),
                "label": labels.end,
                "trend": labels.trend.map(|(_, end)| end),
            })
        })
        .collect();
    let stats = &snapshot.statistics;
    let lines: Vec<JSValue> = stats
        .lines
        .iter()
        .filter(|l| !l.text.is_empty())
        .map(|l| json!({"id": l.id, "text": l.text}))
        .collect();
    let batches: Vec<JSValue> = report.batches.iter().map(batch_to_json).collect();
    json!({
        "round": snapshot.round_name,
        "stageColor": decor::stage_color(&snapshot.round_name, &config.stage_colors),
        "cycleMs": ms(report.cycle),
        "entries": entries,
        "statistics": {
            "totalVotes": stats.total_actual_votes,
            "medianVotes": stats.median_votes,
            "averageVotes": stats.average_votes,
            "topPercentage": stats.top_percentage,
            "participatingCount": stats.participating_count,
            "lines": lines,
        },
        "milestones": batches,
    })
}

fn build_summary_js(
    input_path: &str,
    reports: &[RoundReport],
    data: &RaceData,
    config: &RaceConfig,
) -> JSValue {
    let rounds: Vec<JSValue> = reports
        .iter()
        .map(|r| round_to_json(r, data, config))
        .collect();
    json!({
        "input": io_common::simplify_file_name(input_path),
        "entities": data.entities.len(),
        "rounds": rounds,
    })
}

fn write_output(out: &Option<String>, contents: &str) -> RaceResult<()> {
    match out.as_deref() {
        None | Some("") | Some("stdout") => {
            println!("{}", contents);
            Ok(())
        }
        Some(path) => {
            info!("write_output: writing summary to {:?}", path);
            fs::write(path, contents).context(WritingOutputSnafu { path })
        }
    }
}

pub fn run_race(args: &Args) -> RaceResult<()> {
    let season = match &args.config {
        Some(path) => read_config(path)?,
        None => SeasonConfig::default(),
    };
    let race_config = season.race_config()?;
    debug!("run_race: configuration: {:?}", race_config);

    let input = read_vote_input(args, &season)?;
    info!(
        "run_race: {} records, {} rounds in the input",
        input.records.len(),
        input.round_names.len()
    );
    let selection = round_selection(args, &season);
    let data = assemble_race(&input, &season, &selection)?;
    if data.is_empty() {
        whatever!("Nothing to play: no entity or no round in {}", args.input)
    }

    let mut sequencer = Sequencer::new(race_config.clone()).context(RaceSnafu {})?;
    let reports = player::play(&mut sequencer, data.clone(), args.instant)?;

    // Assemble the final json
    let result_js = build_summary_js(&args.input, &reports, &data, &race_config);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_output(&args.out, &pretty_js_stats)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
        info!("run_race: summary matches the reference {:?}", summary_p);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn record(name: &str, votes: &[(&str, Option<f64>)]) -> RawEntityRecord {
        RawEntityRecord {
            entity: name.to_string(),
            group: "S".to_string(),
            rounds: votes.iter().map(|(r, v)| (r.to_string(), *v)).collect(),
        }
    }

    fn input() -> VoteInput {
        VoteInput {
            round_names: vec!["R1".to_string(), "R2".to_string()],
            records: vec![
                record("X", &[("R1", Some(10.0)), ("R2", None)]),
                record("Y", &[("R1", Some(10.0)), ("R2", Some(5.0))]),
            ],
            participating: HashMap::new(),
        }
    }

    #[test]
    fn summary_of_two_rounds() {
        let season: SeasonConfig = serde_json::from_str(
            r#"{"milestones": {"R2": [{"character": "Y", "text": "takes the lead"}]},
                "roster": [{"character": "Y", "rank": 1}]}"#,
        )
        .unwrap();
        let data = assemble_race(&input(), &season, &season.round_selection()).unwrap();
        let config = season.race_config().unwrap();
        let mut sequencer = Sequencer::new(config.clone()).unwrap();
        let reports = player::play(&mut sequencer, data.clone(), true).unwrap();
        assert_eq!(reports.len(), 2);

        let js = build_summary_js("/tmp/votes.json", &reports, &data, &config);
        assert_eq!(js["input"], json!("votes.json"));
        let r2 = &js["rounds"][1];
        assert_eq!(r2["round"], json!("R2"));
        assert_eq!(r2["entries"][0]["character"], json!("Y"));
        assert_eq!(r2["entries"][0]["label"], json!("Y(1st)：15"));
        assert_eq!(r2["entries"][1]["eliminated"], json!(true));
        assert_eq!(r2["entries"][1]["trend"], json!(" ↓5"));
        assert_eq!(r2["milestones"][0]["hideMs"], JSValue::Null);
        assert_eq!(js["rounds"][0]["milestones"], json!([]));
    }

    #[test]
    fn milestones_of_unknown_rounds_are_dropped() {
        let season: SeasonConfig = serde_json::from_str(
            r#"{"milestones": {"R7": [{"character": "Y", "text": "?"}]}}"#,
        )
        .unwrap();
        let data = assemble_race(&input(), &season, &season.round_selection()).unwrap();
        assert!(data.milestones.is_empty());
    }

    #[test]
    fn command_line_extends_the_round_selection() {
        let season: SeasonConfig = serde_json::from_str(
            r#"{"eliminatedCharacters": {"R1": [{"character": "X", "series": "S"}]}}"#,
        )
        .unwrap();
        let args = Args::parse_from([
            "voterace",
            "--input",
            "votes.json",
            "--exclude-round",
            "R 1",
            "--exclude-ranking",
        ]);
        let selection = round_selection(&args, &season);
        assert_eq!(selection.excluded_rounds, vec!["R1"]);
        assert!(selection.exclude_after_elimination);
        assert!(!selection.exclude_wildcard);

        let data = assemble_race(&input(), &season, &selection).unwrap();
        assert_eq!(data.round_count(), 1);
        assert_eq!(data.rounds[0].name, "R2");
        // Counted before R1 is left out: X went out in R1.
        assert_eq!(data.rounds[0].participating_count, Some(1));
        let x = data.entities.iter().find(|pe| pe.entity == "X").unwrap();
        assert_eq!(x.cumulative_votes, vec![0]);
    }
}
