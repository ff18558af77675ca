use serde::Deserialize;

use crate::race::io_common::{finite_vote, normalize_round_name, parse_vote_text};
use crate::race::*;

#[derive(PartialEq, Debug, Clone, Deserialize)]
struct VoteRow {
    character: String,
    #[serde(default)]
    series: Option<String>,
    votes: Vec<JSValue>,
}

/// The vote table as served by the vote tracking backend.
#[derive(PartialEq, Debug, Clone, Deserialize)]
struct VoteTable {
    vote_rounds: Vec<String>,
    votes_data: Vec<VoteRow>,
    #[serde(default)]
    participating_counts: HashMap<String, u32>,
}

fn read_vote_value(v: &JSValue, entity: &str, round_name: &str) -> RaceResult<Option<f64>> {
    match v {
        JSValue::Null => Ok(None),
        JSValue::Number(n) => Ok(n.as_f64().and_then(finite_vote)),
        JSValue::String(s) => Ok(parse_vote_text(s)),
        _ => whatever!(
            "read_vote_value: {:?} in round {:?}: could not understand value {:?}",
            entity,
            round_name,
            v
        ),
    }
}

fn convert_table(table: VoteTable) -> RaceResult<VoteInput> {
    let round_names: Vec<String> = table
        .vote_rounds
        .iter()
        .map(|r| normalize_round_name(r))
        .collect();
    let mut records: Vec<RawEntityRecord> = Vec::new();
    for row in table.votes_data.iter() {
        if row.votes.len() != round_names.len() {
            warn!(
                "read_json: {:?} has {} values for {} rounds",
                row.character,
                row.votes.len(),
                round_names.len()
            );
        }
        let mut rounds: HashMap<String, Option<f64>> = HashMap::new();
        for (round_name, v) in round_names.iter().zip(row.votes.iter()) {
            rounds.insert(
                round_name.clone(),
                read_vote_value(v, &row.character, round_name)?,
            );
        }
        records.push(RawEntityRecord {
            entity: row.character.clone(),
            group: row.series.clone().unwrap_or_default(),
            rounds,
        });
    }
    let participating: HashMap<String, u32> = table
        .participating_counts
        .iter()
        .map(|(r, c)| (normalize_round_name(r), *c))
        .collect();
    Ok(VoteInput {
        round_names,
        records,
        participating,
    })
}

pub fn read_json(path: &str) -> RaceResult<VoteInput> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let table: VoteTable = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!(
        "read_json: {} rows, rounds {:?}",
        table.votes_data.len(),
        table.vote_rounds
    );
    convert_table(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_conversion() {
        let table: VoteTable = serde_json::from_str(
            r#"{
                "vote_rounds": ["R 1", "R2"],
                "votes_data": [
                    {"character": "X", "series": "S", "votes": [10, null]},
                    {"character": "Y", "votes": ["3/4", 5.5]}
                ],
                "participating_counts": {"R 1": 2, "R2": 1}
            }"#,
        )
        .unwrap();
        let input = convert_table(table).unwrap();
        assert_eq!(input.round_names, vec!["R1", "R2"]);
        assert_eq!(input.records[0].rounds["R1"], Some(10.0));
        assert_eq!(input.records[0].rounds["R2"], None);
        assert_eq!(input.records[1].rounds["R1"], Some(7.0));
        assert_eq!(input.records[1].group, "");
        assert_eq!(input.participating["R1"], 2);
    }

    #[test]
    fn wrong_values_are_errors() {
        let table: VoteTable = serde_json::from_str(
            r#"{"vote_rounds": ["R1"], "votes_data": [{"character": "X", "votes": [[1]]}]}"#,
        )
        .unwrap();
        assert!(convert_table(table).is_err());
    }
}
