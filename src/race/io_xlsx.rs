use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::race::io_common::{finite_vote, normalize_round_name, parse_vote_text};
use crate::race::*;

const ENTITY_HEADERS: [&str; 2] = ["角色", "character"];
const GROUP_HEADERS: [&str; 2] = ["作品", "series"];

fn get_range(path: &str, worksheet_name: Option<&str>) -> RaceResult<Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

fn read_text_cell(cell: &DataType) -> Option<String> {
    match cell {
        DataType::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

fn read_vote_cell(cell: &DataType, lineno: usize) -> RaceResult<Option<f64>> {
    match cell {
        DataType::Empty => Ok(None),
        DataType::Int(i) => Ok(Some(*i as f64)),
        DataType::Float(f) => Ok(finite_vote(*f)),
        DataType::String(s) => Ok(parse_vote_text(s)),
        DataType::Error(_) => Ok(None),
        _ => Err(RaceError::ExcelWrongCellType {
            lineno: lineno as u64,
            content: format!("{:?}", cell),
        }),
    }
}

fn find_column(header: &[DataType], names: &[&str]) -> Option<usize> {
    header.iter().position(|cell| match read_text_cell(cell) {
        Some(s) => names.iter().any(|n| s.eq_ignore_ascii_case(n)),
        None => false,
    })
}

fn read_range(wrange: &Range<DataType>, path: &str) -> RaceResult<VoteInput> {
    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu { path })?;
    debug!("read_range: header: {:?}", header);

    let entity_col = find_column(header, &ENTITY_HEADERS).context(MissingColumnSnafu {
        column: ENTITY_HEADERS[0],
        path,
    })?;
    let group_col = find_column(header, &GROUP_HEADERS);
    if group_col.is_none() {
        warn!("read_range: no series column in {:?}", path);
    }

    // Every other named column is a round.
    let round_cols: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != entity_col && Some(*idx) != group_col)
        .filter_map(|(idx, cell)| read_text_cell(cell).map(|s| (idx, normalize_round_name(&s))))
        .collect();
    debug!("read_range: rounds: {:?}", round_cols);

    let mut records: Vec<RawEntityRecord> = Vec::new();
    for (idx, row) in iter.enumerate() {
        // Header is line 1
        let lineno = idx + 2;
        let entity = match row.get(entity_col).and_then(read_text_cell) {
            Some(e) => e,
            None => {
                debug!("read_range: line {}: no name, skipping", lineno);
                continue;
            }
        };
        let group = group_col
            .and_then(|c| row.get(c))
            .and_then(read_text_cell)
            .unwrap_or_default();
        let mut rounds: HashMap<String, Option<f64>> = HashMap::new();
        for (col, round_name) in round_cols.iter() {
            let vote = match row.get(*col) {
                Some(cell) => read_vote_cell(cell, lineno)?,
                None => None,
            };
            rounds.insert(round_name.clone(), vote);
        }
        records.push(RawEntityRecord {
            entity,
            group,
            rounds,
        });
    }
    Ok(VoteInput {
        round_names: round_cols.into_iter().map(|(_, name)| name).collect(),
        records,
        participating: HashMap::new(),
    })
}

/// Reads a vote matrix: one row per entity, one column per round.
pub fn read_excel_file(path: &str, worksheet_name: Option<&str>) -> RaceResult<VoteInput> {
    let wrange = get_range(path, worksheet_name)?;
    let input = read_range(&wrange, path)?;
    info!(
        "read_excel_file: {:?}: {} entities over {} rounds",
        io_common::simplify_file_name(path),
        input.records.len(),
        input.round_names.len()
    );
    Ok(input)
}
