use log::warn;
use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Round names are compared without their whitespace.
pub fn normalize_round_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Keeps finite values, rounded to two decimals.
pub fn finite_vote(x: f64) -> Option<f64> {
    if x.is_finite() {
        Some((x * 100.0).round() / 100.0)
    } else {
        None
    }
}

/// Reads a vote written as text.
///
/// Empty text means no vote. A value such as `"120/35"` is the sum of its
/// parts, ignoring the parts that are not numbers.
pub fn parse_vote_text(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.contains('/') {
        let parts: Vec<f64> = s.split('/').filter_map(parse_vote_text).collect();
        return if parts.is_empty() {
            None
        } else {
            finite_vote(parts.iter().sum())
        };
    }
    match s.to_lowercase().as_str() {
        "inf" | "-inf" | "infinity" | "-infinity" | "nan" => return None,
        _ => {}
    }
    match s.parse::<f64>() {
        Ok(x) => finite_vote(x),
        Err(_) => {
            warn!("parse_vote_text: could not read vote {:?}", s);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_texts() {
        assert_eq!(parse_vote_text(""), None);
        assert_eq!(parse_vote_text("   "), None);
        assert_eq!(parse_vote_text(" 42 "), Some(42.0));
        assert_eq!(parse_vote_text("120/35"), Some(155.0));
        assert_eq!(parse_vote_text("120/abc"), Some(120.0));
        assert_eq!(parse_vote_text("/"), None);
        assert_eq!(parse_vote_text("NaN"), None);
        assert_eq!(parse_vote_text("-Infinity"), None);
        assert_eq!(parse_vote_text("1.234"), Some(1.23));
        assert_eq!(parse_vote_text("abc"), None);
    }

    #[test]
    fn names() {
        assert_eq!(simplify_file_name("/data/season 3/votes.xlsx"), "votes.xlsx");
        assert_eq!(simplify_file_name("votes.json"), "votes.json");
        assert_eq!(normalize_round_name("第一阶段 第1轮"), "第一阶段第1轮");
    }
}
