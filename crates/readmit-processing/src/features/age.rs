//! Age bracket parsing and grouping.

use once_cell::sync::Lazy;
use regex::Regex;

static AGE_BRACKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[\s*(\d+(?:\.\d+)?)\s*-\s*(\d+(?:\.\d+)?)\s*\)$")
        .expect("Invalid regex: age bracket")
});

/// Midpoint of a `[a-b)` bracket, e.g. `[70-80)` -> 75.
pub fn bracket_midpoint(bracket: &str) -> Option<f64> {
    let captures = AGE_BRACKET.captures(bracket.trim())?;
    let low: f64 = captures[1].parse().ok()?;
    let high: f64 = captures[2].parse().ok()?;
    (low < high).then(|| (low + high) / 2.0)
}

/// Label of the right-closed bin `(edges[i], edges[i + 1]]` holding `age`.
///
/// Values on or below the first edge, or above the last, have no group.
pub fn age_group<'a>(age: f64, edges: &[f64], labels: &'a [String]) -> Option<&'a str> {
    edges
        .windows(2)
        .zip(labels)
        .find(|(bin, _)| age > bin[0] && age <= bin[1])
        .map(|(_, label)| label.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["Young", "Middle", "Senior", "Elderly"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_bracket_midpoint() {
        assert_eq!(bracket_midpoint("[0-10)"), Some(5.0));
        assert_eq!(bracket_midpoint("[70-80)"), Some(75.0));
        assert_eq!(bracket_midpoint("[90-100)"), Some(95.0));
        assert_eq!(bracket_midpoint("70-80"), None);
        assert_eq!(bracket_midpoint("?"), None);
        assert_eq!(bracket_midpoint("[80-70)"), None);
    }

    #[test]
    fn test_age_group_bins_are_right_closed() {
        let edges = [0.0, 30.0, 50.0, 70.0, 100.0];
        let labels = labels();
        assert_eq!(age_group(5.0, &edges, &labels), Some("Young"));
        assert_eq!(age_group(30.0, &edges, &labels), Some("Young"));
        assert_eq!(age_group(35.0, &edges, &labels), Some("Middle"));
        assert_eq!(age_group(65.0, &edges, &labels), Some("Senior"));
        assert_eq!(age_group(95.0, &edges, &labels), Some("Elderly"));
        assert_eq!(age_group(0.0, &edges, &labels), None);
        assert_eq!(age_group(101.0, &edges, &labels), None);
    }
}
