/// Option matching utility
///
/// Given the label the driver wants to click and the option labels it can
/// see, score each option and return the index of the best match. Used by
/// the driver's location switcher; not part of the decision pipeline.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OptionMatch {
    pub index: usize,
    pub selected: Option<String>,
    pub confidence: i64,
    pub match_type: &'static str,
}

/// Pick the option best matching `target`.
///
/// Scoring: +10 when the whole target appears in the option, +2 per target
/// token found, plus a small bonus for shorter (more specific) options.
/// With no scoring match at all the first option is returned with zero
/// confidence so the driver always has something to click.
pub fn select_option(target: &str, options: &[String]) -> OptionMatch {
    let target_lower = target.to_lowercase();
    let normalized = target_lower.replace(',', " ");
    let target_parts: Vec<&str> = normalized.split_whitespace().collect();

    let mut best_index: Option<usize> = None;
    let mut best_score: i64 = 0;
    let mut best_exact = false;

    for (index, option) in options.iter().enumerate() {
        let option_lower = option.to_lowercase();
        let mut score: i64 = 0;

        let exact = option_lower.contains(&target_lower);
        if exact {
            score += 10;
        }

        for part in &target_parts {
            if option_lower.contains(part) {
                score += 2;
            }
        }

        if score > 0 {
            score += (10 - (option.len() as i64) / 5).max(0);
        }

        if score > best_score {
            best_score = score;
            best_index = Some(index);
            best_exact = exact;
        }
    }

    match best_index {
        Some(index) => OptionMatch {
            index,
            selected: Some(options[index].clone()),
            confidence: best_score,
            match_type: if best_exact { "exact" } else { "partial" },
        },
        None => OptionMatch {
            index: 0,
            selected: options.first().cloned(),
            confidence: 0,
            match_type: "fallback",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_substring_wins() {
        let options = opts(&["New York, USA", "York, UK", "Newark, USA"]);
        let result = select_option("New York", &options);
        assert_eq!(result.index, 0);
        assert_eq!(result.match_type, "exact");
        assert!(result.confidence >= 10);
    }

    #[test]
    fn token_overlap_matches_partially() {
        let options = opts(&["Paris, France", "Springfield, USA"]);
        let result = select_option("Paris, TX", &options);
        assert_eq!(result.index, 0);
        assert_eq!(result.match_type, "partial");
        assert!(result.confidence > 0);
    }

    #[test]
    fn shorter_options_preferred_on_equal_overlap() {
        let options = opts(&[
            "São Paulo International Airport and Surrounding Metropolitan Area",
            "São Paulo",
        ]);
        let result = select_option("São Paulo", &options);
        assert_eq!(result.index, 1);
    }

    #[test]
    fn no_match_falls_back_to_first_option() {
        let options = opts(&["Tokyo", "Osaka"]);
        let result = select_option("Reykjavik", &options);
        assert_eq!(result.index, 0);
        assert_eq!(result.selected.as_deref(), Some("Tokyo"));
        assert_eq!(result.confidence, 0);
        assert_eq!(result.match_type, "fallback");
    }

    #[test]
    fn empty_options_are_handled() {
        let result = select_option("Anywhere", &[]);
        assert_eq!(result.index, 0);
        assert!(result.selected.is_none());
        assert_eq!(result.match_type, "fallback");
    }
}
