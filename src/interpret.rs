use serde_json::Value;

use crate::normalize::normalize;
use crate::types::{PredictionRecord, SentimentLabel, SentimentResult};

/// Picks the highest-scoring record and maps its label onto a sentiment.
pub fn interpret(records: &[PredictionRecord]) -> SentimentResult {
    let Some(top) = top_record(records) else {
        return SentimentResult::unknown();
    };

    SentimentResult {
        label: classify(&top.label),
        score: top.score,
    }
}

/// Normalizes a raw inference payload and interprets it in one step.
pub fn analyze(raw: &Value) -> SentimentResult {
    interpret(&normalize(raw))
}

/// First record holding the maximum score, i.e. the head of a stable
/// descending sort.
fn top_record(records: &[PredictionRecord]) -> Option<&PredictionRecord> {
    records
        .iter()
        .reduce(|best, candidate| {
            if candidate.score > best.score {
                candidate
            } else {
                best
            }
        })
}

pub fn classify(label: &str) -> SentimentLabel {
    if label.is_empty() {
        return SentimentLabel::Unknown;
    }

    let lowered = label.to_lowercase();

    // Model-index convention (LABEL_0/1/2). No digit match falls through.
    if lowered.starts_with("label_") {
        if lowered.contains('0') {
            return SentimentLabel::Negative;
        }
        if lowered.contains('1') {
            return SentimentLabel::Neutral;
        }
        if lowered.contains('2') {
            return SentimentLabel::Positive;
        }
    }

    if lowered.contains("neg") {
        SentimentLabel::Negative
    } else if lowered.contains("neu") {
        SentimentLabel::Neutral
    } else if lowered.contains("pos") {
        SentimentLabel::Positive
    } else {
        SentimentLabel::Other(capitalize(label))
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(items: &[(&str, f64)]) -> Vec<PredictionRecord> {
        items
            .iter()
            .map(|(label, score)| PredictionRecord::new(*label, *score))
            .collect()
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(interpret(&[]), SentimentResult::unknown());
        assert_eq!(interpret(&[]).label.to_string(), "Unknown");
    }

    #[test]
    fn test_top_by_score_then_label_index() {
        let result = interpret(&records(&[("LABEL_2", 0.7), ("LABEL_0", 0.9)]));
        assert_eq!(
            result,
            SentimentResult {
                label: SentimentLabel::Negative,
                score: 0.9
            }
        );
    }

    #[test]
    fn test_case_insensitive_substring() {
        let result = interpret(&records(&[("POSITIVE", 0.5)]));
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.score, 0.5);
    }

    #[test]
    fn test_fallback_capitalizes_original() {
        let result = interpret(&records(&[("surprise", 0.4)]));
        assert_eq!(result.label, SentimentLabel::Other("Surprise".to_string()));
        assert_eq!(result.label.to_string(), "Surprise");
        assert_eq!(result.score, 0.4);
    }

    #[test]
    fn test_fallback_keeps_rest_unchanged() {
        assert_eq!(classify("joY"), SentimentLabel::Other("JoY".to_string()));
        assert_eq!(classify("élan"), SentimentLabel::Other("Élan".to_string()));
    }

    #[test]
    fn test_tie_keeps_first() {
        let result = interpret(&records(&[("neg", 0.5), ("pos", 0.5)]));
        assert_eq!(result.label, SentimentLabel::Negative);

        let result = interpret(&records(&[("other", 0.1), ("pos", 0.5), ("neg", 0.5)]));
        assert_eq!(result.label, SentimentLabel::Positive);
    }

    #[test]
    fn test_does_not_reorder_input() {
        let input = records(&[("a", 0.1), ("b", 0.9), ("c", 0.5)]);
        let before = input.clone();
        let _ = interpret(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn test_label_index_convention() {
        assert_eq!(classify("LABEL_0"), SentimentLabel::Negative);
        assert_eq!(classify("LABEL_1"), SentimentLabel::Neutral);
        assert_eq!(classify("label_2"), SentimentLabel::Positive);
        // "0" wins over "1" when both appear.
        assert_eq!(classify("LABEL_10"), SentimentLabel::Negative);
    }

    #[test]
    fn test_label_prefix_without_digit_falls_through() {
        assert_eq!(classify("label_pos"), SentimentLabel::Positive);
        assert_eq!(classify("label_neutral"), SentimentLabel::Neutral);
        assert_eq!(
            classify("LABEL_x"),
            SentimentLabel::Other("LABEL_x".to_string())
        );
    }

    #[test]
    fn test_substring_order() {
        assert_eq!(classify("negative"), SentimentLabel::Negative);
        assert_eq!(classify("Neutral"), SentimentLabel::Neutral);
        assert_eq!(classify("positive"), SentimentLabel::Positive);
        // "neg" is checked before "pos".
        assert_eq!(classify("posneg"), SentimentLabel::Negative);
    }

    #[test]
    fn test_unknown_label_round_trips_to_unknown_text() {
        assert_eq!(classify("unknown").to_string(), "Unknown");
        assert_eq!(classify(""), SentimentLabel::Unknown);
    }

    #[test]
    fn test_analyze_raw_payload() {
        let raw = json!([[
            {"label": "negative", "score": 0.02},
            {"label": "neutral", "score": 0.11},
            {"label": "positive", "score": 0.87}
        ]]);
        let result = analyze(&raw);
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.score, 0.87);

        assert_eq!(analyze(&json!({"error": "loading"})).label.to_string(), "Unknown");
    }

    #[test]
    fn test_result_serializes_label_as_text() {
        let result = interpret(&records(&[("LABEL_1", 0.6)]));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"label": "Neutral", "score": 0.6})
        );
    }
}
