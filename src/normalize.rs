//! Turns whatever the inference endpoint sent back into canonical
//! [`PredictionRecord`]s.
//!
//! Endpoints disagree on the payload shape: some return a bare object, some a
//! list of candidates, and some wrap that list in one or more redundant
//! single-element arrays. Malformed items never fail the pipeline; they are
//! replaced by `{label: "unknown", score: 0}`.

use serde_json::{Map, Value};

use crate::types::PredictionRecord;

const UNKNOWN_LABEL: &str = "unknown";

/// Accepted payload shapes once redundant nesting has been peeled off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PredictionShape<'a> {
    Records(&'a [Value]),
    Single(&'a Value),
}

impl<'a> PredictionShape<'a> {
    pub fn decode(raw: &'a Value) -> Self {
        match unwrap_nesting(raw) {
            Value::Array(items) => Self::Records(items),
            other => Self::Single(other),
        }
    }

    fn items(self) -> &'a [Value] {
        match self {
            Self::Records(items) => items,
            Self::Single(item) => std::slice::from_ref(item),
        }
    }
}

/// Peels `[[...]]` down to `[...]` for any depth of single-element wrapping.
fn unwrap_nesting(mut raw: &Value) -> &Value {
    while let Value::Array(items) = raw {
        match items.as_slice() {
            [inner @ Value::Array(_)] => raw = inner,
            _ => break,
        }
    }
    raw
}

pub fn normalize(raw: &Value) -> Vec<PredictionRecord> {
    PredictionShape::decode(raw)
        .items()
        .iter()
        .map(sanitize)
        .collect()
}

fn sanitize(item: &Value) -> PredictionRecord {
    match item {
        Value::Object(fields) => sanitize_object(fields),
        // Arrays are treated as positional records: label at index 0, no score.
        Value::Array(positional) => PredictionRecord::new(
            positional
                .first()
                .filter(|v| !v.is_null())
                .map_or_else(|| UNKNOWN_LABEL.to_string(), label_text),
            0.0,
        ),
        _ => PredictionRecord::unknown(),
    }
}

fn sanitize_object(fields: &Map<String, Value>) -> PredictionRecord {
    let label = present(fields, "label")
        .or_else(|| present(fields, "0"))
        .map_or_else(|| UNKNOWN_LABEL.to_string(), label_text);

    let score = present(fields, "score").map_or(0.0, loose_number);

    PredictionRecord::new(label, if score.is_finite() { score } else { 0.0 })
}

fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn label_text(value: &Value) -> String {
    let text = loose_string(value);
    if text.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else {
        text
    }
}

/// String coercion with scripting-language semantics: arrays join with `,`,
/// objects collapse to `[object Object]`.
fn loose_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) if i.unsigned_abs() <= MAX_SAFE_INTEGER => i.to_string(),
            _ => float_text(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(loose_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Integers above this lose precision as doubles, so they print like floats.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Shortest round-trip digits; exponent form outside `[1e-6, 1e21)`.
fn float_text(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs();
    if magnitude.is_finite() && !(1e-6..1e21).contains(&magnitude) {
        let text = format!("{n:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    n.to_string()
}

/// Numeric coercion; returns NaN where no number can be read.
fn loose_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_number_text(s),
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [only] => parse_number_text(&loose_string(only)),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

fn parse_number_text(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_radix_digits(&text[2..], radix);
    }

    match text {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => text.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Accumulates in `f64` so values past `u64::MAX` still come out approximate.
fn parse_radix_digits(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(label: &str, score: f64) -> PredictionRecord {
        PredictionRecord::new(label, score)
    }

    #[test]
    fn test_unwraps_redundant_nesting() {
        let nested = normalize(&json!([[[{"label": "pos", "score": 0.9}]]]));
        let flat = normalize(&json!([{"label": "pos", "score": 0.9}]));

        assert_eq!(nested, flat);
        assert_eq!(flat, vec![record("pos", 0.9)]);
    }

    #[test]
    fn test_stops_unwrapping_at_multi_element_array() {
        let records = normalize(&json!([[
            {"label": "negative", "score": 0.1},
            {"label": "positive", "score": 0.8}
        ]]));

        assert_eq!(
            records,
            vec![record("negative", 0.1), record("positive", 0.8)]
        );
    }

    #[test]
    fn test_bare_object_becomes_single_record() {
        assert_eq!(normalize(&json!({"label": "x"})), vec![record("x", 0.0)]);
    }

    #[test]
    fn test_missing_fields_default() {
        assert_eq!(normalize(&json!([{"foo": 1}])), vec![record("unknown", 0.0)]);
    }

    #[test]
    fn test_falsy_and_scalar_items_become_unknown() {
        let records = normalize(&json!([null, false, 0, "", "text", 3.5, true]));

        assert_eq!(records.len(), 7);
        assert!(records.iter().all(|r| *r == PredictionRecord::unknown()));
    }

    #[test]
    fn test_bare_scalars_and_null_payload() {
        assert_eq!(normalize(&Value::Null), vec![PredictionRecord::unknown()]);
        assert_eq!(normalize(&json!("oops")), vec![PredictionRecord::unknown()]);
    }

    #[test]
    fn test_empty_array_yields_no_records() {
        assert!(normalize(&json!([])).is_empty());
        assert!(normalize(&json!([[[]]])).is_empty());
    }

    #[test]
    fn test_positional_label_fallbacks() {
        let records = normalize(&json!([
            {"0": "neutral", "score": 0.4},
            ["positive", 0.9],
            []
        ]));

        assert_eq!(
            records,
            vec![
                record("neutral", 0.4),
                record("positive", 0.0),
                record("unknown", 0.0)
            ]
        );
    }

    #[test]
    fn test_null_label_falls_through_to_positional() {
        let records = normalize(&json!([{"label": null, "0": "neg", "score": 0.3}]));
        assert_eq!(records, vec![record("neg", 0.3)]);
    }

    #[test]
    fn test_label_coercion() {
        let records = normalize(&json!([
            {"label": 2},
            {"label": 1.5},
            {"label": true},
            {"label": ["a", "b"]},
            {"label": {"nested": 1}},
            {"label": ""}
        ]));

        let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["2", "1.5", "true", "a,b", "[object Object]", "unknown"]
        );
    }

    #[test]
    fn test_score_coercion() {
        let records = normalize(&json!([
            {"label": "a", "score": "0.75"},
            {"label": "b", "score": " 0x10 "},
            {"label": "c", "score": true},
            {"label": "d", "score": "abc"},
            {"label": "e", "score": "Infinity"},
            {"label": "f", "score": {"v": 1}},
            {"label": "g", "score": ["0.5"]},
            {"label": "h", "score": [1, 2]},
            {"label": "i", "score": ""},
            {"label": "j", "score": null}
        ]));

        let scores: Vec<_> = records.iter().map(|r| r.score).collect();
        assert_eq!(
            scores,
            vec![0.75, 16.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_numeric_labels_use_exponent_outside_plain_range() {
        let records = normalize(&json!([
            {"label": 1e21},
            {"label": 1.5e21},
            {"label": 1e-7},
            {"label": -2.5e-8},
            {"label": 1e20},
            {"label": 0.000001},
            {"label": 18446744073709551615u64},
            {"label": 9007199254740993u64}
        ]));

        let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "1e+21",
                "1.5e+21",
                "1e-7",
                "-2.5e-8",
                "100000000000000000000",
                "0.000001",
                "18446744073709552000",
                "9007199254740992",
            ]
        );
    }

    #[test]
    fn test_radix_scores_beyond_u64() {
        let records = normalize(&json!([
            {"label": "a", "score": "0x10000000000000000"},
            {"label": "b", "score": "0b101"},
            {"label": "c", "score": "0o17"},
            {"label": "d", "score": "0x"},
            {"label": "e", "score": "0xZZ"}
        ]));

        let scores: Vec<_> = records.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![18446744073709551616.0, 5.0, 15.0, 0.0, 0.0]);
    }

    #[test]
    fn test_records_always_well_formed() {
        let payloads = [
            json!(null),
            json!([[[[null]]]]),
            json!([{"label": "", "score": "NaN"}, [], {}, [[1]]]),
            json!({"score": -1e308, "label": [null]}),
            json!([{"label": {"a": [1]}, "score": [[["7"]]]}]),
        ];

        for payload in &payloads {
            for r in normalize(payload) {
                assert!(r.score.is_finite(), "non-finite score for {payload}");
                assert!(!r.label.is_empty(), "empty label for {payload}");
            }
        }
    }

    #[test]
    fn test_decode_shapes() {
        let list = json!([[{"label": "a"}, {"label": "b"}]]);
        assert!(matches!(
            PredictionShape::decode(&list),
            PredictionShape::Records(items) if items.len() == 2
        ));

        let single = json!({"label": "a"});
        assert_eq!(
            PredictionShape::decode(&single),
            PredictionShape::Single(&single)
        );
    }
}
