//! Metrics column mapping
//!
//! Metrics frames are bare numeric arrays. Their meaning comes from the
//! column list the service returns once, when the metrics stream is
//! subscribed. A metric `X` may be accompanied by an `X.isActive` column;
//! when it is, the value is only trusted if the flag is true.

use super::event::PerformanceMetricsEvent;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

const ACTIVE_SUFFIX: &str = ".isActive";

/// Shared handle to the metrics column schema. Set by whoever subscribes
/// to the metrics stream, read by the demultiplexer on every frame.
#[derive(Clone, Default)]
pub struct MetricsSchema {
    columns: Arc<RwLock<Option<Arc<Vec<String>>>>>,
}

impl MetricsSchema {
    pub fn new() -> MetricsSchema {
        MetricsSchema::default()
    }

    /// Stores the column list verbatim, replacing any earlier one.
    pub fn replace(&self, columns: Vec<String>) {
        *self.columns.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(columns));
    }

    pub fn clear(&self) {
        *self.columns.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn columns(&self) -> Option<Arc<Vec<String>>> {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.columns().is_some()
    }
}

/// One metrics sample, with validity flags already applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRow {
    values: HashMap<String, f64>,
}

fn is_active(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|x| x != 0.0).unwrap_or(false),
        _ => false,
    }
}

impl MetricsRow {
    /// Zips `columns` with `values` by position. Values missing from the
    /// array, null, or non-numeric read as 0.
    pub fn map(columns: &[String], values: &[Value]) -> MetricsRow {
        let positions: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut row = HashMap::new();
        for (i, name) in columns.iter().enumerate() {
            if name.ends_with(ACTIVE_SUFFIX) {
                continue;
            }
            let raw = values.get(i).and_then(Value::as_f64).unwrap_or(0.0);
            let flag = format!("{}{}", name, ACTIVE_SUFFIX);
            let value = match positions.get(flag.as_str()) {
                Some(&j) if !is_active(values.get(j)) => 0.0,
                _ => raw,
            };
            row.insert(name.clone(), value);
        }
        MetricsRow { values: row }
    }

    /// Value of a column, 0 if absent.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    fn unit(&self, name: &str) -> f64 {
        self.get(name).clamp(0.0, 1.0)
    }

    pub fn to_event(&self, device: &str, time: f64) -> PerformanceMetricsEvent {
        let focus = if self.values.contains_key("foc") {
            self.unit("foc")
        } else {
            self.unit("attention")
        };
        PerformanceMetricsEvent {
            device: device.to_string(),
            excitement: self.unit("exc"),
            engagement: self.unit("eng"),
            stress: self.unit("str"),
            relaxation: self.unit("rel"),
            interest: self.unit("int"),
            focus,
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn inactive_metrics_read_as_zero() {
        let columns = cols(&["exc.isActive", "exc"]);
        let row = MetricsRow::map(&columns, json!([false, 0.9]).as_array().unwrap());
        assert_eq!(row.get("exc"), 0.0);
        assert_eq!(row.to_event("d", 0.0).excitement, 0.0);

        let row = MetricsRow::map(&columns, json!([true, 0.9]).as_array().unwrap());
        assert_eq!(row.get("exc"), 0.9);
        assert_eq!(row.to_event("d", 0.0).excitement, 0.9);
    }

    #[test]
    fn missing_flag_value_zeroes_metric() {
        let columns = cols(&["eng.isActive", "eng"]);
        let row = MetricsRow::map(&columns, json!([null, 0.4]).as_array().unwrap());
        assert_eq!(row.get("eng"), 0.0);
    }

    #[test]
    fn unflagged_metrics_pass_through() {
        let columns = cols(&["exc.isActive", "exc", "lex", "foc"]);
        let row = MetricsRow::map(&columns, json!([true, 0.3, 0.7, null]).as_array().unwrap());
        assert_eq!(row.get("lex"), 0.7);
        assert_eq!(row.get("foc"), 0.0);
        assert_eq!(row.get("nope"), 0.0);
    }

    #[test]
    fn full_service_schema() {
        let columns = cols(&[
            "eng.isActive", "eng", "exc.isActive", "exc", "lex", "str.isActive", "str",
            "rel.isActive", "rel", "int.isActive", "int", "foc.isActive", "foc",
        ]);
        let values = json!([true, 0.5, true, 0.6, 0.4, false, 0.8, true, 0.2, true, 0.35, true, 0.9]);
        let ev = MetricsRow::map(&columns, values.as_array().unwrap()).to_event("A", 12.0);
        assert_eq!(ev.engagement, 0.5);
        assert_eq!(ev.excitement, 0.6);
        assert_eq!(ev.stress, 0.0);
        assert_eq!(ev.relaxation, 0.2);
        assert_eq!(ev.interest, 0.35);
        assert_eq!(ev.focus, 0.9);
        assert_eq!(ev.time, 12.0);
    }

    #[test]
    fn attention_is_an_alias_for_focus() {
        let columns = cols(&["attention.isActive", "attention"]);
        let row = MetricsRow::map(&columns, json!([true, 0.25]).as_array().unwrap());
        assert_eq!(row.to_event("d", 0.0).focus, 0.25);
    }

    #[test]
    fn schema_replace_and_clear() {
        let schema = MetricsSchema::new();
        assert!(!schema.is_ready());
        schema.replace(cols(&["a"]));
        schema.replace(cols(&["b", "c"]));
        assert_eq!(schema.columns().unwrap().as_slice(), &cols(&["b", "c"])[..]);
        schema.clear();
        assert!(schema.columns().is_none());
    }
}
