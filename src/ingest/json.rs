use serde_json::Value as Json;
use crate::types::{InsightError, Row, Table, Value};

/// Reads a JSON array of objects. Columns are keys in first-seen order; nested
/// values are kept as their JSON text.
pub fn parse_json(name: &str, text: &str) -> Result<Table, InsightError> {
    let parsed: Json = serde_json::from_str(text)
        .map_err(|e| InsightError::ParseError(format!("'{name}' is not valid JSON: {e}")))?;

    let Json::Array(items) = parsed else {
        return Err(InsightError::ParseError(format!("'{name}' must contain an array of objects")));
    };

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Json::Object(map) = item else {
            return Err(InsightError::ParseError(format!("'{name}' element {i} is not an object")));
        };
        for key in map.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        rows.push(Row::from_pairs(map.iter().map(|(k, v)| (k.clone(), Value::from(v)))));
    }

    Ok(Table::new(name, columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_of_objects() {
        let table = parse_json("d.json", r#"[{"b": 1, "a": "x"}, {"a": null, "c": {"n": 1}}]"#).unwrap();
        assert_eq!(table.columns, vec!["b", "a", "c"]);
        assert_eq!(table.rows[0].get("b"), &Value::Integer(1));
        assert!(table.rows[1].get("a").is_null());
        assert!(table.rows[1].get("b").is_null());
        assert_eq!(table.rows[1].get("c"), &Value::from(r#"{"n":1}"#));
    }

    #[test]
    fn test_wrong_shapes() {
        assert!(matches!(parse_json("x", "{\"a\": 1}"), Err(InsightError::ParseError(_))));
        assert!(matches!(parse_json("x", "[1, 2]"), Err(InsightError::ParseError(_))));
        assert!(matches!(parse_json("x", "[{"), Err(InsightError::ParseError(_))));
    }

    #[test]
    fn test_empty_array() {
        let table = parse_json("x", "[]").unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.col_count(), 0);
    }
}
