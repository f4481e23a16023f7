use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Search parameters pulled out of a free-text question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedQuery {
    /// Trimmed; empty when the model could not resolve a company.
    pub company: String,
    /// Trimmed interviewee name, empty when not mentioned.
    pub name: String,
    /// Opaque date filter, passed to the backend as-is.
    pub date: Option<String>,
}

/// Arguments of the `extract_parameters` tool call, exactly as declared in the
/// schema sent to the model.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionArgs {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl ExtractionArgs {
    /// Parse raw tool-call arguments. Only a JSON object is accepted; serde
    /// would otherwise read a sequence positionally.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<Value>(raw)? {
            object @ Value::Object(_) => serde_json::from_value(object),
            other => Err(serde_json::Error::custom(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<ExtractionArgs> for ExtractedQuery {
    fn from(args: ExtractionArgs) -> Self {
        let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).unwrap_or_default();
        let date = trimmed(args.date);

        Self {
            company: trimmed(args.company),
            name: trimmed(args.name),
            date: if date.is_empty() { None } else { Some(date) },
        }
    }
}

impl ExtractedQuery {
    pub fn has_company(&self) -> bool {
        !self.company.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_normalise() {
        let args = ExtractionArgs::parse(r#"{"company":"  ABC Corp ","date":"  "}"#).unwrap();
        let q = ExtractedQuery::from(args);
        assert_eq!(q.company, "ABC Corp");
        assert_eq!(q.name, "");
        assert_eq!(q.date, None);
        assert!(q.has_company());
    }

    #[test]
    fn test_null_company_is_empty_not_error() {
        let args = ExtractionArgs::parse(r#"{"company":null,"date":null}"#).unwrap();
        assert!(!ExtractedQuery::from(args).has_company());
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        assert!(ExtractionArgs::parse(r#"{"company":42}"#).is_err());
        assert!(ExtractionArgs::parse(r#"{"company":"A","venue":"x"}"#).is_err());
        assert!(ExtractionArgs::parse(r#"["ABC"]"#).is_err());
        assert!(ExtractionArgs::parse(r#""ABC Corp""#).is_err());
        assert!(ExtractionArgs::parse("null").is_err());
    }
}
