use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Placeholder used when the latest log carries no summary text.
pub const NO_SUMMARY: &str = "[no summary]";
const NO_COMPANY: &str = "(no company)";
const NO_TIMESTAMP: &str = "(unknown date)";

/// One row of `GET /interview/interviewees`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervieweeCandidate {
    #[serde(rename = "intervieweeId", alias = "id", deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub interviewees: Vec<IntervieweeCandidate>,
}

/// Body of `GET /interview/interviewees/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterviewDetail {
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl LogEntry {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

impl InterviewDetail {
    /// Most recent log by `createdAt`.
    ///
    /// The records service documents `logs` as newest-first, so entries without
    /// a parseable timestamp rank below timestamped ones and ties resolve to
    /// the lowest index.
    pub fn latest_log(&self) -> Option<&LogEntry> {
        self.logs
            .iter()
            .enumerate()
            .max_by_key(|(idx, log)| (log.created_at(), std::cmp::Reverse(*idx)))
            .map(|(_, log)| log)
    }
}

/// Format one candidate plus its latest log into a synthesis input record.
pub fn raw_summary(candidate: &IntervieweeCandidate, log: &LogEntry) -> String {
    let company = candidate
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_COMPANY);
    let updated = candidate.updated_at.as_deref().unwrap_or(NO_TIMESTAMP);
    let summary = log
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUMMARY);

    format!("● {} | {} | {}\n{}", candidate.name, company, updated, summary)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(summary: Option<&str>, created_at: Option<&str>) -> LogEntry {
        LogEntry {
            summary: summary.map(String::from),
            created_at: created_at.map(String::from),
        }
    }

    #[test]
    fn test_candidate_accepts_numeric_and_aliased_ids() {
        let a: IntervieweeCandidate =
            serde_json::from_value(json!({"intervieweeId": 17, "name": "Kim"})).unwrap();
        assert_eq!(a.id, "17");

        let b: IntervieweeCandidate = serde_json::from_value(
            json!({"id": "iv-9", "name": "Lee", "companyName": "ABC Corp", "updatedAt": "2024-07-10"}),
        )
        .unwrap();
        assert_eq!(b.id, "iv-9");
        assert_eq!(b.company_name.as_deref(), Some("ABC Corp"));
    }

    #[test]
    fn test_latest_log_prefers_newest_timestamp() {
        let detail = InterviewDetail {
            logs: vec![
                log(Some("older"), Some("2024-07-01T09:00:00Z")),
                log(Some("newest"), Some("2024-07-10 15:30:00")),
                log(Some("undated"), None),
            ],
        };
        assert_eq!(detail.latest_log().unwrap().summary.as_deref(), Some("newest"));
    }

    #[test]
    fn test_latest_log_falls_back_to_first_entry() {
        let detail = InterviewDetail {
            logs: vec![log(Some("first"), None), log(Some("second"), Some("garbage"))],
        };
        assert_eq!(detail.latest_log().unwrap().summary.as_deref(), Some("first"));
        assert!(InterviewDetail::default().latest_log().is_none());
    }

    #[test]
    fn test_raw_summary_uses_placeholders() {
        let candidate = IntervieweeCandidate {
            id: "1".to_string(),
            name: "Park".to_string(),
            company_name: None,
            updated_at: Some("2024-07-10".to_string()),
        };
        let text = raw_summary(&candidate, &log(None, None));
        assert_eq!(text, "● Park | (no company) | 2024-07-10\n[no summary]");

        let text = raw_summary(&candidate, &log(Some("  Discussed pricing.\n"), None));
        assert!(text.ends_with("\nDiscussed pricing."));
    }
}
