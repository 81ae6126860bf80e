//! WorkflowMax job list response parsing
//!
//! The job list endpoint answers in one of two shapes depending on account
//! settings and the `Accept` header it chooses to honour:
//!
//! ```text
//! XML:  <Response><Status>OK</Status><Jobs><Job><ID/><Name/><DateCreated/></Job>...</Jobs></Response>
//! JSON: {"Response": {"Job": [ {...}, ... ] | {...}}}
//!       {"Response": {"Jobs": {"Job": [ ... ] | {...}}}}
//! ```
//!
//! Both are normalised into [`Job`]. A single JSON job is not wrapped in an
//! array. Entries without an identifier are dropped with a warning; a body
//! that is neither shape is a [`WorkflowMaxError::ParseError`].
//!
//! Timestamps usually carry no offset. They are wall-clock times in the
//! account's zone and are resolved through the [`Tz`] passed in.

use crate::error::{Result, WorkflowMaxError};
use bridge_traits::jobs::Job;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One job as it appears in a JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    /// Job number; usually a string, occasionally a bare number
    #[serde(rename = "ID", default)]
    pub id: Option<Value>,

    #[serde(rename = "Name", default)]
    pub name: Option<String>,

    #[serde(rename = "DateCreated", default)]
    pub date_created: Option<String>,

    #[serde(rename = "DateModified", default)]
    pub date_modified: Option<String>,
}

/// `T` or `[T]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    #[serde(rename = "Response")]
    response: JsonResponse,
}

#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(rename = "Status", default)]
    status: Option<String>,

    #[serde(rename = "ErrorDescription", default)]
    error_description: Option<String>,

    #[serde(rename = "Job", default)]
    job: Option<OneOrMany<JobRecord>>,

    #[serde(rename = "Jobs", default)]
    jobs: Option<JobsWrapper>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobsWrapper {
    Keyed {
        #[serde(rename = "Job", default)]
        job: Option<OneOrMany<JobRecord>>,
    },
    Bare(Vec<JobRecord>),
}

/// Wire format of a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Xml,
    Json,
}

impl ResponseFormat {
    /// Sniff the format from the first non-whitespace character.
    pub fn detect(body: &str) -> Option<Self> {
        match body.trim_start_matches('\u{feff}').trim_start().chars().next() {
            Some('<') => Some(Self::Xml),
            Some('{') => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a job list body in either format.
pub fn parse_job_list(body: &str, zone: Tz) -> Result<Vec<Job>> {
    match ResponseFormat::detect(body) {
        Some(ResponseFormat::Xml) => parse_xml(body, zone),
        Some(ResponseFormat::Json) => parse_json(body, zone),
        None => Err(WorkflowMaxError::ParseError(
            "response is neither XML nor JSON".to_string(),
        )),
    }
}

fn parse_xml(body: &str, zone: Tz) -> Result<Vec<Job>> {
    let doc = roxmltree::Document::parse(body.trim_start_matches('\u{feff}'))
        .map_err(|e| WorkflowMaxError::ParseError(format!("invalid XML: {}", e)))?;

    let root = doc.root_element();
    if let Some(status) = child_text(root, "Status") {
        if !status.eq_ignore_ascii_case("OK") {
            let description = child_text(root, "ErrorDescription").unwrap_or(status);
            return Err(WorkflowMaxError::Rejected(description.to_string()));
        }
    }

    let jobs = doc
        .descendants()
        .filter(|node| node.has_tag_name("Job"))
        .filter_map(|node| {
            let identifier = child_text(node, "ID").map(str::trim).unwrap_or_default();
            if identifier.is_empty() {
                warn!("Skipping XML job entry without an ID");
                return None;
            }

            Some(build_job(
                identifier,
                child_text(node, "Name").unwrap_or_default(),
                child_text(node, "DateCreated"),
                child_text(node, "DateModified"),
                zone,
            ))
        })
        .collect();

    Ok(jobs)
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.has_tag_name(name))
        .and_then(|child| child.text())
}

fn parse_json(body: &str, zone: Tz) -> Result<Vec<Job>> {
    let envelope: JsonEnvelope = serde_json::from_str(body.trim_start_matches('\u{feff}'))
        .map_err(|e| WorkflowMaxError::ParseError(format!("invalid JSON envelope: {}", e)))?;
    let response = envelope.response;

    if let Some(status) = &response.status {
        if !status.eq_ignore_ascii_case("OK") {
            return Err(WorkflowMaxError::Rejected(
                response.error_description.unwrap_or_else(|| status.clone()),
            ));
        }
    }

    let records = match (response.job, response.jobs) {
        (Some(job), _) => job.into_vec(),
        (None, Some(JobsWrapper::Keyed { job })) => job.map(OneOrMany::into_vec).unwrap_or_default(),
        (None, Some(JobsWrapper::Bare(records))) => records,
        (None, None) => Vec::new(),
    };

    let jobs = records
        .into_iter()
        .filter_map(|record| {
            let identifier = match record.id {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            if identifier.is_empty() {
                warn!("Skipping JSON job entry without an ID");
                return None;
            }

            Some(build_job(
                &identifier,
                record.name.as_deref().unwrap_or_default(),
                record.date_created.as_deref(),
                record.date_modified.as_deref(),
                zone,
            ))
        })
        .collect();

    Ok(jobs)
}

fn build_job(
    identifier: &str,
    title: &str,
    created: Option<&str>,
    modified: Option<&str>,
    zone: Tz,
) -> Job {
    let mut job = Job::new(identifier, title);
    job.created_at = created.and_then(|raw| parse_timestamp(raw, zone));
    job.modified_at = modified.and_then(|raw| parse_timestamp(raw, zone));
    job
}

/// Parse the timestamp shapes the API emits.
///
/// Values with an offset are taken as-is. Values without one are local to
/// `zone`; the earlier instant wins across a DST fold, and a time that falls
/// in a DST gap is `None`. Date-only values are `None` because they cannot
/// be placed inside a polling window.
pub fn parse_timestamp(raw: &str, zone: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| zone.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Pacific::Auckland;

    #[test]
    fn test_parse_xml_document() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<Response api-method="List">
  <Status>OK</Status>
  <Jobs>
    <Job>
      <ID>9000549</ID>
      <Name>Smith &amp;amp; Sons (Lot 4) Survey</Name>
      <DateCreated>2024-05-01T09:15:00</DateCreated>
      <Client><ID>77</ID><Name>Smith</Name></Client>
    </Job>
    <Job>
      <ID>9000549_1</ID>
      <Name>Smith Variation</Name>
    </Job>
  </Jobs>
</Response>"#;

        let jobs = parse_job_list(body, Tz::UTC).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].identifier, "9000549");
        // XML decoding leaves the inner entity for the name formatter
        assert_eq!(jobs[0].title, "Smith &amp; Sons (Lot 4) Survey");
        assert_eq!(
            jobs[0].created_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 15, 0).unwrap())
        );
        assert_eq!(jobs[1].identifier, "9000549_1");
        assert_eq!(jobs[1].created_at, None);
    }

    #[test]
    fn test_parse_xml_skips_entries_without_id() {
        let body = "<Response><Job><Name>Orphan</Name></Job><Job><ID>3001</ID><Name>Kept</Name></Job></Response>";

        let jobs = parse_job_list(body, Tz::UTC).unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].identifier, "3001");
    }

    #[test]
    fn test_parse_xml_error_status() {
        let body = "<Response><Status>ERROR</Status><ErrorDescription>Invalid date range</ErrorDescription></Response>";

        let err = parse_job_list(body, Tz::UTC).unwrap_err();
        assert!(matches!(err, WorkflowMaxError::Rejected(ref m) if m == "Invalid date range"));
    }

    #[test]
    fn test_parse_json_array() {
        let body = r#"{"Response":{"Status":"OK","Job":[
            {"ID":"2000101","Name":"Alpha","DateCreated":"2024-05-01T10:00:00Z"},
            {"ID":7000202,"Name":"Beta","DateModified":"2024-05-01 11:30:00"}
        ]}}"#;

        let jobs = parse_job_list(body, Tz::UTC).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].identifier, "2000101");
        assert_eq!(jobs[1].identifier, "7000202");
        assert_eq!(
            jobs[1].modified_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_json_single_object() {
        let body = r#"{"Response":{"Job":{"ID":"6000303","Name":"Solo"}}}"#;

        let jobs = parse_job_list(body, Tz::UTC).unwrap();

        assert_eq!(jobs, vec![Job::new("6000303", "Solo")]);
    }

    #[test]
    fn test_parse_json_nested_jobs() {
        let body = r#"{"Response":{"Jobs":{"Job":{"ID":"8000404","Name":"Nested"}}}}"#;
        assert_eq!(parse_job_list(body, Tz::UTC).unwrap()[0].identifier, "8000404");

        let empty = r#"{"Response":{"Status":"OK","Jobs":{}}}"#;
        assert!(parse_job_list(empty, Tz::UTC).unwrap().is_empty());
    }

    #[test]
    fn test_unrecognised_body_is_an_error() {
        assert!(matches!(
            parse_job_list("Service Unavailable", Tz::UTC),
            Err(WorkflowMaxError::ParseError(_))
        ));
        assert!(matches!(
            parse_job_list(r#"{"jobs":[]}"#, Tz::UTC),
            Err(WorkflowMaxError::ParseError(_))
        ));
        assert!(matches!(
            parse_job_list("<Response><Job>", Tz::UTC),
            Err(WorkflowMaxError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(parse_timestamp("2024-01-02T03:04:05Z", Tz::UTC), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T16:04:05+13:00", Tz::UTC), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T03:04:05", Tz::UTC), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T03:04:05.000", Tz::UTC), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02", Tz::UTC), None);
        assert_eq!(parse_timestamp("", Tz::UTC), None);
        assert_eq!(parse_timestamp("yesterday", Tz::UTC), None);
    }

    #[test]
    fn test_offsetless_timestamps_are_account_local() {
        // NZDT is UTC+13 in January
        assert_eq!(
            parse_timestamp("2024-01-02T16:04:05", Auckland),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        // An explicit offset ignores the zone
        assert_eq!(
            parse_timestamp("2024-01-02T03:04:05Z", Auckland),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
    }

    #[test]
    fn test_dst_transitions() {
        // Clocks go forward 02:00 -> 03:00 on 2024-09-29
        assert_eq!(parse_timestamp("2024-09-29T02:30:00", Auckland), None);

        // Clocks go back 03:00 -> 02:00 on 2024-04-07; the NZDT reading wins
        assert_eq!(
            parse_timestamp("2024-04-07T02:30:00", Auckland),
            Some(Utc.with_ymd_and_hms(2024, 4, 6, 13, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_job_list_resolves_zone() {
        let body = r#"{"Response":{"Job":{"ID":"6000303","Name":"Solo","DateCreated":"2024-05-01T09:00:00"}}}"#;

        let jobs = parse_job_list(body, Auckland).unwrap();

        // NZST is UTC+12 in May
        assert_eq!(
            jobs[0].created_at,
            Some(Utc.with_ymd_and_hms(2024, 4, 30, 21, 0, 0).unwrap())
        );
    }
}
