//! Workflow-level settings: merging shared defaults into a definition and
//! decoding the result into typed parameters.

use crate::error::DslError;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dagforge_core::{DefaultArgs, StartDate, WorkflowParams};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Key whose mapping is merged argument by argument instead of replaced
pub const DEFAULT_ARGS_KEY: &str = "default_args";

/// Overlay a definition onto the shared defaults.
///
/// Top-level keys of the definition replace those of the defaults, except
/// `default_args`, which is merged one level deep.
pub fn merge_settings(definition: &Mapping, defaults: &Mapping) -> Mapping {
    let mut merged = defaults.clone();

    for (key, value) in definition {
        if key.as_str() == Some(DEFAULT_ARGS_KEY) {
            if let (Some(Value::Mapping(base)), Value::Mapping(overrides)) =
                (merged.get_mut(key), value)
            {
                for (arg, arg_value) in overrides {
                    base.insert(arg.clone(), arg_value.clone());
                }
                continue;
            }
        }
        merged.insert(key.clone(), value.clone());
    }

    merged
}

/// A definition after merging and decoding
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    /// Identifier override; the configuration key is used when absent
    pub dag_id: Option<String>,

    /// Typed workflow parameters
    pub params: WorkflowParams,

    /// Task configurations keyed by task id, in document order
    pub tasks: Mapping,

    /// Task-group configurations keyed by group id, in document order
    pub task_groups: Mapping,
}

#[derive(Debug, Default, Deserialize)]
struct RawDefaultArgs {
    owner: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    retries: Option<u32>,
    retry_delay_sec: Option<u64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    dag_id: Option<String>,
    default_args: Option<RawDefaultArgs>,
    description: Option<String>,
    schedule_interval: Option<String>,
    concurrency: Option<u32>,
    max_active_runs: Option<u32>,
    dagrun_timeout_sec: Option<u64>,
    catchup: Option<bool>,
    default_view: Option<String>,
    orientation: Option<String>,
    tags: Option<Vec<String>>,
    doc_md: Option<String>,
    tasks: Option<Mapping>,
    task_groups: Option<Mapping>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl WorkflowSettings {
    /// Decode merged settings for the workflow configured under `key`
    pub fn decode(key: &str, merged: Mapping) -> Result<Self, DslError> {
        let raw: RawWorkflow =
            serde_yaml::from_value(Value::Mapping(merged)).map_err(|source| DslError::Decode {
                context: format!("workflow {key}"),
                source,
            })?;

        let raw_args = raw.default_args.unwrap_or_default();
        let start_date = raw_args.start_date.as_deref().ok_or_else(|| {
            DslError::MissingRequiredField(format!("{key}.{DEFAULT_ARGS_KEY}.start_date"))
        })?;

        let default_args = DefaultArgs {
            owner: raw_args.owner,
            start_date: parse_start_date(start_date)?,
            end_date: raw_args.end_date.as_deref().map(parse_timestamp).transpose()?,
            retries: raw_args.retries,
            retry_delay: raw_args.retry_delay_sec.map(Duration::from_secs),
            extra: raw_args.extra,
        };

        let params = WorkflowParams {
            default_args,
            description: raw.description,
            schedule_interval: raw.schedule_interval,
            concurrency: raw.concurrency,
            max_active_runs: raw.max_active_runs,
            dagrun_timeout: raw.dagrun_timeout_sec.map(Duration::from_secs),
            catchup: raw.catchup,
            default_view: raw.default_view,
            orientation: raw.orientation,
            tags: raw.tags.unwrap_or_default(),
            doc_md: raw.doc_md,
            extra: raw.extra,
        };

        Ok(Self {
            dag_id: raw.dag_id,
            params,
            tasks: raw.tasks.unwrap_or_default(),
            task_groups: raw.task_groups.unwrap_or_default(),
        })
    }
}

/// Parse a start date: an ISO date, an RFC 3339 timestamp, or a relative
/// span such as `"2 days"`.
pub fn parse_start_date(raw: &str) -> Result<StartDate, DslError> {
    if let Ok(at) = parse_timestamp(raw) {
        return Ok(StartDate::Absolute(at));
    }

    parse_relative(raw).map(StartDate::Relative).ok_or_else(|| {
        DslError::InvalidDefinition(format!(
            "start_date `{raw}` is neither a date, a timestamp nor a relative span like `2 days`"
        ))
    })
}

/// Parse an ISO date (midnight UTC) or an RFC 3339 timestamp
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DslError> {
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .ok_or_else(|| DslError::InvalidDefinition(format!("`{raw}` is not a date or timestamp")))
}

fn parse_relative(raw: &str) -> Option<Duration> {
    let mut parts = raw.split_whitespace();
    let amount: u64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let unit_secs = match unit.strip_suffix('s').unwrap_or(unit) {
        "minute" => 60,
        "hour" => 3_600,
        "day" => 86_400,
        "week" => 604_800,
        _ => return None,
    };

    amount.checked_mul(unit_secs).map(Duration::from_secs)
}
