//! Unset enrichment fields so the owning job picks the records up again.

use std::str::FromStr;

use serde::Serialize;
use sparza_core::data_type::DataType;
use sparza_core::error::CoreError;
use sparza_core::fields::FieldGroup;
use sparza_core::progress::RunCounters;
use sparza_core::store::{FieldFilter, RecordStore, RunStatus};

use crate::error::PipelineError;
use crate::run_record::RunRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    Classification,
    Generated,
    Assigned,
    All,
}

impl ResetScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetScope::Classification => "classification",
            ResetScope::Generated => "generated",
            ResetScope::Assigned => "assigned",
            ResetScope::All => "all",
        }
    }

    pub fn groups(&self) -> Vec<FieldGroup> {
        match self {
            ResetScope::Classification => vec![FieldGroup::Classification],
            ResetScope::Generated => vec![FieldGroup::Generated],
            ResetScope::Assigned => vec![FieldGroup::Assigned],
            ResetScope::All => FieldGroup::ALL.to_vec(),
        }
    }
}

impl FromStr for ResetScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(ResetScope::All);
        }
        Ok(match s.parse::<FieldGroup>()? {
            FieldGroup::Classification => ResetScope::Classification,
            FieldGroup::Generated => ResetScope::Generated,
            FieldGroup::Assigned => ResetScope::Assigned,
        })
    }
}

/// Which documents a reset touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMode {
    /// Only documents the group's job touched but left incomplete.
    #[default]
    Partial,
    /// Every document the group's job touched.
    Any,
}

impl FromStr for ResetMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "partial" => Ok(ResetMode::Partial),
            "any" | "all" => Ok(ResetMode::Any),
            other => Err(CoreError::Validation(format!("Unknown reset mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReset {
    pub group: FieldGroup,
    pub fields: Vec<&'static str>,
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetReport {
    pub data_type: DataType,
    pub scope: ResetScope,
    pub mode: ResetMode,
    pub dry_run: bool,
    pub groups: Vec<GroupReset>,
}

impl ResetReport {
    pub fn total_modified(&self) -> u64 {
        self.groups.iter().map(|g| g.modified).sum()
    }
}

/// Documents a reset of `group` in `mode` applies to.
///
/// Both modes key on fields only the group's job writes, so original
/// content on records the job never touched is left alone.
pub fn reset_filter(group: FieldGroup, data_type: DataType, mode: ResetMode) -> FieldFilter {
    match mode {
        ResetMode::Partial => group.partial_filter(data_type),
        ResetMode::Any => group.touched_filter(),
    }
}

pub async fn reset_fields(
    store: &dyn RecordStore,
    data_type: DataType,
    scope: ResetScope,
    mode: ResetMode,
    dry_run: bool,
) -> Result<ResetReport, PipelineError> {
    let recorder = if dry_run {
        None
    } else {
        Some(RunRecorder::start(store, "reset", data_type).await?)
    };
    let counters = RunCounters::new();
    let mut matched_total = 0;

    let mut report = ResetReport {
        data_type,
        scope,
        mode,
        dry_run,
        groups: Vec::new(),
    };

    for group in scope.groups() {
        let filter = reset_filter(group, data_type, mode);
        let fields = group.reset_fields(data_type);

        let outcome = async {
            let matched = store.count(data_type, &filter).await?;
            let modified = if dry_run || matched == 0 {
                0
            } else {
                store.unset_fields(data_type, &fields, &filter).await?
            };
            Ok::<_, PipelineError>((matched, modified))
        }
        .await;

        let (matched, modified) = match outcome {
            Ok(counts) => counts,
            Err(e) => {
                if let Some(recorder) = recorder {
                    recorder.finish(RunStatus::Failed, &counters.snapshot()).await;
                }
                return Err(e);
            }
        };

        matched_total += matched;
        counters.set_total(matched_total);
        counters.add_succeeded(modified);
        tracing::info!(
            data_type = %data_type,
            group = group.as_str(),
            matched,
            modified,
            dry_run,
            "Reset field group",
        );
        report.groups.push(GroupReset {
            group,
            fields,
            matched,
            modified,
        });
    }

    if let Some(recorder) = recorder {
        recorder.finish(RunStatus::Completed, &counters.snapshot()).await;
    }
    Ok(report)
}
