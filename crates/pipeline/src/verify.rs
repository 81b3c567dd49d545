//! Collection completeness report.

use serde::Serialize;
use sparza_core::data_type::DataType;
use sparza_core::fields::{FieldGroup, ACTION_PENDING_STATUS, FOLLOW_UP_REQUIRED, URGENCY};
use sparza_core::store::{FieldFilter, RecordStore};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub scope: FieldGroup,
    /// Every field of the group present.
    pub complete: u64,
    /// Touched by the job but missing a required field.
    pub partial: u64,
    /// Never touched by the job.
    pub untouched: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub data_type: DataType,
    pub collection: &'static str,
    pub total: u64,
    pub groups: Vec<GroupReport>,
    pub urgent: u64,
    pub follow_up_required: u64,
    pub action_pending: u64,
}

impl VerificationReport {
    pub fn group(&self, scope: FieldGroup) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.scope == scope)
    }
}

pub async fn verify(
    store: &dyn RecordStore,
    data_type: DataType,
) -> Result<VerificationReport, PipelineError> {
    let total = store.count(data_type, &FieldFilter::All).await?;

    let mut groups = Vec::with_capacity(FieldGroup::ALL.len());
    for scope in FieldGroup::ALL {
        groups.push(GroupReport {
            scope,
            complete: store.count(data_type, &scope.complete_filter(data_type)).await?,
            partial: store.count(data_type, &scope.partial_filter(data_type)).await?,
            untouched: store.count(data_type, &scope.untouched_filter()).await?,
        });
    }

    let report = VerificationReport {
        data_type,
        collection: data_type.collection(),
        total,
        groups,
        urgent: store
            .count(data_type, &FieldFilter::equals(URGENCY, true))
            .await?,
        follow_up_required: store
            .count(data_type, &FieldFilter::equals(FOLLOW_UP_REQUIRED, "yes"))
            .await?,
        action_pending: store
            .count(data_type, &FieldFilter::equals(ACTION_PENDING_STATUS, "yes"))
            .await?,
    };

    tracing::info!(
        data_type = %data_type,
        total = report.total,
        urgent = report.urgent,
        "Verified collection",
    );
    Ok(report)
}
