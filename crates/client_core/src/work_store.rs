use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{calendar_date, UserId, WorkId, WorkOrder, WorkStatus},
    input::{normalize_assigned_to, AssigneeRef, NumericInput},
    protocol::{NewWorkRequest, StaffPaymentRequest, WorkEnvelope, WorkPatchRequest},
};
use tokio::sync::Mutex;
use tracing::info;

use crate::{api::ApiClient, error::ValidationError, events::Notifier, inflight::InflightRegistry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "calendar_date::option")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Falls back to the number of assignees when absent, blank or zero.
    #[serde(default)]
    pub total_members: Option<NumericInput>,
    #[serde(default)]
    pub budget: Option<NumericInput>,
    #[serde(default)]
    pub assigned_to: Vec<AssigneeRef>,
    #[serde(default)]
    pub status: Option<WorkStatus>,
}

impl WorkDraft {
    pub fn into_request(self) -> Result<NewWorkRequest, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::Missing { field: "title" });
        }
        let due_date = self
            .due_date
            .ok_or(ValidationError::Missing { field: "due date" })?;
        check_times(self.start_time, self.end_time)?;

        let assigned_to = normalize_assigned_to(self.assigned_to);
        if assigned_to.is_empty() {
            return Err(ValidationError::NoStaffAssigned);
        }

        let total_members = match self.total_members {
            Some(input) if !input.is_blank() => parse_member_count(&input)?,
            _ => u32::try_from(assigned_to.len()).unwrap_or(u32::MAX),
        };

        let budget = match self.budget {
            Some(input) if !input.is_blank() => parse_budget(&input)?,
            Some(_) => return Err(ValidationError::NotPositive { field: "budget" }),
            None => return Err(ValidationError::Missing { field: "budget" }),
        };
        if budget.is_zero() {
            return Err(ValidationError::NotPositive { field: "budget" });
        }

        Ok(NewWorkRequest {
            title,
            description: self.description.trim().to_string(),
            due_date,
            start_time: self.start_time,
            end_time: self.end_time,
            total_members,
            budget,
            assigned_to,
            status: self.status,
        })
    }
}

/// Partial edit of a work order. Only the fields that are set are validated
/// and sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "calendar_date::option")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_members: Option<NumericInput>,
    #[serde(default)]
    pub budget: Option<NumericInput>,
    #[serde(default)]
    pub status: Option<WorkStatus>,
    #[serde(default)]
    pub assigned_to: Option<Vec<AssigneeRef>>,
}

impl WorkEdit {
    pub fn budget(budget: Decimal) -> Self {
        Self {
            budget: Some(budget.into()),
            ..Self::default()
        }
    }

    pub fn status(status: WorkStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// `current` supplies the other half of the shift when only one end of it
    /// is edited.
    pub fn into_request(self, current: Option<&WorkOrder>) -> Result<WorkPatchRequest, ValidationError> {
        let title = match self.title {
            Some(title) => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(ValidationError::Missing { field: "title" });
                }
                Some(title)
            }
            None => None,
        };

        if self.start_time.is_some() || self.end_time.is_some() {
            check_times(
                self.start_time.or(current.and_then(|w| w.start_time)),
                self.end_time.or(current.and_then(|w| w.end_time)),
            )?;
        }

        let total_members = self
            .total_members
            .as_ref()
            .map(parse_member_count)
            .transpose()?;
        let budget = self.budget.as_ref().map(parse_budget).transpose()?;

        Ok(WorkPatchRequest {
            title,
            description: self.description,
            due_date: self.due_date,
            start_time: self.start_time,
            end_time: self.end_time,
            total_members,
            budget,
            status: self.status,
            assigned_to: self.assigned_to.map(normalize_assigned_to),
        })
    }
}

/// Payment fields for one assignee. `violations` is always sent; leaving it
/// unset clears any recorded violations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffPayment {
    #[serde(default)]
    pub amount_paid: Option<NumericInput>,
    #[serde(default)]
    pub violations: Option<Vec<String>>,
}

impl StaffPayment {
    pub fn amount(amount: impl Into<NumericInput>) -> Self {
        Self {
            amount_paid: Some(amount.into()),
            violations: None,
        }
    }

    pub fn with_violations(mut self, violations: Vec<String>) -> Self {
        self.violations = Some(violations);
        self
    }

    pub fn to_request(&self) -> Result<StaffPaymentRequest, ValidationError> {
        let amount_paid = match &self.amount_paid {
            Some(input) => {
                let amount = input
                    .to_decimal()
                    .ok_or(ValidationError::NotANumber { field: "amount paid" })?;
                if amount.is_sign_negative() && !amount.is_zero() {
                    return Err(ValidationError::Negative { field: "amount paid" });
                }
                Some(amount)
            }
            None => None,
        };
        Ok(StaffPaymentRequest {
            amount_paid,
            violations: self.violations.clone().unwrap_or_default(),
        })
    }
}

fn check_times(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end <= start => Err(ValidationError::EndBeforeStart),
        _ => Ok(()),
    }
}

fn parse_member_count(input: &NumericInput) -> Result<u32, ValidationError> {
    let count = input.to_count().ok_or(ValidationError::NotANumber {
        field: "total members",
    })?;
    if count == 0 {
        return Err(ValidationError::NotPositive {
            field: "total members",
        });
    }
    Ok(count)
}

fn parse_budget(input: &NumericInput) -> Result<Decimal, ValidationError> {
    let budget = input
        .to_decimal()
        .ok_or(ValidationError::NotANumber { field: "budget" })?;
    if budget.is_sign_negative() && !budget.is_zero() {
        return Err(ValidationError::Negative { field: "budget" });
    }
    Ok(budget)
}

pub fn combine_date_and_time(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

#[derive(Default)]
struct WorkState {
    works: Vec<WorkOrder>,
    loading: bool,
}

pub struct WorkStore {
    api: Arc<ApiClient>,
    notifier: Notifier,
    inflight: InflightRegistry,
    state: Mutex<WorkState>,
}

impl WorkStore {
    pub fn new(api: Arc<ApiClient>, notifier: Notifier) -> Self {
        Self {
            api,
            notifier,
            inflight: InflightRegistry::default(),
            state: Mutex::new(WorkState::default()),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn list(&self) -> Vec<WorkOrder> {
        self.state.lock().await.works.clone()
    }

    pub async fn get(&self, work_id: &WorkId) -> Option<WorkOrder> {
        self.state
            .lock()
            .await
            .works
            .iter()
            .find(|work| &work.id == work_id)
            .cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn clear(&self) {
        *self.state.lock().await = WorkState::default();
    }

    pub async fn refresh(&self) -> Result<Vec<WorkOrder>> {
        self.state.lock().await.loading = true;
        let result: Result<Vec<WorkOrder>> = self.api.get(&["work"]).await;
        let mut state = self.state.lock().await;
        state.loading = false;
        if let Ok(works) = &result {
            state.works = works.clone();
            info!(count = works.len(), "work: list refreshed");
        }
        drop(state);
        self.notifier.report(result, "", "Failed to fetch works.")
    }

    pub async fn fetch(&self, work_id: &WorkId) -> Result<WorkOrder> {
        let result: Result<WorkOrder> = self.api.get(&["work", work_id.as_str()]).await;
        if let Ok(work) = &result {
            self.replace_local(work.clone()).await;
        }
        self.notifier.report(result, "", "Failed to load work.")
    }

    pub async fn create(&self, draft: WorkDraft) -> Result<WorkOrder> {
        let result: Result<WorkOrder> = async {
            let request = draft.into_request()?;
            let _guard = self.inflight.begin("work:create")?;
            let envelope: WorkEnvelope = self.api.send(Method::POST, &["work"], &request).await?;
            let work = envelope.work;
            self.state.lock().await.works.push(work.clone());
            info!(work_id = %work.id, title = %work.title, "work: created");
            Ok(work)
        }
        .await;
        self.notifier
            .report(result, "Work added successfully!", "Add work failed")
    }

    pub async fn update(&self, work_id: &WorkId, edit: WorkEdit) -> Result<WorkOrder> {
        let result: Result<WorkOrder> = async {
            let current = self.get(work_id).await;
            let request = edit.into_request(current.as_ref())?;
            let _guard = self.inflight.begin(format!("work:update:{work_id}"))?;
            let envelope: WorkEnvelope = self
                .api
                .send(Method::PUT, &["work", work_id.as_str()], &request)
                .await?;
            self.replace_local(envelope.work.clone()).await;
            info!(%work_id, "work: updated");
            Ok(envelope.work)
        }
        .await;
        self.notifier
            .report(result, "Work updated successfully!", "Update work failed")
    }

    pub async fn remove(&self, work_id: &WorkId) -> Result<()> {
        let result: Result<()> = async {
            let _guard = self.inflight.begin(format!("work:delete:{work_id}"))?;
            self.api.delete(&["work", work_id.as_str()]).await?;
            self.state
                .lock()
                .await
                .works
                .retain(|work| &work.id != work_id);
            info!(%work_id, "work: deleted");
            Ok(())
        }
        .await;
        self.notifier
            .report(result, "Work deleted successfully!", "Delete work failed")
    }

    pub async fn record_staff_payment(
        &self,
        work_id: &WorkId,
        staff_id: &UserId,
        payment: &StaffPayment,
    ) -> Result<WorkOrder> {
        let result: Result<WorkOrder> = async {
            let request = payment.to_request()?;
            let _guard = self
                .inflight
                .begin(format!("work:pay:{work_id}:{staff_id}"))?;
            let envelope: WorkEnvelope = self
                .api
                .send(
                    Method::PATCH,
                    &["work", work_id.as_str(), "staff", staff_id.as_str()],
                    &request,
                )
                .await?;
            self.replace_local(envelope.work.clone()).await;
            info!(%work_id, %staff_id, amount_paid = ?request.amount_paid, "work: staff payment recorded");
            Ok(envelope.work)
        }
        .await;
        self.notifier.report(
            result,
            "Staff updated successfully!",
            "Failed to update staff details",
        )
    }

    async fn replace_local(&self, work: WorkOrder) {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.works.iter_mut().find(|w| w.id == work.id) {
            *existing = work;
        }
    }
}

#[cfg(test)]
#[path = "tests/work_store_tests.rs"]
mod tests;
