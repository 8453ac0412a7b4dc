//! Detail view of one work order: keeps the net budget in step with the staff
//! payments recorded against it.
//!
//! The work order's `budget` on the server is the *net* budget, i.e. what is
//! left once payments are subtracted. The view keeps the allocated budget
//! (net plus everything paid at open time) as its baseline and only moves it
//! when the user edits the budget itself.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    domain::{StaffAssignment, UserId, WorkId, WorkOrder},
    input::NumericInput,
    views::{work_progress, ProgressStage},
};
use tracing::{info, warn};

use crate::{
    error::{ReconcileError, ValidationError},
    events::ClientEvent,
    work_store::{StaffPayment, WorkEdit, WorkStore},
};

#[derive(Debug, Clone, PartialEq)]
pub struct DetailFields {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub total_members: u32,
    /// Allocated budget, before payments.
    pub budget: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct DetailEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub total_members: Option<NumericInput>,
    /// New allocated budget; the net value sent to the server is derived.
    pub budget: Option<NumericInput>,
}

pub struct WorkDetail {
    store: Arc<WorkStore>,
    current: WorkOrder,
    staff: Vec<StaffAssignment>,
    fields: DetailFields,
    pending_budget: Option<Decimal>,
}

impl WorkDetail {
    pub fn open(store: Arc<WorkStore>, work: WorkOrder) -> Self {
        let total_members = if work.total_members > 0 {
            work.total_members
        } else {
            u32::try_from(work.assigned_to.len()).unwrap_or(u32::MAX)
        };
        let fields = DetailFields {
            title: work.title.clone(),
            description: work.description.clone(),
            due_date: work.due_date,
            total_members,
            budget: work.budget + work.total_paid(),
        };
        Self {
            store,
            staff: work.assigned_to.clone(),
            current: work,
            fields,
            pending_budget: None,
        }
    }

    pub fn work_id(&self) -> &WorkId {
        &self.current.id
    }

    pub fn current(&self) -> &WorkOrder {
        &self.current
    }

    pub fn staff(&self) -> &[StaffAssignment] {
        &self.staff
    }

    pub fn fields(&self) -> &DetailFields {
        &self.fields
    }

    pub fn allocated_budget(&self) -> Decimal {
        self.fields.budget
    }

    pub fn total_paid(&self) -> Decimal {
        self.staff.iter().map(|s| s.amount_paid).sum()
    }

    pub fn net_budget(&self) -> Decimal {
        self.fields.budget - self.total_paid()
    }

    pub fn progress(&self) -> u8 {
        work_progress(&self.current)
    }

    pub fn stage(&self) -> ProgressStage {
        ProgressStage::from_progress(self.progress())
    }

    /// Net budget the server should hold but does not, after a failed
    /// reconciliation.
    pub fn needs_reconciliation(&self) -> Option<Decimal> {
        self.pending_budget
    }

    /// Records a payment, then writes the new net budget. A failed budget write
    /// re-issues the previous payment; if that fails too the view is left
    /// diverged until [`WorkDetail::resync_budget`].
    pub async fn apply_staff_payment(
        &mut self,
        staff_id: &UserId,
        payment: StaffPayment,
    ) -> Result<Decimal> {
        let request = match payment.to_request() {
            Ok(request) => request,
            Err(err) => return self.reject(err),
        };
        let Some(index) = self.staff.iter().position(|s| &s.user.id == staff_id) else {
            return self.reject(ValidationError::UnknownStaff(staff_id.clone()));
        };

        let previous = self.staff[index].clone();
        let mut updated_staff = self.staff.clone();
        if let Some(amount) = request.amount_paid {
            updated_staff[index].amount_paid = amount;
        }
        updated_staff[index].violations = request.violations.clone();

        let total_paid: Decimal = updated_staff.iter().map(|s| s.amount_paid).sum();
        let net_budget = self.fields.budget - total_paid;
        if net_budget.is_sign_negative() && !net_budget.is_zero() {
            return self.reject(ValidationError::Overpayment {
                budget: self.fields.budget,
                total_paid,
            });
        }

        let work_id = self.current.id.clone();
        self.store
            .record_staff_payment(&work_id, staff_id, &payment)
            .await?;

        if let Err(source) = self
            .store
            .update(&work_id, WorkEdit::budget(net_budget))
            .await
        {
            let rollback = StaffPayment::amount(previous.amount_paid)
                .with_violations(previous.violations.clone());
            return match self
                .store
                .record_staff_payment(&work_id, staff_id, &rollback)
                .await
            {
                Ok(_) => {
                    warn!(%work_id, %staff_id, "work: budget update failed, payment rolled back");
                    Err(ReconcileError::RolledBack {
                        staff_id: staff_id.clone(),
                        source,
                    }
                    .into())
                }
                Err(rollback_err) => {
                    warn!(
                        %work_id,
                        %staff_id,
                        expected_budget = %net_budget,
                        error = %rollback_err,
                        "work: payment saved but budget is stale"
                    );
                    self.staff = updated_staff;
                    self.current.assigned_to = self.staff.clone();
                    self.pending_budget = Some(net_budget);
                    self.store
                        .notifier()
                        .send(ClientEvent::ReconciliationRequired {
                            work_id: work_id.clone(),
                            expected_budget: net_budget,
                        });
                    Err(ReconcileError::Diverged {
                        staff_id: staff_id.clone(),
                        expected_budget: net_budget,
                        source,
                        rollback_error: format!("{rollback_err:#}"),
                    }
                    .into())
                }
            };
        }

        self.staff = updated_staff;
        self.current.assigned_to = self.staff.clone();
        self.current.budget = net_budget;
        self.pending_budget = None;
        info!(%work_id, %staff_id, net_budget = %net_budget, "work: payment reconciled");
        self.store
            .notifier()
            .success("Staff payment and net budget updated!");
        Ok(net_budget)
    }

    pub async fn resync_budget(&mut self) -> Result<Option<Decimal>> {
        let Some(expected) = self.pending_budget else {
            return Ok(None);
        };
        let work = self
            .store
            .update(&self.current.id, WorkEdit::budget(expected))
            .await?;
        self.current.budget = work.budget;
        self.pending_budget = None;
        info!(work_id = %self.current.id, budget = %expected, "work: budget re-synced");
        Ok(Some(expected))
    }

    /// Saves header edits. A budget edit changes the allocated baseline; the
    /// server receives the matching net value.
    pub async fn update_details(&mut self, edit: DetailEdit) -> Result<WorkOrder> {
        let allocated = match edit.budget.as_ref().map(|b| b.to_decimal()) {
            Some(Some(budget)) if budget.is_sign_negative() && !budget.is_zero() => {
                return self.reject(ValidationError::Negative { field: "budget" });
            }
            Some(Some(budget)) => Some(budget),
            Some(None) => return self.reject(ValidationError::NotANumber { field: "budget" }),
            None => None,
        };
        let net_budget = match allocated {
            Some(allocated) => {
                let total_paid = self.total_paid();
                let net = allocated - total_paid;
                if net.is_sign_negative() && !net.is_zero() {
                    return self.reject(ValidationError::Overpayment {
                        budget: allocated,
                        total_paid,
                    });
                }
                Some(net)
            }
            None => None,
        };

        let patch = WorkEdit {
            title: edit.title,
            description: edit.description,
            due_date: edit.due_date,
            total_members: edit.total_members,
            budget: net_budget.map(NumericInput::from),
            ..WorkEdit::default()
        };
        let work = self.store.update(&self.current.id, patch).await?;

        self.fields.title = work.title.clone();
        self.fields.description = work.description.clone();
        self.fields.due_date = work.due_date;
        if work.total_members > 0 {
            self.fields.total_members = work.total_members;
        }
        if let Some(allocated) = allocated {
            self.fields.budget = allocated;
        }
        self.current = WorkOrder {
            assigned_to: self.staff.clone(),
            ..work
        };
        Ok(self.current.clone())
    }

    pub async fn delete(self) -> Result<()> {
        self.store.remove(&self.current.id).await
    }

    fn reject<T>(&self, err: ValidationError) -> Result<T> {
        self.store
            .notifier()
            .report(Err(err.into()), "", "Invalid payment")
    }
}

#[cfg(test)]
#[path = "tests/work_detail_tests.rs"]
mod tests;
