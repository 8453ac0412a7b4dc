//! Derived state computed from the loaded records. Display only; nothing here
//! is authoritative.

use std::fmt;

use crate::domain::{
    MenuItem, Role, TaskStatus, User, UserId, WorkOrder, WorkTask, ALL_CATEGORY,
};

/// Share of done tasks as a rounded percentage; 0 when there are no tasks.
pub fn task_progress(tasks: &[WorkTask]) -> u8 {
    let total = tasks.len() as u64;
    if total == 0 {
        return 0;
    }
    let done = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Done)
        .count() as u64;
    // round half up, in integers
    ((200 * done + total) / (2 * total)) as u8
}

pub fn work_progress(work: &WorkOrder) -> u8 {
    task_progress(&work.tasks)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Pending,
    InProgress,
    Completed,
}

impl ProgressStage {
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            100..=u8::MAX => ProgressStage::Completed,
            1..=99 => ProgressStage::InProgress,
            0 => ProgressStage::Pending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProgressStage::Pending => "Pending",
            ProgressStage::InProgress => "In Progress",
            ProgressStage::Completed => "Completed",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Case-insensitive match on title or description. An empty term keeps every
/// work order in its original order.
pub fn filter_works<'a>(works: &'a [WorkOrder], term: &str) -> Vec<&'a WorkOrder> {
    if term.is_empty() {
        return works.iter().collect();
    }
    let needle = term.to_lowercase();
    works
        .iter()
        .filter(|work| {
            work.title.to_lowercase().contains(&needle)
                || work.description.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn is_assigned_to(work: &WorkOrder, user_id: &UserId) -> bool {
    work.assigned_to.iter().any(|a| &a.user.id == user_id)
}

/// Earliest due date first; undated work sorts last.
pub fn sort_by_due_date(works: &mut [WorkOrder]) {
    works.sort_by(|a, b| match (a.due_date, b.due_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

pub fn latest_works(works: &[WorkOrder], limit: usize) -> Vec<&WorkOrder> {
    let mut sorted: Vec<&WorkOrder> = works.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}

const LATEST_WORKS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub staff_count: usize,
    pub total_works: usize,
    pub completed_works: usize,
    pub pending_works: usize,
    pub latest: Vec<WorkOrder>,
}

impl DashboardSummary {
    pub fn compute(users: &[User], works: &[WorkOrder]) -> Self {
        let staff_count = users.iter().filter(|u| u.role == Role::Staff).count();
        let completed_works = works.iter().filter(|w| w.status.is_completed()).count();
        Self {
            staff_count,
            total_works: works.len(),
            completed_works,
            pending_works: works.len() - completed_works,
            latest: latest_works(works, LATEST_WORKS_LIMIT)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

/// Users shown in management tables; superadmins are never listed.
pub fn visible_users(users: &[User]) -> Vec<&User> {
    users.iter().filter(|u| u.role != Role::Superadmin).collect()
}

pub fn search_users<'a>(users: &'a [User], term: &str) -> Vec<&'a User> {
    let needle = term.to_lowercase();
    visible_users(users)
        .into_iter()
        .filter(|u| {
            u.name.to_lowercase().contains(&needle)
                || u.email.to_lowercase().contains(&needle)
                || u.role.as_str().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCounts {
    pub total: usize,
    pub admins: usize,
    pub managers: usize,
    pub staff: usize,
}

impl RoleCounts {
    pub fn compute(users: &[User]) -> Self {
        visible_users(users)
            .into_iter()
            .fold(RoleCounts::default(), |mut counts, user| {
                counts.total += 1;
                match user.role {
                    Role::Admin => counts.admins += 1,
                    Role::Manager => counts.managers += 1,
                    Role::Staff => counts.staff += 1,
                    Role::Superadmin => {}
                }
                counts
            })
    }
}

/// Category filter tabs: the synthesized "All" first, then every stored name.
pub fn category_tabs(categories: &[String]) -> Vec<String> {
    std::iter::once(ALL_CATEGORY.to_string())
        .chain(
            categories
                .iter()
                .filter(|name| name.as_str() != ALL_CATEGORY)
                .cloned(),
        )
        .collect()
}

pub fn items_in_category<'a>(items: &'a [MenuItem], category: &str) -> Vec<&'a MenuItem> {
    if category == ALL_CATEGORY {
        return items.iter().collect();
    }
    items.iter().filter(|item| item.category == category).collect()
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
