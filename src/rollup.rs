use std::collections::HashMap;

use time::OffsetDateTime;

use crate::core::model::OrderStatus;
use crate::join::{MISSING_LABEL, ResolvedOrder, ResolvedProject};

/// Shape of the derived list a screen renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// One row per project with its derived status.
    Projects,
    /// One row per order; the amount is money coming in.
    Income,
    /// One row per project with orders, amount = budget minus spend.
    Profits,
    /// One row per project with orders, amount = total spend.
    Expenses,
}

impl ViewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::Projects => "projects",
            ViewKind::Income => "income",
            ViewKind::Profits => "profits",
            ViewKind::Expenses => "expenses",
        }
    }
}

impl std::str::FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "projects" => Ok(ViewKind::Projects),
            "income" => Ok(ViewKind::Income),
            "profits" => Ok(ViewKind::Profits),
            "expenses" => Ok(ViewKind::Expenses),
            other => Err(format!(
                "unknown view '{other}' (expected projects, income, profits or expenses)"
            )),
        }
    }
}

/// Inclusive creation-timestamp window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl DateRange {
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        instant >= self.start && instant <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilters {
    pub date_range: Option<DateRange>,
    pub search: Option<String>,
}

/// One derived, non-persisted output row. Recomputed from scratch on every
/// aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub id: String,
    pub name: String,
    pub client_name: String,
    pub employee_name: String,
    pub project_name: String,
    pub description: Option<String>,
    pub status: OrderStatus,
    /// View-specific figure: budget (projects), order amount (income),
    /// profit (profits) or total spend (expenses).
    pub amount: f64,
    pub total_expense: Option<f64>,
    pub profit: Option<f64>,
    pub created_at: OffsetDateTime,
}

impl ViewRow {
    fn matches_search(&self, needle: &str) -> bool {
        let haystacks = [
            Some(self.name.as_str()),
            Some(self.client_name.as_str()),
            Some(self.employee_name.as_str()),
            Some(self.project_name.as_str()),
            self.description.as_deref(),
        ];
        haystacks
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

pub struct AggregateInput<'a> {
    pub orders: &'a [ResolvedOrder],
    pub projects: &'a [ResolvedProject],
}

/// Full recompute of a view: shape, filter, then sort. Pure; safe to call
/// on every upstream change notification.
pub fn aggregate(input: &AggregateInput<'_>, kind: ViewKind, filters: &ViewFilters) -> Vec<ViewRow> {
    let mut rows = match kind {
        ViewKind::Projects => shape_projects(input),
        ViewKind::Income => shape_income(input.orders),
        ViewKind::Profits => shape_project_rollups(input.orders, RollupFigure::Profit),
        ViewKind::Expenses => shape_project_rollups(input.orders, RollupFigure::Expense),
    };

    if let Some(range) = &filters.date_range {
        rows.retain(|row| range.contains(row.created_at));
    }
    if let Some(needle) = normalized_search(filters) {
        rows.retain(|row| row.matches_search(&needle));
    }

    // The ordering of joined and grouped rows does not survive shaping, so
    // it is re-established here as the last step.
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    rows
}

fn normalized_search(filters: &ViewFilters) -> Option<String> {
    filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_lowercase)
}

/// Latest-created order attached to the given project, if any.
fn latest_for_project<'a>(
    orders: &'a [ResolvedOrder],
    project_id: &str,
) -> Option<&'a ResolvedOrder> {
    orders
        .iter()
        .filter(|resolved| resolved.order.project_id.as_deref() == Some(project_id))
        .max_by(|a, b| {
            a.order
                .created_at
                .cmp(&b.order.created_at)
                .then(a.order.id.cmp(&b.order.id))
        })
}

fn shape_projects(input: &AggregateInput<'_>) -> Vec<ViewRow> {
    input
        .projects
        .iter()
        .map(|resolved| {
            let project = &resolved.project;
            let latest = latest_for_project(input.orders, &project.id);
            // Display status prefers the newest order's state over what the
            // project itself stores.
            let status = latest
                .map(|resolved| resolved.order.status)
                .or(project.status)
                .unwrap_or(OrderStatus::InProgress);
            ViewRow {
                id: project.id.clone(),
                name: project.name.clone(),
                client_name: resolved.client_name.clone(),
                employee_name: latest
                    .map_or_else(|| MISSING_LABEL.to_string(), |r| r.employee_name.clone()),
                project_name: project.name.clone(),
                description: project.requirements.clone(),
                status,
                amount: project.budget,
                total_expense: None,
                profit: None,
                created_at: project.created_at,
            }
        })
        .collect()
}

fn shape_income(orders: &[ResolvedOrder]) -> Vec<ViewRow> {
    orders
        .iter()
        .map(|resolved| ViewRow {
            id: resolved.order.id.clone(),
            name: resolved.order.title.clone(),
            client_name: resolved.client_name.clone(),
            employee_name: resolved.employee_name.clone(),
            project_name: resolved.project_name.clone(),
            description: resolved.order.description.clone(),
            status: resolved.order.status,
            amount: resolved.order.amount,
            total_expense: None,
            profit: None,
            created_at: resolved.order.created_at,
        })
        .collect()
}

#[derive(Clone, Copy)]
enum RollupFigure {
    Profit,
    Expense,
}

/// Group orders by project and roll their amounts up into one row per
/// project. Orders without a project carry no budget and are left to the
/// income view.
fn shape_project_rollups(orders: &[ResolvedOrder], figure: RollupFigure) -> Vec<ViewRow> {
    let mut groups: HashMap<&str, Vec<&ResolvedOrder>> = HashMap::new();
    for resolved in orders {
        if let Some(project_id) = resolved.order.project_id.as_deref() {
            groups.entry(project_id).or_default().push(resolved);
        }
    }

    groups
        .into_iter()
        .map(|(project_id, members)| {
            let total: f64 = members.iter().map(|r| r.order.amount).sum();
            let latest = members
                .iter()
                .max_by(|a, b| {
                    a.order
                        .created_at
                        .cmp(&b.order.created_at)
                        .then(a.order.id.cmp(&b.order.id))
                })
                .expect("group always has at least one member");
            let project = members.iter().find_map(|r| r.project.as_ref());
            let budget = project.map_or(0.0, |p| p.budget);
            let profit = budget - total;
            ViewRow {
                id: project_id.to_string(),
                name: project
                    .map_or_else(|| MISSING_LABEL.to_string(), |p| p.name.clone()),
                client_name: latest.client_name.clone(),
                employee_name: latest.employee_name.clone(),
                project_name: project
                    .map_or_else(|| MISSING_LABEL.to_string(), |p| p.name.clone()),
                description: project.and_then(|p| p.requirements.clone()),
                status: latest.order.status,
                amount: match figure {
                    RollupFigure::Profit => profit,
                    RollupFigure::Expense => total,
                },
                total_expense: Some(total),
                profit: match figure {
                    RollupFigure::Profit => Some(profit),
                    RollupFigure::Expense => None,
                },
                created_at: project.map_or(latest.order.created_at, |p| p.created_at),
            }
        })
        .collect()
}
