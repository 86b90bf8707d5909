//! Payroll run arithmetic.
//!
//! A run covers a two-week pay period. Each line is computed independently:
//!
//! - hours above the overtime threshold in a single week are overtime for that week
//! - overtime is paid at `labor_rate * overtime_multiplier`
//! - per diem is `per_diem_days * per_diem_rate`
//! - `check_total = regular_pay + overtime_pay + per_diem_total`
//!
//! The run also carries a commission of `per_hour_rate * total_hours` over every line.
//! All money amounts are rounded to cents, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{Error, Result};

/// One employee's hours for the pay period.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct PayrollItem {
    pub employee_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub position: String,
    #[schema(value_type = String, example = "25.00")]
    pub labor_rate: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "40")]
    pub week1_hours: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "38")]
    pub week2_hours: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "0")]
    pub per_diem_days: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "0")]
    pub per_diem_rate: Decimal,
}

/// Commission paid on every hour worked in a run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct CommissionRule {
    pub beneficiary: String,
    #[schema(value_type = String, example = "0.50")]
    pub per_hour_rate: Decimal,
}

impl Default for CommissionRule {
    fn default() -> Self {
        Self {
            beneficiary: "danny".to_string(),
            per_hour_rate: Decimal::new(50, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayrollRules {
    /// Weekly hours paid at the regular rate
    pub overtime_threshold: Decimal,
    pub overtime_multiplier: Decimal,
    pub commission: CommissionRule,
}

impl Default for PayrollRules {
    fn default() -> Self {
        Self {
            overtime_threshold: Decimal::new(40, 0),
            overtime_multiplier: Decimal::new(15, 1),
            commission: CommissionRule::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct PayrollLine {
    #[serde(flatten)]
    pub item: PayrollItem,
    #[schema(value_type = String)]
    pub total_hours: Decimal,
    #[schema(value_type = String)]
    pub regular_hours: Decimal,
    #[schema(value_type = String)]
    pub overtime_hours: Decimal,
    #[schema(value_type = String)]
    pub regular_pay: Decimal,
    #[schema(value_type = String)]
    pub overtime_pay: Decimal,
    #[schema(value_type = String)]
    pub per_diem_total: Decimal,
    #[schema(value_type = String)]
    pub check_total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct PayrollTotals {
    pub employees: usize,
    #[schema(value_type = String)]
    pub total_hours: Decimal,
    #[schema(value_type = String)]
    pub regular_hours: Decimal,
    #[schema(value_type = String)]
    pub overtime_hours: Decimal,
    #[schema(value_type = String)]
    pub regular_pay: Decimal,
    #[schema(value_type = String)]
    pub overtime_pay: Decimal,
    #[schema(value_type = String)]
    pub per_diem_total: Decimal,
    #[schema(value_type = String)]
    pub check_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct CommissionSummary {
    pub beneficiary: String,
    #[schema(value_type = String)]
    pub per_hour_rate: Decimal,
    #[schema(value_type = String)]
    pub source_hours: Decimal,
    #[schema(value_type = String)]
    pub total_commission: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct PayrollRun {
    pub lines: Vec<PayrollLine>,
    pub totals: PayrollTotals,
    pub commission: CommissionSummary,
}

/// Round to cents, half away from zero, always carrying two decimal places.
pub fn to_cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

fn split_week(hours: Decimal, threshold: Decimal) -> (Decimal, Decimal) {
    if hours > threshold {
        (threshold, hours - threshold)
    } else {
        (hours, Decimal::ZERO)
    }
}

fn ensure_non_negative(item: &PayrollItem) -> Result<()> {
    let fields = [
        ("labor_rate", item.labor_rate),
        ("week1_hours", item.week1_hours),
        ("week2_hours", item.week2_hours),
        ("per_diem_days", item.per_diem_days),
        ("per_diem_rate", item.per_diem_rate),
    ];
    for (field, value) in fields {
        if value < Decimal::ZERO {
            return Err(Error::BadRequest {
                message: format!("{field} must not be negative for employee {}", item.employee_id),
            });
        }
    }
    Ok(())
}

fn too_large(what: &str) -> Error {
    Error::BadRequest {
        message: format!("{what} is too large to compute"),
    }
}

fn compute_line(item: PayrollItem, rules: &PayrollRules) -> Result<PayrollLine> {
    ensure_non_negative(&item)?;
    let overflow = || too_large(&format!("pay for employee {}", item.employee_id));

    let (regular1, overtime1) = split_week(item.week1_hours, rules.overtime_threshold);
    let (regular2, overtime2) = split_week(item.week2_hours, rules.overtime_threshold);
    let regular_hours = regular1.checked_add(regular2).ok_or_else(overflow)?;
    let overtime_hours = overtime1.checked_add(overtime2).ok_or_else(overflow)?;
    let total_hours = regular_hours.checked_add(overtime_hours).ok_or_else(overflow)?;

    let overtime_rate = item.labor_rate.checked_mul(rules.overtime_multiplier);
    let regular_pay = to_cents(item.labor_rate.checked_mul(regular_hours).ok_or_else(overflow)?);
    let overtime_pay = to_cents(
        overtime_rate
            .and_then(|rate| rate.checked_mul(overtime_hours))
            .ok_or_else(overflow)?,
    );
    let per_diem_total = to_cents(item.per_diem_days.checked_mul(item.per_diem_rate).ok_or_else(overflow)?);
    let check_total = regular_pay
        .checked_add(overtime_pay)
        .and_then(|sum| sum.checked_add(per_diem_total))
        .ok_or_else(overflow)?;

    Ok(PayrollLine {
        total_hours,
        regular_hours,
        overtime_hours,
        regular_pay,
        overtime_pay,
        per_diem_total,
        check_total,
        item,
    })
}

fn accumulate(total: &mut Decimal, value: Decimal) -> Result<()> {
    *total = total.checked_add(value).ok_or_else(|| too_large("run total"))?;
    Ok(())
}

/// Compute every line, the run totals and the commission.
///
/// Amounts that exceed the decimal range are a [`Error::BadRequest`], never a panic.
pub fn compute_run(items: Vec<PayrollItem>, rules: &PayrollRules) -> Result<PayrollRun> {
    if rules.commission.per_hour_rate < Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "commission per_hour_rate must not be negative".to_string(),
        });
    }

    let lines = items
        .into_iter()
        .map(|item| compute_line(item, rules))
        .collect::<Result<Vec<_>>>()?;

    let mut totals = PayrollTotals {
        employees: lines.len(),
        ..Default::default()
    };
    for line in &lines {
        accumulate(&mut totals.total_hours, line.total_hours)?;
        accumulate(&mut totals.regular_hours, line.regular_hours)?;
        accumulate(&mut totals.overtime_hours, line.overtime_hours)?;
        accumulate(&mut totals.regular_pay, line.regular_pay)?;
        accumulate(&mut totals.overtime_pay, line.overtime_pay)?;
        accumulate(&mut totals.per_diem_total, line.per_diem_total)?;
        accumulate(&mut totals.check_total, line.check_total)?;
    }

    let total_commission = rules
        .commission
        .per_hour_rate
        .checked_mul(totals.total_hours)
        .ok_or_else(|| too_large("commission"))?;
    let commission = CommissionSummary {
        beneficiary: rules.commission.beneficiary.clone(),
        per_hour_rate: rules.commission.per_hour_rate,
        source_hours: totals.total_hours,
        total_commission: to_cents(total_commission),
    };

    Ok(PayrollRun {
        lines,
        totals,
        commission,
    })
}

const CSV_HEADER: [&str; 16] = [
    "employee_id",
    "name",
    "reference",
    "company",
    "location",
    "position",
    "labor_rate",
    "week1_hours",
    "week2_hours",
    "total_hours",
    "regular_hours",
    "overtime_hours",
    "regular_pay",
    "overtime_pay",
    "per_diem_total",
    "check_total",
];

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut row = fields
        .into_iter()
        .map(|field| csv_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

/// Render a run as CSV: a header row, then one row per line.
pub fn to_csv(run: &PayrollRun) -> String {
    let mut out = csv_row(CSV_HEADER);
    for line in &run.lines {
        let item = &line.item;
        out.push_str(&csv_row([
            item.employee_id.clone(),
            item.name.clone(),
            item.reference.clone().unwrap_or_default(),
            item.company.clone(),
            item.location.clone(),
            item.position.clone(),
            item.labor_rate.to_string(),
            item.week1_hours.to_string(),
            item.week2_hours.to_string(),
            line.total_hours.to_string(),
            line.regular_hours.to_string(),
            line.overtime_hours.to_string(),
            line.regular_pay.to_string(),
            line.overtime_pay.to_string(),
            line.per_diem_total.to_string(),
            line.check_total.to_string(),
        ]));
    }
    out
}
