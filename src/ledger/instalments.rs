//! Instalment plan validation and suggestion.

use chrono::{Months, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use super::calculators::round_money;
use super::models::Instalment;
use super::requests::InstalmentRequest;
use super::services::LedgerError;

const MAX_SUGGESTED_PARTS: u32 = 24;

/// Check a caller-supplied payment schedule and number it.
///
/// Order is preserved. Every amount must be positive and every due date a
/// valid `YYYY-MM-DD` date. The amounts together must fit in a `Decimal`.
pub fn validate_instalments(
    requested: &[InstalmentRequest],
) -> Result<Vec<Instalment>, LedgerError> {
    if requested.is_empty() {
        return Err(LedgerError::InvalidInstalments(
            "at least one instalment is required".to_string(),
        ));
    }

    let mut instalments = Vec::with_capacity(requested.len());
    let mut scheduled = Decimal::ZERO;
    for (position, entry) in requested.iter().enumerate() {
        let sequence = position + 1;

        let amount = match entry.amount {
            Some(amount) if amount > Decimal::ZERO => amount,
            Some(_) => {
                return Err(LedgerError::InvalidInstalments(format!(
                    "instalment {}: amount must be greater than zero",
                    sequence
                )))
            }
            None => {
                return Err(LedgerError::InvalidInstalments(format!(
                    "instalment {}: amount is missing",
                    sequence
                )))
            }
        };

        scheduled = scheduled.checked_add(amount).ok_or_else(|| {
            LedgerError::InvalidInstalments(format!(
                "instalment {}: amounts add up beyond the supported range",
                sequence
            ))
        })?;

        let raw_date = entry
            .due_date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                LedgerError::InvalidInstalments(format!(
                    "instalment {}: due date is missing",
                    sequence
                ))
            })?;

        let due_date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            LedgerError::InvalidInstalments(format!(
                "instalment {}: '{}' is not a valid date",
                sequence, raw_date
            ))
        })?;

        instalments.push(Instalment {
            sequence: sequence as i32,
            amount: amount.normalize(),
            due_date,
        });
    }

    Ok(instalments)
}

/// Warning text when the plan does not add up to the quoted total.
pub fn reconcile(instalments: &[Instalment], total_selling_price: Decimal) -> Option<String> {
    let Some(scheduled) = instalments
        .iter()
        .try_fold(Decimal::ZERO, |sum, i| sum.checked_add(i.amount))
    else {
        return Some(format!(
            "instalments total more than the supported range, far over the quoted {}",
            total_selling_price.normalize()
        ));
    };
    if scheduled == total_selling_price {
        return None;
    }

    let gap = total_selling_price - scheduled;
    let direction = if gap > Decimal::ZERO { "short of" } else { "over" };
    Some(format!(
        "instalments total {} which is {} the quoted {} by {}",
        scheduled.normalize(),
        direction,
        total_selling_price.normalize(),
        gap.abs().normalize()
    ))
}

/// Split a total into `parts` amounts that add back up exactly.
///
/// Uses banker's rounding for the base share, then spreads the remainder in
/// 0.01 steps over the first instalments.
pub fn split_total(total: Decimal, parts: u32) -> Vec<Decimal> {
    if parts == 0 {
        return vec![];
    }

    let share = round_money(total / Decimal::from(parts), 2);
    let remainder = total - share * Decimal::from(parts);

    let mut amounts: Vec<Decimal> = (0..parts).map(|_| share).collect();

    if remainder != Decimal::ZERO {
        let step = if remainder > Decimal::ZERO {
            Decimal::new(1, 2)
        } else {
            Decimal::new(-1, 2)
        };

        let adjustments = (remainder.abs() / Decimal::new(1, 2))
            .to_usize()
            .unwrap_or(0);

        for amount in amounts.iter_mut().take(adjustments) {
            *amount += step;
        }
    }

    amounts.into_iter().map(|a| a.normalize()).collect()
}

/// Equal monthly instalments starting on `first_due`.
pub fn suggest_plan(
    total: Decimal,
    parts: u32,
    first_due: NaiveDate,
) -> Result<Vec<Instalment>, LedgerError> {
    if parts == 0 || parts > MAX_SUGGESTED_PARTS {
        return Err(LedgerError::InvalidInput(format!(
            "parts must be between 1 and {}",
            MAX_SUGGESTED_PARTS
        )));
    }

    split_total(total, parts)
        .into_iter()
        .enumerate()
        .map(|(offset, amount)| {
            let due_date = first_due
                .checked_add_months(Months::new(offset as u32))
                .ok_or_else(|| {
                    LedgerError::InvalidInput("due date out of range".to_string())
                })?;
            Ok(Instalment {
                sequence: offset as i32 + 1,
                amount,
                due_date,
            })
        })
        .collect()
}
