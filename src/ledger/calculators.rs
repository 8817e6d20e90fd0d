//! Core pricing calculation functions.
//!
//! Pure functions for quotation math - no database access, no clock.
//! Everything a client displays about a quote's money is derived here.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::services::LedgerError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Used for derived display figures such as profit percentages. Customer
/// totals go through [`round_to_unit`] instead.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use quote_ledger::ledger::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Round to the nearest multiple of `unit`, halves away from zero.
///
/// `unit` must be positive; [`PricingTerms::validate`] guarantees that for
/// every caller inside the ledger. `None` when the rounded value does not fit
/// in a `Decimal`.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use quote_ledger::ledger::round_to_unit;
///
/// assert_eq!(round_to_unit(dec!(10062.15), dec!(10)), Some(dec!(10060)));
/// assert_eq!(round_to_unit(dec!(10065), dec!(10)), Some(dec!(10070)));
/// ```
pub fn round_to_unit(amount: Decimal, unit: Decimal) -> Option<Decimal> {
    amount
        .checked_div(unit)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(unit)
        .map(|rounded| rounded.normalize())
}

fn out_of_range() -> LedgerError {
    LedgerError::InvalidInput("amount out of range".to_string())
}

/// A priced service on a quotation.
///
/// Cost and selling price are per unit (per night, per vehicle-day, per
/// ticket); markup is applied on the summary, never per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    HotelStay {
        hotel: String,
        #[serde(default)]
        room_type: Option<String>,
        nights: u32,
        cost_price: Decimal,
        selling_price: Decimal,
    },
    Transport {
        vehicle: String,
        quantity: u32,
        days: u32,
        cost_price: Decimal,
        selling_price: Decimal,
    },
    Flight {
        carrier: String,
        #[serde(default)]
        route: Option<String>,
        cost_price: Decimal,
        selling_price: Decimal,
    },
    SpecialInclusion {
        description: String,
        cost_price: Decimal,
        selling_price: Decimal,
    },
}

impl LineItem {
    pub fn kind(&self) -> &'static str {
        match self {
            LineItem::HotelStay { .. } => "hotel_stay",
            LineItem::Transport { .. } => "transport",
            LineItem::Flight { .. } => "flight",
            LineItem::SpecialInclusion { .. } => "special_inclusion",
        }
    }

    /// Human-readable name used in the line breakdown.
    pub fn label(&self) -> String {
        match self {
            LineItem::HotelStay {
                hotel, room_type, ..
            } => match room_type {
                Some(room) => format!("{} ({})", hotel, room),
                None => hotel.clone(),
            },
            LineItem::Transport { vehicle, .. } => vehicle.clone(),
            LineItem::Flight { carrier, route, .. } => match route {
                Some(route) => format!("{} {}", carrier, route),
                None => carrier.clone(),
            },
            LineItem::SpecialInclusion { description, .. } => description.clone(),
        }
    }

    /// Nights for hotel stays, quantity x days for transport, 1 otherwise.
    pub fn multiplier(&self) -> Decimal {
        match self {
            LineItem::HotelStay { nights, .. } => Decimal::from(*nights),
            LineItem::Transport { quantity, days, .. } => {
                Decimal::from(*quantity) * Decimal::from(*days)
            }
            LineItem::Flight { .. } | LineItem::SpecialInclusion { .. } => Decimal::ONE,
        }
    }

    pub fn cost_price(&self) -> Decimal {
        match self {
            LineItem::HotelStay { cost_price, .. }
            | LineItem::Transport { cost_price, .. }
            | LineItem::Flight { cost_price, .. }
            | LineItem::SpecialInclusion { cost_price, .. } => *cost_price,
        }
    }

    pub fn selling_price(&self) -> Decimal {
        match self {
            LineItem::HotelStay { selling_price, .. }
            | LineItem::Transport { selling_price, .. }
            | LineItem::Flight { selling_price, .. }
            | LineItem::SpecialInclusion { selling_price, .. } => *selling_price,
        }
    }

    fn validate(&self, position: usize) -> Result<(), LedgerError> {
        let line = position + 1;
        if self.selling_price() < Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "line {} ({}): selling price must not be negative",
                line,
                self.kind()
            )));
        }
        if self.cost_price() < Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "line {} ({}): cost price must not be negative",
                line,
                self.kind()
            )));
        }
        if self.multiplier() <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "line {} ({}): nights, quantity and days must be at least 1",
                line,
                self.kind()
            )));
        }
        Ok(())
    }
}

/// Markup, tax and rounding applied on top of the line totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingTerms {
    pub markup_percent: Decimal,
    pub gst_percent: Decimal,
    pub rounding_unit: Decimal,
}

impl Default for PricingTerms {
    fn default() -> Self {
        Self {
            markup_percent: Decimal::ZERO,
            gst_percent: Decimal::from(5),
            rounding_unit: Decimal::TEN,
        }
    }
}

impl PricingTerms {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.markup_percent < Decimal::ZERO {
            return Err(LedgerError::InvalidInput(
                "markup percent must not be negative".to_string(),
            ));
        }
        if self.gst_percent < Decimal::ZERO {
            return Err(LedgerError::InvalidInput(
                "gst percent must not be negative".to_string(),
            ));
        }
        if self.rounding_unit <= Decimal::ZERO || !self.rounding_unit.fract().is_zero() {
            return Err(LedgerError::InvalidInput(
                "rounding unit must be a positive whole number".to_string(),
            ));
        }
        Ok(())
    }
}

/// A percentage together with the money it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRate {
    pub value: Decimal,
    pub amount: Decimal,
}

/// Per-line contribution to the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTotal {
    pub kind: String,
    pub label: String,
    pub multiplier: Decimal,
    pub net_cost: Decimal,
    pub selling_total: Decimal,
}

/// Frozen money state of a quotation. Recomputed, never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub lines: Vec<LineTotal>,
    pub total_net_cost: Decimal,
    pub subtotal_before_tax: Decimal,
    pub markup: AppliedRate,
    pub subtotal_with_markup: Decimal,
    pub gst: AppliedRate,
    pub rounding_unit: Decimal,
    pub rounding_adjustment: Decimal,
    pub total_selling_price: Decimal,
}

/// Price a list of line items.
///
/// Sums cost and selling totals, applies markup over the selling subtotal,
/// adds GST on the marked-up subtotal and rounds the result half-up to the
/// nearest `rounding_unit`. No intermediate rounding takes place.
pub fn compute_summary(
    items: &[LineItem],
    terms: &PricingTerms,
) -> Result<QuoteSummary, LedgerError> {
    if items.is_empty() {
        return Err(LedgerError::InvalidInput(
            "at least one line item is required".to_string(),
        ));
    }
    terms.validate()?;

    let mut lines = Vec::with_capacity(items.len());
    let mut total_net_cost = Decimal::ZERO;
    let mut subtotal_before_tax = Decimal::ZERO;

    for (position, item) in items.iter().enumerate() {
        item.validate(position)?;

        let multiplier = item.multiplier();
        let net_cost = item
            .cost_price()
            .checked_mul(multiplier)
            .ok_or_else(out_of_range)?;
        let selling_total = item
            .selling_price()
            .checked_mul(multiplier)
            .ok_or_else(out_of_range)?;

        total_net_cost = total_net_cost
            .checked_add(net_cost)
            .ok_or_else(out_of_range)?;
        subtotal_before_tax = subtotal_before_tax
            .checked_add(selling_total)
            .ok_or_else(out_of_range)?;

        lines.push(LineTotal {
            kind: item.kind().to_string(),
            label: item.label(),
            multiplier,
            net_cost: net_cost.normalize(),
            selling_total: selling_total.normalize(),
        });
    }

    let markup_amount = percent_of(subtotal_before_tax, terms.markup_percent)?;
    let subtotal_with_markup = subtotal_before_tax
        .checked_add(markup_amount)
        .ok_or_else(out_of_range)?;

    let gst_amount = percent_of(subtotal_with_markup, terms.gst_percent)?;
    let raw_total = subtotal_with_markup
        .checked_add(gst_amount)
        .ok_or_else(out_of_range)?;

    let total_selling_price =
        round_to_unit(raw_total, terms.rounding_unit).ok_or_else(out_of_range)?;

    Ok(QuoteSummary {
        lines,
        total_net_cost: total_net_cost.normalize(),
        subtotal_before_tax: subtotal_before_tax.normalize(),
        markup: AppliedRate {
            value: terms.markup_percent.normalize(),
            amount: markup_amount.normalize(),
        },
        subtotal_with_markup: subtotal_with_markup.normalize(),
        gst: AppliedRate {
            value: terms.gst_percent.normalize(),
            amount: gst_amount.normalize(),
        },
        rounding_unit: terms.rounding_unit.normalize(),
        rounding_adjustment: (total_selling_price - raw_total).normalize(),
        total_selling_price,
    })
}

fn percent_of(amount: Decimal, percent: Decimal) -> Result<Decimal, LedgerError> {
    amount
        .checked_mul(percent)
        .and_then(|v| v.checked_div(HUNDRED))
        .ok_or_else(out_of_range)
}

/// Margin figures derived from a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profit {
    pub net_profit: Decimal,
    /// Absent when the quote carries no cost at all.
    pub profit_percent: Option<Decimal>,
}

/// Pre-tax margin: marked-up subtotal minus net cost.
pub fn profit_of(summary: &QuoteSummary) -> Profit {
    let net_profit = (summary.subtotal_with_markup - summary.total_net_cost).normalize();
    let profit_percent = if summary.total_net_cost.is_zero() {
        None
    } else {
        net_profit
            .checked_mul(HUNDRED)
            .and_then(|v| v.checked_div(summary.total_net_cost))
            .map(|pct| round_money(pct, 2).normalize())
    };

    Profit {
        net_profit,
        profit_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn hotel(cost: Decimal, selling: Decimal, nights: u32) -> LineItem {
        LineItem::HotelStay {
            hotel: "Sea Breeze".to_string(),
            room_type: Some("Deluxe".to_string()),
            nights,
            cost_price: cost,
            selling_price: selling,
        }
    }

    fn terms(markup: Decimal, gst: Decimal, unit: Decimal) -> PricingTerms {
        PricingTerms {
            markup_percent: markup,
            gst_percent: gst,
            rounding_unit: unit,
        }
    }

    // ==================== rounding tests ====================

    #[test]
    fn test_round_money_bankers_rounding_to_even() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(2));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(2.25), 1), dec!(2.2));
        assert_eq!(round_money(dec!(1.236), 2), dec!(1.24));
    }

    #[test]
    fn test_round_to_unit_half_up() {
        assert_eq!(round_to_unit(dec!(10062.15), dec!(10)), Some(dec!(10060)));
        assert_eq!(round_to_unit(dec!(10065), dec!(10)), Some(dec!(10070)));
        assert_eq!(round_to_unit(dec!(10064.99), dec!(10)), Some(dec!(10060)));
        assert_eq!(round_to_unit(dec!(10075), dec!(10)), Some(dec!(10080))); // not to even
    }

    #[test]
    fn test_round_to_unit_other_units() {
        assert_eq!(round_to_unit(dec!(149.5), dec!(1)), Some(dec!(150)));
        assert_eq!(round_to_unit(dec!(1249), dec!(100)), Some(dec!(1200)));
        assert_eq!(round_to_unit(dec!(1250), dec!(100)), Some(dec!(1300)));
        assert_eq!(round_to_unit(dec!(0), dec!(10)), Some(dec!(0)));
    }

    #[test]
    fn test_round_to_unit_past_max_is_none() {
        assert_eq!(round_to_unit(Decimal::MAX, dec!(10)), None);
    }

    // ==================== multiplier tests ====================

    #[test]
    fn test_multipliers_per_variant() {
        assert_eq!(hotel(dec!(1), dec!(1), 3).multiplier(), dec!(3));

        let cab = LineItem::Transport {
            vehicle: "Innova".to_string(),
            quantity: 2,
            days: 4,
            cost_price: dec!(2000),
            selling_price: dec!(2500),
        };
        assert_eq!(cab.multiplier(), dec!(8));

        let flight = LineItem::Flight {
            carrier: "IndiGo".to_string(),
            route: Some("DEL-GOI".to_string()),
            cost_price: dec!(6000),
            selling_price: dec!(6500),
        };
        assert_eq!(flight.multiplier(), dec!(1));
        assert_eq!(flight.label(), "IndiGo DEL-GOI");
    }

    // ==================== compute_summary tests ====================

    #[test]
    fn test_single_hotel_with_gst() {
        let items = vec![hotel(dec!(2800), dec!(3200), 3)];
        let summary = compute_summary(&items, &terms(dec!(0), dec!(5), dec!(10))).unwrap();

        assert_eq!(summary.total_net_cost, dec!(8400));
        assert_eq!(summary.subtotal_before_tax, dec!(9600));
        assert_eq!(summary.subtotal_with_markup, dec!(9600));
        assert_eq!(summary.gst.amount, dec!(480));
        assert_eq!(summary.total_selling_price, dec!(10080));
        assert_eq!(summary.rounding_adjustment, dec!(0));
    }

    #[test]
    fn test_gst_total_rounds_down_to_nearest_ten() {
        let items = vec![LineItem::SpecialInclusion {
            description: "Candlelight dinner".to_string(),
            cost_price: dec!(7000),
            selling_price: dec!(9583),
        }];
        let summary = compute_summary(&items, &terms(dec!(0), dec!(5), dec!(10))).unwrap();

        assert_eq!(summary.subtotal_with_markup, dec!(9583));
        assert_eq!(summary.gst.amount, dec!(479.15));
        assert_eq!(summary.total_selling_price, dec!(10060));
        assert_eq!(summary.rounding_adjustment, dec!(-2.15));
    }

    #[test]
    fn test_markup_applies_to_selling_subtotal() {
        let items = vec![hotel(dec!(1000), dec!(1200), 2)];
        let summary = compute_summary(&items, &terms(dec!(10), dec!(5), dec!(10))).unwrap();

        // 2400 * 1.10 = 2640, * 1.05 = 2772 -> 2770
        assert_eq!(summary.markup.amount, dec!(240));
        assert_eq!(summary.subtotal_with_markup, dec!(2640));
        assert_eq!(summary.total_selling_price, dec!(2770));
        assert!(summary.subtotal_with_markup >= summary.subtotal_before_tax);
    }

    #[test]
    fn test_zero_markup_zero_gst_rounds_selling_sum() {
        let items = vec![
            hotel(dec!(100), dec!(123), 1),
            LineItem::Flight {
                carrier: "Vistara".to_string(),
                route: None,
                cost_price: dec!(50),
                selling_price: dec!(51),
            },
        ];
        let summary = compute_summary(&items, &terms(dec!(0), dec!(0), dec!(10))).unwrap();

        assert_eq!(summary.subtotal_before_tax, dec!(174));
        assert_eq!(summary.total_selling_price, dec!(170));
    }

    #[test]
    fn test_mixed_line_items() {
        let items = vec![
            hotel(dec!(2800), dec!(3200), 3),
            LineItem::Transport {
                vehicle: "Tempo Traveller".to_string(),
                quantity: 1,
                days: 4,
                cost_price: dec!(3000),
                selling_price: dec!(3500),
            },
            LineItem::SpecialInclusion {
                description: "Houseboat lunch".to_string(),
                cost_price: dec!(1500),
                selling_price: dec!(1800),
            },
        ];
        let summary = compute_summary(&items, &terms(dec!(0), dec!(5), dec!(10))).unwrap();

        assert_eq!(summary.lines.len(), 3);
        assert_eq!(summary.lines[1].multiplier, dec!(4));
        assert_eq!(summary.lines[1].selling_total, dec!(14000));
        assert_eq!(summary.total_net_cost, dec!(21900));
        assert_eq!(summary.subtotal_before_tax, dec!(25400));
        // 25400 * 1.05 = 26670
        assert_eq!(summary.total_selling_price, dec!(26670));
    }

    #[test]
    fn test_selling_below_cost_is_allowed() {
        let items = vec![hotel(dec!(5000), dec!(4000), 1)];
        let summary = compute_summary(&items, &terms(dec!(0), dec!(0), dec!(10))).unwrap();

        assert!(summary.total_net_cost > summary.subtotal_before_tax);
        assert_eq!(profit_of(&summary).net_profit, dec!(-1000));
    }

    #[test]
    fn test_total_is_multiple_of_unit() {
        let units = [dec!(1), dec!(5), dec!(10), dec!(50), dec!(100)];
        let sellings = [dec!(999.99), dec!(1234.56), dec!(7.77), dec!(31415.92)];

        for unit in units {
            for selling in sellings {
                let items = vec![hotel(dec!(1), selling, 3)];
                let summary =
                    compute_summary(&items, &terms(dec!(7.5), dec!(18), unit)).unwrap();
                assert!(
                    (summary.total_selling_price % unit).is_zero(),
                    "{} is not a multiple of {}",
                    summary.total_selling_price,
                    unit
                );
            }
        }
    }

    #[test]
    fn test_total_matches_rounded_raw_total() {
        let items = vec![hotel(dec!(1750), dec!(2199), 5)];
        let t = terms(dec!(12.5), dec!(18), dec!(10));
        let summary = compute_summary(&items, &t).unwrap();

        let raw = summary.subtotal_with_markup * (Decimal::ONE + t.gst_percent / dec!(100));
        assert_eq!(Some(summary.total_selling_price), round_to_unit(raw, t.rounding_unit));
    }

    #[test]
    fn test_compute_summary_is_deterministic() {
        let items = vec![hotel(dec!(2800), dec!(3200), 3)];
        let t = terms(dec!(3), dec!(5), dec!(10));

        let first = compute_summary(&items, &t).unwrap();
        let second = compute_summary(&items, &t).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    // ==================== invalid input tests ====================

    #[test]
    fn test_empty_line_items_rejected() {
        let err = compute_summary(&[], &PricingTerms::default()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn test_negative_percents_rejected() {
        let items = vec![hotel(dec!(1), dec!(1), 1)];

        let err = compute_summary(&items, &terms(dec!(-1), dec!(5), dec!(10))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        let err = compute_summary(&items, &terms(dec!(0), dec!(-5), dec!(10))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn test_bad_rounding_unit_rejected() {
        let items = vec![hotel(dec!(1), dec!(1), 1)];

        for unit in [dec!(0), dec!(-10), dec!(2.5)] {
            let err = compute_summary(&items, &terms(dec!(0), dec!(5), unit)).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidInput(_)), "unit {}", unit);
        }
    }

    #[test]
    fn test_negative_selling_price_rejected() {
        let items = vec![hotel(dec!(100), dec!(-1), 1)];
        let err = compute_summary(&items, &PricingTerms::default()).unwrap_err();
        assert!(err.to_string().contains("selling price"));
    }

    #[test]
    fn test_zero_nights_rejected() {
        let items = vec![hotel(dec!(100), dec!(120), 0)];
        let err = compute_summary(&items, &PricingTerms::default()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn test_line_total_overflow_is_invalid_input() {
        let items = vec![hotel(dec!(1), Decimal::MAX / dec!(100), 1000)];
        let err = compute_summary(&items, &PricingTerms::default()).unwrap_err();

        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_subtotal_overflow_is_invalid_input() {
        let big = Decimal::MAX / dec!(2);
        let items = vec![hotel(dec!(1), big, 1), hotel(dec!(1), big, 1), hotel(dec!(1), big, 1)];
        let err = compute_summary(&items, &PricingTerms::default()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn test_huge_markup_is_invalid_input() {
        let items = vec![hotel(dec!(2800), dec!(3200), 3)];

        let err = compute_summary(&items, &terms(Decimal::MAX, dec!(5), dec!(10))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        let err = compute_summary(&items, &terms(dec!(0), Decimal::MAX, dec!(10))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn test_total_rounding_past_max_is_invalid_input() {
        // Fits before rounding, not after.
        let items = vec![LineItem::SpecialInclusion {
            description: "Charter".to_string(),
            cost_price: dec!(0),
            selling_price: Decimal::MAX,
        }];
        let err = compute_summary(&items, &terms(dec!(0), dec!(0), dec!(10))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    // ==================== profit tests ====================

    #[test]
    fn test_profit_of_summary() {
        let items = vec![hotel(dec!(2800), dec!(3200), 3)];
        let summary = compute_summary(&items, &terms(dec!(0), dec!(5), dec!(10))).unwrap();
        let profit = profit_of(&summary);

        assert_eq!(profit.net_profit, dec!(1200));
        // 1200 / 8400 = 14.2857...
        assert_eq!(profit.profit_percent, Some(dec!(14.29)));
    }

    #[test]
    fn test_profit_percent_absent_without_cost() {
        let items = vec![LineItem::SpecialInclusion {
            description: "Welcome kit".to_string(),
            cost_price: dec!(0),
            selling_price: dec!(500),
        }];
        let summary = compute_summary(&items, &PricingTerms::default()).unwrap();

        assert_eq!(profit_of(&summary).profit_percent, None);
    }

    #[test]
    fn test_line_item_json_shape() {
        let json = r#"{"kind":"transport","vehicle":"Sedan","quantity":1,"days":2,"cost_price":1800,"selling_price":"2200"}"#;
        let item: LineItem = serde_json::from_str(json).unwrap();

        assert_eq!(item.kind(), "transport");
        assert_eq!(item.multiplier(), dec!(2));
        assert_eq!(item.selling_price(), dec!(2200));
    }
}
