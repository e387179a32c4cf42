//! Closing and settlement arithmetic.
//!
//! Everything here is a pure function of a closing report and the snapshots frozen onto the order when it was
//! matched, so a payout can always be re-derived from persisted rows.
use haul_common::{Rate, Won};
use serde::{Deserialize, Serialize};

use crate::{
    api::errors::LifecycleError,
    db_types::{ClosingReport, CommissionSnapshot, DeductionLeg, LegKind, NewClosingReport, PricingSnapshot},
};

/// VAT on the supply amount, 10%.
pub const VAT_RATE: Rate = Rate::from_bps(1000);

pub fn vat_for(supply: Won) -> Won {
    VAT_RATE.share_of(supply)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCalculation {
    pub supply_amount: Won,
    pub vat_amount: Won,
    pub total_amount: Won,
    pub platform_fee: Won,
    pub team_leader_fee: Won,
    /// What the helper receives before any incident deductions.
    pub helper_net: Won,
    /// True when the order's minimum total raised the supply amount.
    pub min_total_applied: bool,
}

/// Computes the provisional payout for a closing report.
///
/// `supply = (delivered + returned) * final_price_per_box + etc_count * etc_unit_price + Σ extra costs`, raised to the
/// minimum total if one was frozen at match time. VAT is 10% of supply, rounded half away from zero. The commission
/// snapshot then splits the VAT-inclusive total into the platform share, the team-leader share, and the helper's net.
///
/// Amounts that do not fit in a [`Won`] are rejected as a validation error.
pub fn calculate_settlement(
    report: &NewClosingReport,
    pricing: &PricingSnapshot,
    commission: &CommissionSnapshot,
) -> Result<SettlementCalculation, LifecycleError> {
    validate_report(report)?;
    let boxes = report.delivered_count.checked_add(report.returned_count).ok_or_else(too_large)?;
    let extras =
        report.extra_costs.iter().try_fold(Won::zero(), |sum, c| sum.checked_add(c.amount)).ok_or_else(too_large)?;
    let etc = report.etc_unit_price.checked_mul(report.etc_count).ok_or_else(too_large)?;
    let mut supply = pricing
        .final_price_per_box
        .checked_mul(boxes)
        .and_then(|s| s.checked_add(etc))
        .and_then(|s| s.checked_add(extras))
        .ok_or_else(too_large)?;
    let mut min_total_applied = false;
    if let Some(floor) = pricing.min_total {
        if supply < floor {
            supply = floor;
            min_total_applied = true;
        }
    }
    let vat = vat_for(supply);
    let total = supply.checked_add(vat).ok_or_else(too_large)?;
    let platform_fee = commission.platform_rate.share_of(total);
    let team_leader_fee = commission.team_leader_rate.share_of(total);
    let helper_net =
        total.checked_sub(platform_fee).and_then(|n| n.checked_sub(team_leader_fee)).ok_or_else(too_large)?;
    Ok(SettlementCalculation {
        supply_amount: supply,
        vat_amount: vat,
        total_amount: total,
        platform_fee,
        team_leader_fee,
        helper_net,
        min_total_applied,
    })
}

fn too_large() -> LifecycleError {
    LifecycleError::validation("The closing report amounts are too large to settle")
}

pub(crate) fn validate_report(report: &NewClosingReport) -> Result<(), LifecycleError> {
    if report.delivered_count < 0 || report.returned_count < 0 || report.etc_count < 0 {
        return Err(LifecycleError::validation("Box counts cannot be negative"));
    }
    if report.etc_unit_price.is_negative() {
        return Err(LifecycleError::validation("The etc unit price cannot be negative"));
    }
    if let Some(cost) = report.extra_costs.iter().find(|c| c.amount.is_negative()) {
        return Err(LifecycleError::validation(format!("Extra cost '{}' cannot be negative", cost.label)));
    }
    Ok(())
}

impl From<&ClosingReport> for NewClosingReport {
    fn from(report: &ClosingReport) -> Self {
        Self {
            delivered_count: report.delivered_count,
            returned_count: report.returned_count,
            etc_count: report.etc_count,
            etc_unit_price: report.etc_unit_price,
            extra_costs: report.extra_costs.0.clone(),
            memo: report.memo.clone(),
        }
    }
}

/// The provisional calculation for an order, adjusted by every deduction leg recorded against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementStatement {
    pub order_id: i64,
    pub calculation: SettlementCalculation,
    pub helper_deductions: Won,
    pub requester_refunds: Won,
    /// `helper_net` less helper deductions. Negative when deductions exceed the payout.
    pub final_helper_payout: Won,
    pub legs: Vec<DeductionLeg>,
}

impl SettlementStatement {
    /// Legs count towards the statement as soon as they are recorded, whether or not the payment provider has
    /// executed them yet.
    pub fn new(order_id: i64, calculation: SettlementCalculation, legs: Vec<DeductionLeg>) -> Self {
        let total_for = |kind: LegKind| legs.iter().filter(|l| l.leg == kind).map(|l| l.amount).sum::<Won>();
        let helper_deductions = total_for(LegKind::HelperDeduction);
        let requester_refunds = total_for(LegKind::RequesterRefund);
        Self {
            order_id,
            calculation,
            helper_deductions,
            requester_refunds,
            final_helper_payout: calculation.helper_net - helper_deductions,
            legs,
        }
    }
}
