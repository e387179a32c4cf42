//! Pure functions used by the lifecycle APIs. Nothing in here touches the database.
mod commission_resolver;
mod settlement_calculator;

pub use commission_resolver::resolve_commission;
pub use settlement_calculator::{calculate_settlement, vat_for, SettlementCalculation, SettlementStatement, VAT_RATE};
