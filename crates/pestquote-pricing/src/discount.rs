use std::collections::HashMap;

use pestquote_core::{AppliesTo, DiscountConfig, DiscountType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ad-hoc discount typed in by the user rather than picked from the catalog.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualDiscount {
    pub amount: Decimal,
    pub percentage: Decimal,
}

/// Where a line's discount comes from.
///
/// A catalog reference carries the manual values too: if the id does not
/// resolve, pricing falls back to them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscountSource {
    Catalog {
        discount_id: Uuid,
        fallback: ManualDiscount,
    },
    Manual(ManualDiscount),
}

impl DiscountSource {
    pub fn from_request(
        discount_id: Option<Uuid>,
        amount: Option<Decimal>,
        percentage: Option<Decimal>,
    ) -> Self {
        let manual = ManualDiscount {
            amount: amount.unwrap_or(Decimal::ZERO),
            percentage: percentage.unwrap_or(Decimal::ZERO),
        };
        match discount_id {
            Some(discount_id) => Self::Catalog {
                discount_id,
                fallback: manual,
            },
            None => Self::Manual(manual),
        }
    }

    pub fn catalog_id(&self) -> Option<Uuid> {
        match self {
            Self::Catalog { discount_id, .. } => Some(*discount_id),
            Self::Manual(_) => None,
        }
    }
}

/// Normalized discount the pricer works from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedDiscount {
    pub discount_id: Option<Uuid>,
    pub amount: Decimal,
    pub percentage: Decimal,
    pub applies_to: AppliesTo,
}

impl AppliedDiscount {
    pub fn none() -> Self {
        Self::manual(ManualDiscount::default())
    }

    pub fn manual(manual: ManualDiscount) -> Self {
        Self {
            discount_id: None,
            amount: manual.amount,
            percentage: manual.percentage,
            applies_to: AppliesTo::Both,
        }
    }

    pub fn from_config(config: &DiscountConfig) -> Self {
        let (amount, percentage) = match config.discount_type {
            DiscountType::Percentage => (Decimal::ZERO, config.discount_value),
            DiscountType::FixedAmount => (config.discount_value, Decimal::ZERO),
        };
        Self {
            discount_id: Some(config.id),
            amount,
            percentage,
            applies_to: config.applies_to_price,
        }
    }
}

/// Resolves a line's discount against the loaded catalog discounts.
///
/// Unknown or inactive catalog discounts quietly fall back to the manual values.
pub fn resolve_discount(
    source: &DiscountSource,
    catalog: &HashMap<Uuid, DiscountConfig>,
) -> AppliedDiscount {
    match source {
        DiscountSource::Catalog {
            discount_id,
            fallback,
        } => match catalog.get(discount_id).filter(|config| config.is_active) {
            Some(config) => AppliedDiscount::from_config(config),
            None => AppliedDiscount::manual(*fallback),
        },
        DiscountSource::Manual(manual) => AppliedDiscount::manual(*manual),
    }
}
