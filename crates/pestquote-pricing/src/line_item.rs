use pestquote_core::{AddOnService, LineItemTarget, NewLineItem, QuoteLineItem, ServicePlan};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    discount::{AppliedDiscount, DiscountSource},
    size::SizeAdjustment,
};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
const CURRENCY_DP: u32 = 2;

/// One requested line as it arrives from the caller, in display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineRequest {
    pub target: LineItemTarget,
    pub discount: DiscountSource,
    pub service_frequency: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinePrice {
    pub initial_price: Decimal,
    pub recurring_price: Decimal,
    pub final_initial_price: Decimal,
    pub final_recurring_price: Decimal,
}

/// Amount comes off first, then the percentage applies to what is left.
/// Never below zero, whatever the discount magnitude.
pub fn apply_discount(price: Decimal, discount: &AppliedDiscount) -> Decimal {
    if discount.percentage >= HUNDRED {
        return Decimal::ZERO;
    }

    let remaining = price
        .checked_sub(discount.amount)
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO);
    let discounted = if discount.percentage > Decimal::ZERO {
        let factor = Decimal::ONE - discount.percentage / HUNDRED;
        remaining.checked_mul(factor).unwrap_or(Decimal::ZERO)
    } else {
        remaining
    };

    to_cents(discounted)
}

pub fn price_line(initial: Decimal, recurring: Decimal, discount: &AppliedDiscount) -> LinePrice {
    let initial = to_cents(initial);
    let recurring = to_cents(recurring);

    let final_initial_price = if discount.applies_to.covers_initial() {
        apply_discount(initial, discount)
    } else {
        initial
    };
    let final_recurring_price = if discount.applies_to.covers_recurring() {
        apply_discount(recurring, discount)
    } else {
        recurring
    };

    LinePrice {
        initial_price: initial,
        recurring_price: recurring,
        final_initial_price,
        final_recurring_price,
    }
}

/// Re-prices a stored plan line against the current catalog price and size
/// increase, keeping the discount it was quoted with.
pub fn reprice_plan_line(
    item: &QuoteLineItem,
    plan: &ServicePlan,
    size: SizeAdjustment,
) -> NewLineItem {
    let discount = AppliedDiscount {
        discount_id: item.discount_id,
        amount: item.discount_amount,
        percentage: item.discount_percentage,
        applies_to: item.applies_to_price,
    };
    let initial = plan.initial_price.unwrap_or(Decimal::ZERO) + size.initial_increase;
    let recurring = plan.recurring_price.unwrap_or(Decimal::ZERO) + size.recurring_increase;
    let price = price_line(initial, recurring, &discount);

    NewLineItem {
        initial_price: price.initial_price,
        recurring_price: price.recurring_price,
        final_initial_price: price.final_initial_price,
        final_recurring_price: price.final_recurring_price,
        ..item.to_new_line_item(LineItemTarget::ServicePlan(plan.id))
    }
}

fn to_cents(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).round_dp(CURRENCY_DP)
}

pub fn price_plan(
    plan: &ServicePlan,
    request: &LineRequest,
    discount: &AppliedDiscount,
    size: SizeAdjustment,
    display_order: i32,
) -> NewLineItem {
    let initial = plan.initial_price.unwrap_or(Decimal::ZERO) + size.initial_increase;
    let recurring = plan.recurring_price.unwrap_or(Decimal::ZERO) + size.recurring_increase;

    build_line(
        LineItemTarget::ServicePlan(plan.id),
        plan.plan_name.clone(),
        plan.plan_description.clone(),
        plan.billing_frequency.clone(),
        price_line(initial, recurring, discount),
        request,
        discount,
        display_order,
    )
}

pub fn price_add_on(
    add_on: &AddOnService,
    request: &LineRequest,
    discount: &AppliedDiscount,
    display_order: i32,
) -> NewLineItem {
    let initial = add_on.initial_price.unwrap_or(Decimal::ZERO);
    let recurring = add_on.recurring_price.unwrap_or(Decimal::ZERO);

    build_line(
        LineItemTarget::AddOn(add_on.id),
        add_on.addon_name.clone(),
        add_on.addon_description.clone(),
        add_on.billing_frequency.clone(),
        price_line(initial, recurring, discount),
        request,
        discount,
        display_order,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_line(
    target: LineItemTarget,
    item_name: String,
    item_description: Option<String>,
    billing_frequency: Option<String>,
    price: LinePrice,
    request: &LineRequest,
    discount: &AppliedDiscount,
    display_order: i32,
) -> NewLineItem {
    NewLineItem {
        target,
        item_name,
        item_description,
        initial_price: price.initial_price,
        recurring_price: price.recurring_price,
        discount_id: discount.discount_id,
        discount_percentage: discount.percentage,
        discount_amount: discount.amount,
        applies_to_price: discount.applies_to,
        final_initial_price: price.final_initial_price,
        final_recurring_price: price.final_recurring_price,
        billing_frequency,
        service_frequency: request.service_frequency.clone(),
        display_order,
    }
}

#[cfg(test)]
mod tests {
    use pestquote_core::AppliesTo;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::discount::ManualDiscount;

    fn discount(amount: Decimal, percentage: Decimal, applies_to: AppliesTo) -> AppliedDiscount {
        AppliedDiscount {
            discount_id: None,
            amount,
            percentage,
            applies_to,
        }
    }

    #[test]
    fn amount_is_subtracted_before_percentage() {
        let price = price_line(dec!(100), dec!(100), &discount(dec!(20), dec!(50), AppliesTo::Both));

        assert_eq!(price.final_initial_price, dec!(40));
        assert_eq!(price.final_recurring_price, dec!(40));
        assert_eq!(price.initial_price, dec!(100));
    }

    #[test]
    fn initial_only_discount_leaves_recurring_untouched() {
        let price = price_line(dec!(150), dec!(49.99), &discount(dec!(500), dec!(90), AppliesTo::Initial));

        assert_eq!(price.final_initial_price, Decimal::ZERO);
        assert_eq!(price.final_recurring_price, dec!(49.99));
    }

    #[test]
    fn recurring_only_discount_leaves_initial_untouched() {
        let price = price_line(dec!(150), dec!(60), &discount(Decimal::ZERO, dec!(25), AppliesTo::Recurring));

        assert_eq!(price.final_initial_price, dec!(150));
        assert_eq!(price.final_recurring_price, dec!(45));
    }

    #[test]
    fn oversized_discounts_clamp_to_zero() {
        for (amount, percentage) in [(dec!(1000), Decimal::ZERO), (Decimal::ZERO, dec!(250)), (dec!(99.99), dec!(100))] {
            let price = price_line(dec!(99), dec!(35), &discount(amount, percentage, AppliesTo::Both));
            assert!(price.final_initial_price >= Decimal::ZERO);
            assert!(price.final_recurring_price >= Decimal::ZERO);
        }
    }

    #[test]
    fn huge_discounts_never_overflow() {
        let by_percentage = price_line(dec!(1000), dec!(80), &discount(Decimal::ZERO, Decimal::MAX, AppliesTo::Both));
        assert_eq!(by_percentage.final_initial_price, Decimal::ZERO);
        assert_eq!(by_percentage.final_recurring_price, Decimal::ZERO);

        let by_amount = price_line(dec!(1000), dec!(80), &discount(Decimal::MAX, dec!(99.9), AppliesTo::Both));
        assert_eq!(by_amount.final_initial_price, Decimal::ZERO);
        assert_eq!(by_amount.final_recurring_price, Decimal::ZERO);
    }

    #[test]
    fn untargeted_component_is_rounded_like_targeted_one() {
        let price = price_line(dec!(100.456), dec!(33.335), &discount(dec!(10), Decimal::ZERO, AppliesTo::Initial));

        assert_eq!(price.initial_price, dec!(100.46));
        assert_eq!(price.final_initial_price, dec!(90.46));
        assert_eq!(price.recurring_price, dec!(33.34));
        assert_eq!(price.final_recurring_price, dec!(33.34));
    }

    #[test]
    fn final_prices_round_to_cents() {
        let price = price_line(dec!(49.99), dec!(0), &discount(Decimal::ZERO, dec!(15), AppliesTo::Both));

        assert_eq!(price.final_initial_price, dec!(42.49));
    }

    #[test]
    fn plan_line_snapshots_catalog_fields_and_size_increase() {
        let plan = ServicePlan {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            plan_name: "Mosquito Shield".to_string(),
            plan_description: Some("Monthly yard treatment".to_string()),
            initial_price: None,
            recurring_price: Some(dec!(60)),
            billing_frequency: Some("monthly".to_string()),
            home_size_pricing: None,
            yard_size_pricing: None,
        };
        let request = LineRequest {
            target: LineItemTarget::ServicePlan(plan.id),
            discount: DiscountSource::Manual(ManualDiscount::default()),
            service_frequency: Some("bi-weekly".to_string()),
        };
        let size = SizeAdjustment {
            initial_increase: dec!(25),
            recurring_increase: dec!(15),
        };

        let line = price_plan(&plan, &request, &AppliedDiscount::none(), size, 3);

        assert_eq!(line.target.service_plan_id(), Some(plan.id));
        assert_eq!(line.target.addon_id(), None);
        assert_eq!(line.item_name, "Mosquito Shield");
        assert_eq!(line.initial_price, dec!(25));
        assert_eq!(line.recurring_price, dec!(75));
        assert_eq!(line.final_recurring_price, dec!(75));
        assert_eq!(line.service_frequency.as_deref(), Some("bi-weekly"));
        assert_eq!(line.display_order, 3);
    }
}
