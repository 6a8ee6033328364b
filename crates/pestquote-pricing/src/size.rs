use pestquote_core::{CompanyPricingSettings, ServicePlan, SizePricing};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One home or yard size bracket and the price increase it carries for a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeOption {
    pub value: String,
    pub interval_index: u32,
    pub initial_increase: Decimal,
    pub recurring_increase: Decimal,
    pub range_start: Decimal,
    /// `None` for the open-ended top bracket.
    pub range_end: Option<Decimal>,
}

impl SizeOption {
    pub fn contains(&self, value: Decimal) -> bool {
        match self.range_end {
            Some(end) => value >= self.range_start && value <= end,
            None => value >= self.range_start,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeAdjustment {
    pub initial_increase: Decimal,
    pub recurring_increase: Decimal,
}

pub fn home_size_options(
    settings: &CompanyPricingSettings,
    pricing: Option<&SizePricing>,
) -> Vec<SizeOption> {
    interval_options(
        Decimal::from(settings.base_home_sq_ft),
        Decimal::from(settings.home_sq_ft_interval),
        Decimal::from(settings.max_home_sq_ft),
        Decimal::ONE,
        0,
        pricing,
    )
}

pub fn yard_size_options(
    settings: &CompanyPricingSettings,
    pricing: Option<&SizePricing>,
) -> Vec<SizeOption> {
    interval_options(
        settings.base_yard_acres,
        settings.yard_acres_interval,
        settings.max_yard_acres,
        Decimal::new(1, 2),
        2,
        pricing,
    )
}

// Brackets are 0-base, then (previous end + step) up to previous end + interval,
// until one reaches max; that last bracket is open-ended.
fn interval_options(
    base: Decimal,
    interval: Decimal,
    max: Decimal,
    step: Decimal,
    scale: u32,
    pricing: Option<&SizePricing>,
) -> Vec<SizeOption> {
    let interval = interval.max(step);
    let mut options = Vec::new();
    let mut current = Decimal::ZERO;
    let mut index: u32 = 0;

    while current <= max {
        let range_start = current;
        let range_end = if current.is_zero() {
            base
        } else {
            (current + interval).min(max)
        };
        let is_last = range_end >= max;

        let multiplier = Decimal::from(index);
        let (initial_increase, recurring_increase) = match pricing {
            Some(pricing) => (
                multiplier * pricing.initial_cost_per_interval,
                multiplier * pricing.recurring_cost_per_interval,
            ),
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        let value = if is_last {
            format!("{}+", format_bound(range_start, scale))
        } else {
            format!(
                "{}-{}",
                format_bound(range_start, scale),
                format_bound(range_end, scale)
            )
        };

        options.push(SizeOption {
            value,
            interval_index: index,
            initial_increase,
            recurring_increase,
            range_start,
            range_end: (!is_last).then_some(range_end),
        });

        if is_last {
            break;
        }
        current = range_end.max(range_start) + step;
        index += 1;
    }

    options
}

fn format_bound(value: Decimal, scale: u32) -> String {
    let mut rounded = value.round_dp(scale);
    rounded.rescale(scale);
    rounded.to_string()
}

/// Starting value of a stored range label: `"3000+"` is 3000, `"1501-2000"` is 1501.
pub fn parse_range_start(range: &str) -> Option<Decimal> {
    let start = range
        .trim()
        .split(['-', '+'])
        .next()?
        .split_whitespace()
        .next()?
        .replace(',', "");
    start.parse::<Decimal>().ok()
}

pub fn find_option(value: Decimal, options: &[SizeOption]) -> Option<&SizeOption> {
    options.iter().find(|option| option.contains(value))
}

/// Size-driven price increase for a plan at the lead's home/yard size.
///
/// Plans only scale with size when the company has interval settings and the
/// plan defines both home and yard per-interval costs.
pub fn size_adjustment(
    settings: Option<&CompanyPricingSettings>,
    plan: &ServicePlan,
    home_size_range: Option<&str>,
    yard_size_range: Option<&str>,
) -> SizeAdjustment {
    let (Some(settings), Some(home_pricing), Some(yard_pricing)) = (
        settings,
        plan.home_size_pricing.as_ref(),
        plan.yard_size_pricing.as_ref(),
    ) else {
        return SizeAdjustment::default();
    };

    let home = bracket_increase(
        &home_size_options(settings, Some(home_pricing)),
        home_size_range,
    );
    let yard = bracket_increase(
        &yard_size_options(settings, Some(yard_pricing)),
        yard_size_range,
    );

    SizeAdjustment {
        initial_increase: home.initial_increase + yard.initial_increase,
        recurring_increase: home.recurring_increase + yard.recurring_increase,
    }
}

fn bracket_increase(options: &[SizeOption], range: Option<&str>) -> SizeAdjustment {
    range
        .and_then(parse_range_start)
        .and_then(|value| find_option(value, options))
        .map(|option| SizeAdjustment {
            initial_increase: option.initial_increase,
            recurring_increase: option.recurring_increase,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    fn settings() -> CompanyPricingSettings {
        CompanyPricingSettings {
            company_id: Uuid::new_v4(),
            base_home_sq_ft: 1500,
            home_sq_ft_interval: 500,
            max_home_sq_ft: 3000,
            base_yard_acres: dec!(0.25),
            yard_acres_interval: dec!(0.25),
            max_yard_acres: dec!(1.0),
        }
    }

    fn plan() -> ServicePlan {
        ServicePlan {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            plan_name: "Quarterly Pest".to_string(),
            plan_description: None,
            initial_price: Some(dec!(99)),
            recurring_price: Some(dec!(45)),
            billing_frequency: Some("monthly".to_string()),
            home_size_pricing: Some(SizePricing {
                initial_cost_per_interval: dec!(20),
                recurring_cost_per_interval: dec!(10),
            }),
            yard_size_pricing: Some(SizePricing {
                initial_cost_per_interval: dec!(25),
                recurring_cost_per_interval: dec!(15),
            }),
        }
    }

    #[test]
    fn home_brackets_follow_company_intervals() {
        let values: Vec<String> = home_size_options(&settings(), None)
            .into_iter()
            .map(|option| option.value)
            .collect();

        assert_eq!(values, vec!["0-1500", "1501-2001", "2002-2502", "2503+"]);
    }

    #[test]
    fn yard_brackets_use_hundredth_acre_steps() {
        let options = yard_size_options(&settings(), None);

        assert_eq!(options[0].value, "0.00-0.25");
        assert_eq!(options[1].value, "0.26-0.51");
        assert_eq!(options.last().map(|o| o.range_end), Some(None));
    }

    #[test]
    fn parses_range_labels() {
        assert_eq!(parse_range_start("3000+"), Some(dec!(3000)));
        assert_eq!(parse_range_start("1501-2000"), Some(dec!(1501)));
        assert_eq!(parse_range_start("0.26-0.50"), Some(dec!(0.26)));
        assert_eq!(parse_range_start("0-1500 Sq Ft"), Some(dec!(0)));
        assert_eq!(parse_range_start("large"), None);
    }

    #[test]
    fn adjustment_sums_home_and_yard_brackets() {
        let settings = settings();
        let adjustment = size_adjustment(Some(&settings), &plan(), Some("1501-2000"), Some("0.26-0.50"));

        assert_eq!(adjustment.initial_increase, dec!(45));
        assert_eq!(adjustment.recurring_increase, dec!(25));
    }

    #[test]
    fn no_adjustment_without_settings_or_plan_pricing() {
        let mut plan = plan();
        assert_eq!(
            size_adjustment(None, &plan, Some("3000+"), Some("1.00+")),
            SizeAdjustment::default()
        );

        plan.yard_size_pricing = None;
        let settings = settings();
        assert_eq!(
            size_adjustment(Some(&settings), &plan, Some("3000+"), None),
            SizeAdjustment::default()
        );
    }
}
