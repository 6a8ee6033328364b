use pestquote_core::{Lead, NewLineItem, QuoteDraft};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteTotals {
    pub total_initial_price: Decimal,
    pub total_recurring_price: Decimal,
}

impl QuoteTotals {
    pub fn from_lines(lines: &[NewLineItem]) -> Self {
        lines.iter().fold(Self::default(), |totals, line| Self {
            total_initial_price: totals.total_initial_price + line.final_initial_price,
            total_recurring_price: totals.total_recurring_price + line.final_recurring_price,
        })
    }
}

/// Quote header snapshot taken from the lead and its service address as they
/// are right now. Later address edits do not flow into existing quotes.
pub fn draft_from_lead(lead: &Lead, totals: QuoteTotals) -> QuoteDraft {
    QuoteDraft {
        lead_id: lead.id,
        company_id: lead.company_id,
        customer_id: lead.customer_id,
        service_address_id: lead.service_address_id,
        primary_pest: lead.pest_type.clone(),
        additional_pests: lead.additional_pests.clone(),
        home_size_range: lead.home_size_range.clone(),
        yard_size_range: lead.yard_size_range.clone(),
        total_initial_price: totals.total_initial_price.max(Decimal::ZERO),
        total_recurring_price: totals.total_recurring_price.max(Decimal::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use pestquote_core::{AppliesTo, LineItemTarget};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    fn line(final_initial: Decimal, final_recurring: Decimal) -> NewLineItem {
        NewLineItem {
            target: LineItemTarget::AddOn(Uuid::new_v4()),
            item_name: "Termite Bait".to_string(),
            item_description: None,
            initial_price: final_initial,
            recurring_price: final_recurring,
            discount_id: None,
            discount_percentage: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            applies_to_price: AppliesTo::Both,
            final_initial_price: final_initial,
            final_recurring_price: final_recurring,
            billing_frequency: None,
            service_frequency: None,
            display_order: 0,
        }
    }

    #[test]
    fn sums_final_prices() {
        let totals = QuoteTotals::from_lines(&[line(dec!(40), dec!(35.50)), line(dec!(125), dec!(0))]);

        assert_eq!(totals.total_initial_price, dec!(165));
        assert_eq!(totals.total_recurring_price, dec!(35.50));
    }

    #[test]
    fn draft_snapshots_lead_metadata() {
        let lead = Lead {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            company_slug: "acme-pest".to_string(),
            customer_id: Some(Uuid::new_v4()),
            service_address_id: Some(Uuid::new_v4()),
            lead_status: "in_process".to_string(),
            pest_type: Some("ants".to_string()),
            additional_pests: vec!["spiders".to_string()],
            home_size_range: Some("1501-2000".to_string()),
            yard_size_range: None,
        };

        let draft = draft_from_lead(&lead, QuoteTotals::default());

        assert_eq!(draft.lead_id, lead.id);
        assert_eq!(draft.primary_pest.as_deref(), Some("ants"));
        assert_eq!(draft.additional_pests, vec!["spiders".to_string()]);
        assert_eq!(draft.home_size_range.as_deref(), Some("1501-2000"));
        assert_eq!(draft.total_initial_price, Decimal::ZERO);
    }
}
