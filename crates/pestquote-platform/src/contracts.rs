use chrono::{DateTime, Utc};
use pestquote_core::{LineItemTarget, Quote, QuoteStatus, QuoteUpdate};
use pestquote_pricing::{DiscountSource, LineRequest};
use pestquote_quotes::ShareLink;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePlanSelection {
    pub service_plan_id: Uuid,
    pub discount_id: Option<Uuid>,
    pub discount_amount: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub service_frequency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOnSelection {
    pub addon_id: Uuid,
    pub discount_id: Option<Uuid>,
    pub discount_amount: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub service_frequency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuoteRequest {
    #[serde(default)]
    pub service_plans: Vec<ServicePlanSelection>,
    #[serde(default)]
    pub add_ons: Vec<AddOnSelection>,
}

impl PriceQuoteRequest {
    /// Plans first, then add-ons, each in the order the caller sent them.
    pub fn into_line_requests(self) -> Vec<LineRequest> {
        let plans = self.service_plans.into_iter().map(|plan| LineRequest {
            target: LineItemTarget::ServicePlan(plan.service_plan_id),
            discount: DiscountSource::from_request(
                plan.discount_id,
                plan.discount_amount,
                plan.discount_percentage,
            ),
            service_frequency: normalize_text(plan.service_frequency),
        });
        let add_ons = self.add_ons.into_iter().map(|add_on| LineRequest {
            target: LineItemTarget::AddOn(add_on.addon_id),
            discount: DiscountSource::from_request(
                add_on.discount_id,
                add_on.discount_amount,
                add_on.discount_percentage,
            ),
            service_frequency: normalize_text(add_on.service_frequency),
        });

        plans.chain(add_ons).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQuoteRequest {
    pub quote_status: Option<QuoteStatus>,
    pub valid_until: Option<DateTime<Utc>>,
    pub primary_pest: Option<String>,
    pub additional_pests: Option<Vec<String>>,
    pub home_size_range: Option<String>,
    pub yard_size_range: Option<String>,
}

impl UpdateQuoteRequest {
    pub fn into_update(self) -> QuoteUpdate {
        QuoteUpdate {
            quote_status: self.quote_status,
            valid_until: self.valid_until,
            primary_pest: normalize_text(self.primary_pest),
            additional_pests: self.additional_pests.map(|pests| {
                pests
                    .into_iter()
                    .filter_map(|pest| normalize_text(Some(pest)))
                    .collect()
            }),
            home_size_range: normalize_text(self.home_size_range),
            yard_size_range: normalize_text(self.yard_size_range),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub success: bool,
    pub data: Option<Quote>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLinkResponse {
    pub quote_id: Uuid,
    pub quote_url: String,
    pub quote_token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl From<ShareLink> for ShareLinkResponse {
    fn from(link: ShareLink) -> Self {
        Self {
            quote_id: link.quote_id,
            quote_url: link.quote_url,
            quote_token: link.quote_token,
            token_expires_at: link.token_expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuoteQuery {
    pub company_slug: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteQuoteResponse {
    pub success: bool,
    pub message: String,
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_keeps_plans_before_add_ons() {
        let plan_id = Uuid::new_v4();
        let addon_id = Uuid::new_v4();
        let request: PriceQuoteRequest = serde_json::from_value(json!({
            "add_ons": [{ "addon_id": addon_id, "discount_amount": "5" }],
            "service_plans": [{
                "service_plan_id": plan_id,
                "discount_percentage": "10",
                "service_frequency": "  "
            }]
        }))
        .unwrap();

        let lines = request.into_line_requests();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].target, LineItemTarget::ServicePlan(plan_id));
        assert_eq!(lines[0].service_frequency, None);
        assert_eq!(lines[1].target, LineItemTarget::AddOn(addon_id));
        assert_eq!(
            lines[1].discount,
            DiscountSource::from_request(None, Some(dec!(5)), None)
        );
    }

    #[test]
    fn update_request_ignores_blank_fields() {
        let request: UpdateQuoteRequest = serde_json::from_value(json!({
            "quote_status": "sent",
            "home_size_range": " 2001-2500 ",
            "yard_size_range": "",
            "additional_pests": ["ants", " "]
        }))
        .unwrap();

        let update = request.into_update();

        assert_eq!(update.quote_status, Some(QuoteStatus::Sent));
        assert_eq!(update.home_size_range.as_deref(), Some("2001-2500"));
        assert_eq!(update.yard_size_range, None);
        assert_eq!(update.additional_pests, Some(vec!["ants".to_string()]));
        assert!(update.changes_size());
    }

    #[test]
    fn missing_plan_list_deserializes_empty() {
        let request: PriceQuoteRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.into_line_requests().is_empty());
    }
}
