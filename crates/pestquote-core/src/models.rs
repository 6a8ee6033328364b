use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LEAD_STATUS_QUOTED: &str = "quoted";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
    Completed,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    #[serde(alias = "fixed")]
    FixedAmount,
}

impl DiscountType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "percentage" => Some(Self::Percentage),
            "fixed_amount" | "fixed" => Some(Self::FixedAmount),
            _ => None,
        }
    }
}

/// Which price components a discount reduces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    Initial,
    Recurring,
    #[default]
    Both,
}

impl AppliesTo {
    pub fn covers_initial(self) -> bool {
        matches!(self, Self::Initial | Self::Both)
    }

    pub fn covers_recurring(self) -> bool {
        matches!(self, Self::Recurring | Self::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Recurring => "recurring",
            Self::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "initial" => Some(Self::Initial),
            "recurring" => Some(Self::Recurring),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizePricing {
    pub initial_cost_per_interval: Decimal,
    pub recurring_cost_per_interval: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePlan {
    pub id: Uuid,
    pub company_id: Uuid,
    pub plan_name: String,
    pub plan_description: Option<String>,
    pub initial_price: Option<Decimal>,
    pub recurring_price: Option<Decimal>,
    pub billing_frequency: Option<String>,
    pub home_size_pricing: Option<SizePricing>,
    pub yard_size_pricing: Option<SizePricing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOnService {
    pub id: Uuid,
    pub company_id: Uuid,
    pub addon_name: String,
    pub addon_description: Option<String>,
    pub initial_price: Option<Decimal>,
    pub recurring_price: Option<Decimal>,
    pub billing_frequency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountConfig {
    pub id: Uuid,
    pub company_id: Uuid,
    pub discount_name: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub applies_to_price: AppliesTo,
    pub is_active: bool,
}

/// Company-wide size interval settings used for size-adjusted plan pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyPricingSettings {
    pub company_id: Uuid,
    pub base_home_sq_ft: i32,
    pub home_sq_ft_interval: i32,
    pub max_home_sq_ft: i32,
    pub base_yard_acres: Decimal,
    pub yard_acres_interval: Decimal,
    pub max_yard_acres: Decimal,
}

/// A lead joined with its primary service address and company slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub company_id: Uuid,
    pub company_slug: String,
    pub customer_id: Option<Uuid>,
    pub service_address_id: Option<Uuid>,
    pub lead_status: String,
    pub pest_type: Option<String>,
    pub additional_pests: Vec<String>,
    pub home_size_range: Option<String>,
    pub yard_size_range: Option<String>,
}

impl Lead {
    pub fn is_quoted(&self) -> bool {
        self.lead_status.eq_ignore_ascii_case(LEAD_STATUS_QUOTED)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub service_address_id: Option<Uuid>,
    pub primary_pest: Option<String>,
    pub additional_pests: Vec<String>,
    pub home_size_range: Option<String>,
    pub yard_size_range: Option<String>,
    pub total_initial_price: Decimal,
    pub total_recurring_price: Decimal,
    pub quote_status: QuoteStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub quote_token: Option<String>,
    pub quote_url: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub line_items: Vec<QuoteLineItem>,
}

impl Quote {
    /// Header fields as they stand, with new totals.
    pub fn draft_with_totals(
        &self,
        total_initial_price: Decimal,
        total_recurring_price: Decimal,
    ) -> QuoteDraft {
        QuoteDraft {
            lead_id: self.lead_id,
            company_id: self.company_id,
            customer_id: self.customer_id,
            service_address_id: self.service_address_id,
            primary_pest: self.primary_pest.clone(),
            additional_pests: self.additional_pests.clone(),
            home_size_range: self.home_size_range.clone(),
            yard_size_range: self.yard_size_range.clone(),
            total_initial_price,
            total_recurring_price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteLineItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub service_plan_id: Option<Uuid>,
    pub addon_id: Option<Uuid>,
    pub item_name: String,
    pub item_description: Option<String>,
    pub initial_price: Decimal,
    pub recurring_price: Decimal,
    pub discount_id: Option<Uuid>,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub applies_to_price: AppliesTo,
    pub final_initial_price: Decimal,
    pub final_recurring_price: Decimal,
    pub billing_frequency: Option<String>,
    pub service_frequency: Option<String>,
    pub display_order: i32,
}

impl QuoteLineItem {
    pub fn target(&self) -> Option<LineItemTarget> {
        self.service_plan_id
            .map(LineItemTarget::ServicePlan)
            .or(self.addon_id.map(LineItemTarget::AddOn))
    }

    pub fn to_new_line_item(&self, target: LineItemTarget) -> NewLineItem {
        NewLineItem {
            target,
            item_name: self.item_name.clone(),
            item_description: self.item_description.clone(),
            initial_price: self.initial_price,
            recurring_price: self.recurring_price,
            discount_id: self.discount_id,
            discount_percentage: self.discount_percentage,
            discount_amount: self.discount_amount,
            applies_to_price: self.applies_to_price,
            final_initial_price: self.final_initial_price,
            final_recurring_price: self.final_recurring_price,
            billing_frequency: self.billing_frequency.clone(),
            service_frequency: self.service_frequency.clone(),
            display_order: self.display_order,
        }
    }
}

/// The catalog entity a line item prices. Plans and add-ons are mutually exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LineItemTarget {
    ServicePlan(Uuid),
    AddOn(Uuid),
}

impl LineItemTarget {
    pub fn service_plan_id(self) -> Option<Uuid> {
        match self {
            Self::ServicePlan(id) => Some(id),
            Self::AddOn(_) => None,
        }
    }

    pub fn addon_id(self) -> Option<Uuid> {
        match self {
            Self::AddOn(id) => Some(id),
            Self::ServicePlan(_) => None,
        }
    }
}

/// A priced line ready to be written under a quote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLineItem {
    pub target: LineItemTarget,
    pub item_name: String,
    pub item_description: Option<String>,
    pub initial_price: Decimal,
    pub recurring_price: Decimal,
    pub discount_id: Option<Uuid>,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub applies_to_price: AppliesTo,
    pub final_initial_price: Decimal,
    pub final_recurring_price: Decimal,
    pub billing_frequency: Option<String>,
    pub service_frequency: Option<String>,
    pub display_order: i32,
}

impl NewLineItem {
    pub fn into_line_item(self, id: Uuid, quote_id: Uuid) -> QuoteLineItem {
        QuoteLineItem {
            id,
            quote_id,
            service_plan_id: self.target.service_plan_id(),
            addon_id: self.target.addon_id(),
            item_name: self.item_name,
            item_description: self.item_description,
            initial_price: self.initial_price,
            recurring_price: self.recurring_price,
            discount_id: self.discount_id,
            discount_percentage: self.discount_percentage,
            discount_amount: self.discount_amount,
            applies_to_price: self.applies_to_price,
            final_initial_price: self.final_initial_price,
            final_recurring_price: self.final_recurring_price,
            billing_frequency: self.billing_frequency,
            service_frequency: self.service_frequency,
            display_order: self.display_order,
        }
    }
}

/// Quote-level fields overwritten on every pricing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteDraft {
    pub lead_id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub service_address_id: Option<Uuid>,
    pub primary_pest: Option<String>,
    pub additional_pests: Vec<String>,
    pub home_size_range: Option<String>,
    pub yard_size_range: Option<String>,
    pub total_initial_price: Decimal,
    pub total_recurring_price: Decimal,
}

/// Edits to an existing quote. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteUpdate {
    pub quote_status: Option<QuoteStatus>,
    pub valid_until: Option<DateTime<Utc>>,
    pub primary_pest: Option<String>,
    pub additional_pests: Option<Vec<String>>,
    pub home_size_range: Option<String>,
    pub yard_size_range: Option<String>,
}

impl QuoteUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn changes_size(&self) -> bool {
        self.home_size_range.is_some() || self.yard_size_range.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewQuote {
    pub id: Uuid,
    pub draft: QuoteDraft,
    pub quote_token: String,
    pub quote_url: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewQuote {
    pub fn into_quote(self) -> Quote {
        let draft = self.draft;
        Quote {
            id: self.id,
            lead_id: draft.lead_id,
            company_id: draft.company_id,
            customer_id: draft.customer_id,
            service_address_id: draft.service_address_id,
            primary_pest: draft.primary_pest,
            additional_pests: draft.additional_pests,
            home_size_range: draft.home_size_range,
            yard_size_range: draft.yard_size_range,
            total_initial_price: draft.total_initial_price,
            total_recurring_price: draft.total_recurring_price,
            quote_status: QuoteStatus::Draft,
            valid_until: None,
            quote_token: Some(self.quote_token),
            quote_url: Some(self.quote_url),
            token_expires_at: self.token_expires_at,
            created_at: self.created_at,
            updated_at: self.created_at,
            line_items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_enum_strings_parse_back() {
        assert_eq!(DiscountType::parse("fixed"), Some(DiscountType::FixedAmount));
        assert_eq!(DiscountType::parse(" Percentage "), Some(DiscountType::Percentage));
        assert_eq!(AppliesTo::parse("RECURRING"), Some(AppliesTo::Recurring));
        assert_eq!(AppliesTo::parse("monthly"), None);
        assert_eq!(QuoteStatus::parse(QuoteStatus::Sent.as_str()), Some(QuoteStatus::Sent));
    }

    #[test]
    fn line_item_target_fills_exactly_one_reference() {
        let id = Uuid::new_v4();
        assert_eq!(LineItemTarget::AddOn(id).addon_id(), Some(id));
        assert_eq!(LineItemTarget::AddOn(id).service_plan_id(), None);
        assert_eq!(LineItemTarget::ServicePlan(id).service_plan_id(), Some(id));
    }
}
