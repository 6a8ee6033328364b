use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AddOnService, CompanyPricingSettings, DiscountConfig, Lead, NewLineItem, NewQuote, Quote,
    QuoteDraft, QuoteLineItem, QuoteStatus, ServicePlan,
};

/// Read-only catalog of plans, add-ons, discounts and size settings.
///
/// Lookups return only the records that exist; callers decide whether a
/// missing id is fatal.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn service_plans(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ServicePlan>>;
    async fn add_ons(&self, ids: &[Uuid]) -> anyhow::Result<Vec<AddOnService>>;
    async fn discounts(&self, ids: &[Uuid]) -> anyhow::Result<Vec<DiscountConfig>>;
    async fn pricing_settings(
        &self,
        company_id: Uuid,
    ) -> anyhow::Result<Option<CompanyPricingSettings>>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn lead(&self, lead_id: Uuid) -> anyhow::Result<Option<Lead>>;

    /// Copies size ranges edited on a quote back to its service address.
    /// `None` leaves that range unchanged.
    async fn sync_address_sizes(
        &self,
        service_address_id: Uuid,
        home_size_range: Option<&str>,
        yard_size_range: Option<&str>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Quote),
    /// Another writer already holds the quote for this lead.
    AlreadyExists(Quote),
}

/// Quote persistence. Implementations must enforce one quote per lead.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Quote for a lead, with line items in display order.
    async fn quote_for_lead(&self, lead_id: Uuid) -> anyhow::Result<Option<Quote>>;

    async fn quote(&self, quote_id: Uuid) -> anyhow::Result<Option<Quote>>;

    async fn create_quote(&self, quote: NewQuote) -> anyhow::Result<CreateOutcome>;

    async fn update_quote(
        &self,
        quote_id: Uuid,
        draft: &QuoteDraft,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<Quote>;

    async fn update_terms(
        &self,
        quote_id: Uuid,
        quote_status: QuoteStatus,
        valid_until: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Deletes every line item of the quote, then inserts `items`.
    async fn replace_line_items(
        &self,
        quote_id: Uuid,
        items: Vec<NewLineItem>,
    ) -> anyhow::Result<Vec<QuoteLineItem>>;

    async fn set_share_link(
        &self,
        quote_id: Uuid,
        token: &str,
        url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;

    async fn delete_quote(&self, quote_id: Uuid) -> anyhow::Result<bool>;
}
