use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pestquote_core::{
    AddOnService, CatalogStore, CompanyPricingSettings, CreateOutcome, DiscountConfig, Lead,
    LeadStore, NewLineItem, NewQuote, Quote, QuoteDraft, QuoteEvent, QuoteEventPublisher,
    QuoteLineItem, QuoteStatus, QuoteStore, ServicePlan,
};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct QuoteTables {
    quotes: HashMap<Uuid, Quote>,
    by_lead: HashMap<Uuid, Uuid>,
    line_items: HashMap<Uuid, Vec<QuoteLineItem>>,
}

impl QuoteTables {
    fn with_items(&self, quote_id: Uuid) -> Option<Quote> {
        let mut quote = self.quotes.get(&quote_id)?.clone();
        quote.line_items = self.line_items.get(&quote_id).cloned().unwrap_or_default();
        Some(quote)
    }
}

/// Catalog, lead and quote tables held in memory.
///
/// Mirrors the Postgres adapter's guarantees, including the one-quote-per-lead
/// constraint, so lifecycle behavior can be exercised without a database.
#[derive(Default)]
pub struct InMemoryQuoteStore {
    plans: RwLock<HashMap<Uuid, ServicePlan>>,
    add_ons: RwLock<HashMap<Uuid, AddOnService>>,
    discounts: RwLock<HashMap<Uuid, DiscountConfig>>,
    settings: RwLock<HashMap<Uuid, CompanyPricingSettings>>,
    leads: RwLock<HashMap<Uuid, Lead>>,
    tables: RwLock<QuoteTables>,
    fail_line_item_writes: AtomicBool,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_plan(&self, plan: ServicePlan) {
        self.plans.write().await.insert(plan.id, plan);
    }

    pub async fn insert_add_on(&self, add_on: AddOnService) {
        self.add_ons.write().await.insert(add_on.id, add_on);
    }

    pub async fn insert_discount(&self, discount: DiscountConfig) {
        self.discounts.write().await.insert(discount.id, discount);
    }

    pub async fn insert_pricing_settings(&self, settings: CompanyPricingSettings) {
        self.settings
            .write()
            .await
            .insert(settings.company_id, settings);
    }

    pub async fn insert_lead(&self, lead: Lead) {
        self.leads.write().await.insert(lead.id, lead);
    }

    pub async fn update_lead<F>(&self, lead_id: Uuid, edit: F)
    where
        F: FnOnce(&mut Lead),
    {
        if let Some(lead) = self.leads.write().await.get_mut(&lead_id) {
            edit(lead);
        }
    }

    /// Makes every following line item write fail, to simulate a store outage
    /// between the quote write and the line item write.
    pub fn fail_line_item_writes(&self, fail: bool) {
        self.fail_line_item_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn quote_count(&self) -> usize {
        self.tables.read().await.quotes.len()
    }

    pub async fn quotes_for_lead(&self, lead_id: Uuid) -> usize {
        self.tables
            .read()
            .await
            .quotes
            .values()
            .filter(|quote| quote.lead_id == lead_id)
            .count()
    }

    pub async fn line_item_count(&self) -> usize {
        self.tables
            .read()
            .await
            .line_items
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl CatalogStore for InMemoryQuoteStore {
    async fn service_plans(&self, ids: &[Uuid]) -> anyhow::Result<Vec<ServicePlan>> {
        let plans = self.plans.read().await;
        Ok(ids.iter().filter_map(|id| plans.get(id).cloned()).collect())
    }

    async fn add_ons(&self, ids: &[Uuid]) -> anyhow::Result<Vec<AddOnService>> {
        let add_ons = self.add_ons.read().await;
        Ok(ids.iter().filter_map(|id| add_ons.get(id).cloned()).collect())
    }

    async fn discounts(&self, ids: &[Uuid]) -> anyhow::Result<Vec<DiscountConfig>> {
        let discounts = self.discounts.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| discounts.get(id).cloned())
            .collect())
    }

    async fn pricing_settings(
        &self,
        company_id: Uuid,
    ) -> anyhow::Result<Option<CompanyPricingSettings>> {
        Ok(self.settings.read().await.get(&company_id).cloned())
    }
}

#[async_trait]
impl LeadStore for InMemoryQuoteStore {
    async fn lead(&self, lead_id: Uuid) -> anyhow::Result<Option<Lead>> {
        Ok(self.leads.read().await.get(&lead_id).cloned())
    }

    async fn sync_address_sizes(
        &self,
        service_address_id: Uuid,
        home_size_range: Option<&str>,
        yard_size_range: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut leads = self.leads.write().await;
        for lead in leads
            .values_mut()
            .filter(|lead| lead.service_address_id == Some(service_address_id))
        {
            if let Some(range) = home_size_range {
                lead.home_size_range = Some(range.to_string());
            }
            if let Some(range) = yard_size_range {
                lead.yard_size_range = Some(range.to_string());
            }
        }

        Ok(())
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn quote_for_lead(&self, lead_id: Uuid) -> anyhow::Result<Option<Quote>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_lead
            .get(&lead_id)
            .and_then(|quote_id| tables.with_items(*quote_id)))
    }

    async fn quote(&self, quote_id: Uuid) -> anyhow::Result<Option<Quote>> {
        Ok(self.tables.read().await.with_items(quote_id))
    }

    async fn create_quote(&self, quote: NewQuote) -> anyhow::Result<CreateOutcome> {
        let mut tables = self.tables.write().await;
        let lead_id = quote.draft.lead_id;

        if let Some(existing_id) = tables.by_lead.get(&lead_id).copied() {
            let existing = tables
                .with_items(existing_id)
                .context("quote index points at a missing quote")?;
            return Ok(CreateOutcome::AlreadyExists(existing));
        }

        let quote = quote.into_quote();
        tables.by_lead.insert(lead_id, quote.id);
        tables.quotes.insert(quote.id, quote.clone());

        Ok(CreateOutcome::Created(quote))
    }

    async fn update_quote(
        &self,
        quote_id: Uuid,
        draft: &QuoteDraft,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<Quote> {
        let mut tables = self.tables.write().await;
        let quote = tables
            .quotes
            .get_mut(&quote_id)
            .with_context(|| format!("quote {quote_id} not found"))?;

        quote.primary_pest = draft.primary_pest.clone();
        quote.additional_pests = draft.additional_pests.clone();
        quote.home_size_range = draft.home_size_range.clone();
        quote.yard_size_range = draft.yard_size_range.clone();
        quote.total_initial_price = draft.total_initial_price;
        quote.total_recurring_price = draft.total_recurring_price;
        quote.updated_at = updated_at;

        tables
            .with_items(quote_id)
            .context("quote vanished during update")
    }

    async fn update_terms(
        &self,
        quote_id: Uuid,
        quote_status: QuoteStatus,
        valid_until: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let quote = tables
            .quotes
            .get_mut(&quote_id)
            .with_context(|| format!("quote {quote_id} not found"))?;

        quote.quote_status = quote_status;
        quote.valid_until = valid_until;
        quote.updated_at = updated_at;

        Ok(())
    }

    async fn replace_line_items(
        &self,
        quote_id: Uuid,
        items: Vec<NewLineItem>,
    ) -> anyhow::Result<Vec<QuoteLineItem>> {
        if self.fail_line_item_writes.load(Ordering::SeqCst) {
            bail!("line item store unavailable");
        }

        let mut tables = self.tables.write().await;
        if !tables.quotes.contains_key(&quote_id) {
            bail!("quote {quote_id} not found");
        }

        let mut written: Vec<QuoteLineItem> = items
            .into_iter()
            .map(|item| item.into_line_item(Uuid::new_v4(), quote_id))
            .collect();
        written.sort_by_key(|item| item.display_order);
        tables.line_items.insert(quote_id, written.clone());

        Ok(written)
    }

    async fn set_share_link(
        &self,
        quote_id: Uuid,
        token: &str,
        url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let quote = tables
            .quotes
            .get_mut(&quote_id)
            .with_context(|| format!("quote {quote_id} not found"))?;

        quote.quote_token = Some(token.to_string());
        quote.quote_url = Some(url.to_string());
        quote.token_expires_at = expires_at;
        quote.updated_at = Utc::now();

        Ok(())
    }

    async fn delete_quote(&self, quote_id: Uuid) -> anyhow::Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(quote) = tables.quotes.remove(&quote_id) else {
            return Ok(false);
        };
        tables.by_lead.remove(&quote.lead_id);
        tables.line_items.remove(&quote_id);

        Ok(true)
    }
}

/// Keeps published quote events for inspection.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<QuoteEvent>>,
}

impl RecordingEventPublisher {
    pub async fn events(&self) -> Vec<QuoteEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl QuoteEventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &QuoteEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
