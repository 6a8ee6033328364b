use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use pestquote_core::{
    CatalogStore, CompanyPricingSettings, CreateOutcome, Lead, LeadStore, LineItemTarget,
    NewLineItem, NewQuote, Quote, QuoteDraft, QuoteError, QuoteEvent, QuoteEventKind,
    QuoteEventPublisher, QuoteStore, QuoteUpdate, ServicePlan,
};
use pestquote_pricing::{
    DiscountSource, LineRequest, QuoteTotals, draft_from_lead, price_add_on, price_plan,
    reprice_plan_line, resolve_discount, size_adjustment,
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    catalog::{ResolvedCatalog, resolve_catalog},
    links::{
        ShareLink, existing_link, generate_quote_token, quote_path, verify_public_access,
    },
    locks::LeadLocks,
};

#[derive(Debug, Clone, Default)]
pub struct QuoteSettings {
    /// Lifetime of newly issued share links. `None` means links never expire.
    pub token_ttl: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAction {
    Created,
    Updated,
}

impl QuoteAction {
    pub fn message(self) -> &'static str {
        match self {
            Self::Created => "Quote created successfully",
            Self::Updated => "Quote updated successfully",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricedQuote {
    pub quote: Quote,
    pub action: QuoteAction,
}

#[derive(Debug, Clone)]
pub enum LeadQuote {
    Existing(Quote),
    AutoProvisioned(Quote),
    /// The lead has no quote and is not in `quoted` status yet, or does not
    /// exist.
    NotQuoted,
}

/// Prices quotes and keeps exactly one quote per lead.
pub struct QuoteService<TStore, TEvents> {
    store: Arc<TStore>,
    events: Arc<TEvents>,
    locks: LeadLocks,
    settings: QuoteSettings,
}

impl<TStore, TEvents> Clone for QuoteService<TStore, TEvents> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            locks: self.locks.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<TStore, TEvents> QuoteService<TStore, TEvents>
where
    TStore: CatalogStore + LeadStore + QuoteStore,
    TEvents: QuoteEventPublisher,
{
    pub fn new(store: Arc<TStore>, events: Arc<TEvents>, settings: QuoteSettings) -> Self {
        Self {
            store,
            events,
            locks: LeadLocks::default(),
            settings,
        }
    }

    /// Prices `lines` for a lead and creates or replaces the lead's quote.
    ///
    /// Line items are replaced wholesale. If that write fails after the quote
    /// row was written, the quote row is kept and `PartialFailure` is returned.
    pub async fn price_quote(
        &self,
        lead_id: Uuid,
        lines: Vec<LineRequest>,
    ) -> Result<PricedQuote, QuoteError> {
        validate_lines(&lines)?;

        let _guard = self.locks.acquire(lead_id).await;

        let lead = self.load_lead(lead_id).await?;
        let catalog = resolve_catalog(self.store.as_ref(), lead.company_id, &lines).await?;
        let settings = self.pricing_settings(&lead, &catalog).await?;
        let items = price_lines(&lead, &catalog, settings.as_ref(), &lines)?;
        let draft = draft_from_lead(&lead, QuoteTotals::from_lines(&items));
        let now = Utc::now();

        let (mut quote, action) = self.write_quote_header(&lead, draft, now).await?;

        quote.line_items = self
            .store
            .replace_line_items(quote.id, items)
            .await
            .map_err(QuoteError::partial(lead_id, quote.id, "write line items"))?;

        self.ensure_share_link(&mut quote, &lead.company_slug)
            .await
            .map_err(QuoteError::partial(lead_id, quote.id, "issue share link"))?;

        info!(
            "quote {} {} for lead {} ({} items, initial {}, recurring {})",
            quote.id,
            match action {
                QuoteAction::Created => "created",
                QuoteAction::Updated => "updated",
            },
            lead_id,
            quote.line_items.len(),
            quote.total_initial_price,
            quote.total_recurring_price
        );

        let kind = match action {
            QuoteAction::Created => QuoteEventKind::Created,
            QuoteAction::Updated => QuoteEventKind::Updated,
        };
        self.publish(&quote, kind).await;

        Ok(PricedQuote { quote, action })
    }

    /// The lead's quote, materializing an empty draft for leads already
    /// marked `quoted` that never had one.
    pub async fn quote_for_lead(&self, lead_id: Uuid) -> Result<LeadQuote, QuoteError> {
        let _guard = self.locks.acquire(lead_id).await;

        if let Some(quote) = self
            .store
            .quote_for_lead(lead_id)
            .await
            .map_err(QuoteError::unavailable("load quote"))?
        {
            return Ok(LeadQuote::Existing(quote));
        }

        let lead = self
            .store
            .lead(lead_id)
            .await
            .map_err(QuoteError::unavailable("load lead"))?;
        let Some(lead) = lead.filter(Lead::is_quoted) else {
            return Ok(LeadQuote::NotQuoted);
        };

        let draft = draft_from_lead(&lead, QuoteTotals::default());
        let new_quote = self.new_quote(&lead, draft, Utc::now());
        match self
            .store
            .create_quote(new_quote)
            .await
            .map_err(QuoteError::unavailable("create quote"))?
        {
            CreateOutcome::Created(quote) => {
                info!("auto-provisioned draft quote {} for lead {}", quote.id, lead_id);
                self.publish(&quote, QuoteEventKind::AutoProvisioned).await;
                Ok(LeadQuote::AutoProvisioned(quote))
            }
            CreateOutcome::AlreadyExists(quote) => Ok(LeadQuote::Existing(quote)),
        }
    }

    /// Returns the quote's share link, issuing one only if it has none.
    pub async fn issue_share_link(&self, quote_id: Uuid) -> Result<ShareLink, QuoteError> {
        let quote = self.load_quote(quote_id).await?;
        let _guard = self.locks.acquire(quote.lead_id).await;

        let mut quote = self.load_quote(quote_id).await?;
        if let Some(link) = existing_link(&quote) {
            return Ok(link);
        }

        let lead = self.load_lead(quote.lead_id).await?;
        let link = self
            .ensure_share_link(&mut quote, &lead.company_slug)
            .await
            .map_err(QuoteError::unavailable("issue share link"))?;
        info!("share link issued for quote {}", quote_id);

        Ok(link)
    }

    /// Edits status, validity, pest data or size ranges of an existing quote.
    ///
    /// A size range change re-prices every plan line at the new size with the
    /// discount it already carries, and rewrites the totals. The new ranges are
    /// copied back to the service address on a best-effort basis.
    pub async fn update_quote(
        &self,
        quote_id: Uuid,
        update: QuoteUpdate,
    ) -> Result<Quote, QuoteError> {
        let lead_id = self.load_quote(quote_id).await?.lead_id;
        let _guard = self.locks.acquire(lead_id).await;

        let mut quote = self.load_quote(quote_id).await?;
        if update.is_empty() {
            return Ok(quote);
        }

        let now = Utc::now();
        if update.quote_status.is_some() || update.valid_until.is_some() {
            let quote_status = update.quote_status.unwrap_or(quote.quote_status);
            let valid_until = update.valid_until.or(quote.valid_until);
            self.store
                .update_terms(quote_id, quote_status, valid_until, now)
                .await
                .map_err(QuoteError::unavailable("update quote terms"))?;
        }

        if let Some(primary_pest) = &update.primary_pest {
            quote.primary_pest = Some(primary_pest.clone());
        }
        if let Some(additional_pests) = &update.additional_pests {
            quote.additional_pests = additional_pests.clone();
        }
        if let Some(range) = &update.home_size_range {
            quote.home_size_range = Some(range.clone());
        }
        if let Some(range) = &update.yard_size_range {
            quote.yard_size_range = Some(range.clone());
        }

        let repriced = if update.changes_size() {
            self.reprice_line_items(&quote).await?
        } else {
            None
        };
        let totals = match &repriced {
            Some(items) => QuoteTotals::from_lines(items),
            None => QuoteTotals {
                total_initial_price: quote.total_initial_price,
                total_recurring_price: quote.total_recurring_price,
            },
        };
        let draft = quote.draft_with_totals(totals.total_initial_price, totals.total_recurring_price);

        let mut updated = self
            .store
            .update_quote(quote_id, &draft, now)
            .await
            .map_err(QuoteError::unavailable("update quote"))?;

        if let Some(items) = repriced {
            updated.line_items = self
                .store
                .replace_line_items(quote_id, items)
                .await
                .map_err(QuoteError::partial(lead_id, quote_id, "write line items"))?;
        }

        if let (true, Some(address_id)) = (update.changes_size(), quote.service_address_id) {
            if let Err(err) = self
                .store
                .sync_address_sizes(
                    address_id,
                    update.home_size_range.as_deref(),
                    update.yard_size_range.as_deref(),
                )
                .await
            {
                warn!("failed to sync size ranges to service address {address_id}: {err:#}");
            }
        }

        info!(
            "quote {} edited for lead {} (initial {}, recurring {})",
            quote_id, lead_id, updated.total_initial_price, updated.total_recurring_price
        );
        self.publish(&updated, QuoteEventKind::Updated).await;

        Ok(updated)
    }

    pub async fn quote(&self, quote_id: Uuid) -> Result<Quote, QuoteError> {
        self.load_quote(quote_id).await
    }

    /// Quote as seen through a shared link. Requires the link's token.
    pub async fn public_quote(
        &self,
        quote_id: Uuid,
        company_slug: &str,
        token: &str,
    ) -> Result<Quote, QuoteError> {
        let quote = self.load_quote(quote_id).await?;
        verify_public_access(&quote, company_slug, token, Utc::now())?;
        Ok(quote)
    }

    pub async fn delete_quote(&self, quote_id: Uuid) -> Result<(), QuoteError> {
        let quote = self.load_quote(quote_id).await?;
        let _guard = self.locks.acquire(quote.lead_id).await;

        let deleted = self
            .store
            .delete_quote(quote_id)
            .await
            .map_err(QuoteError::unavailable("delete quote"))?;
        if !deleted {
            return Err(QuoteError::NotFound(format!("quote {quote_id} not found")));
        }

        info!("quote {} deleted for lead {}", quote_id, quote.lead_id);
        self.publish(&quote, QuoteEventKind::Deleted).await;

        Ok(())
    }

    async fn write_quote_header(
        &self,
        lead: &Lead,
        draft: QuoteDraft,
        now: DateTime<Utc>,
    ) -> Result<(Quote, QuoteAction), QuoteError> {
        let existing = self
            .store
            .quote_for_lead(lead.id)
            .await
            .map_err(QuoteError::unavailable("load existing quote"))?;

        let existing = match existing {
            Some(existing) => existing,
            None => {
                let new_quote = self.new_quote(lead, draft.clone(), now);
                match self
                    .store
                    .create_quote(new_quote)
                    .await
                    .map_err(QuoteError::unavailable("create quote"))?
                {
                    CreateOutcome::Created(quote) => return Ok((quote, QuoteAction::Created)),
                    CreateOutcome::AlreadyExists(existing) => {
                        warn!(
                            "quote for lead {} was created concurrently, updating {} instead",
                            lead.id, existing.id
                        );
                        existing
                    }
                }
            }
        };

        let updated = self
            .store
            .update_quote(existing.id, &draft, now)
            .await
            .map_err(QuoteError::unavailable("update quote"))?;

        Ok((updated, QuoteAction::Updated))
    }

    fn new_quote(&self, lead: &Lead, draft: QuoteDraft, now: DateTime<Utc>) -> NewQuote {
        let id = Uuid::new_v4();
        let quote_token = generate_quote_token();
        let quote_url = quote_path(&lead.company_slug, id, &quote_token);

        NewQuote {
            id,
            draft,
            quote_token,
            quote_url,
            token_expires_at: self.settings.token_ttl.map(|ttl| now + ttl),
            created_at: now,
        }
    }

    async fn ensure_share_link(
        &self,
        quote: &mut Quote,
        company_slug: &str,
    ) -> anyhow::Result<ShareLink> {
        if let Some(link) = existing_link(quote) {
            return Ok(link);
        }

        let token = quote
            .quote_token
            .clone()
            .unwrap_or_else(generate_quote_token);
        let url = quote_path(company_slug, quote.id, &token);
        let expires_at = quote
            .token_expires_at
            .or_else(|| self.settings.token_ttl.map(|ttl| Utc::now() + ttl));

        self.store
            .set_share_link(quote.id, &token, &url, expires_at)
            .await?;

        quote.quote_token = Some(token.clone());
        quote.quote_url = Some(url.clone());
        quote.token_expires_at = expires_at;

        Ok(ShareLink {
            quote_id: quote.id,
            quote_url: url,
            quote_token: token,
            token_expires_at: expires_at,
        })
    }

    /// Plan lines priced at the quote's current size ranges. `None` when the
    /// company has no size settings or the quote has no lines, in which case
    /// stored prices stand.
    async fn reprice_line_items(
        &self,
        quote: &Quote,
    ) -> Result<Option<Vec<NewLineItem>>, QuoteError> {
        if quote.line_items.is_empty() {
            return Ok(None);
        }

        let Some(settings) = self
            .store
            .pricing_settings(quote.company_id)
            .await
            .map_err(QuoteError::unavailable("load pricing settings"))?
        else {
            return Ok(None);
        };

        let plan_ids: Vec<Uuid> = quote
            .line_items
            .iter()
            .filter_map(|item| item.service_plan_id)
            .collect();
        let plans: HashMap<Uuid, ServicePlan> = self
            .store
            .service_plans(&plan_ids)
            .await
            .map_err(QuoteError::unavailable("load service plans"))?
            .into_iter()
            .filter(|plan| plan.company_id == quote.company_id)
            .map(|plan| (plan.id, plan))
            .collect();

        let mut items = Vec::with_capacity(quote.line_items.len());
        for item in &quote.line_items {
            let Some(target) = item.target() else {
                warn!("dropping line item {} with no catalog reference", item.id);
                continue;
            };
            let plan = target.service_plan_id().and_then(|id| plans.get(&id));
            items.push(match plan {
                Some(plan) => {
                    let size = size_adjustment(
                        Some(&settings),
                        plan,
                        quote.home_size_range.as_deref(),
                        quote.yard_size_range.as_deref(),
                    );
                    reprice_plan_line(item, plan, size)
                }
                None => item.to_new_line_item(target),
            });
        }

        Ok(Some(items))
    }

    async fn pricing_settings(
        &self,
        lead: &Lead,
        catalog: &ResolvedCatalog,
    ) -> Result<Option<CompanyPricingSettings>, QuoteError> {
        let size_priced = catalog
            .plans
            .values()
            .any(|plan| plan.home_size_pricing.is_some() && plan.yard_size_pricing.is_some());
        if !size_priced {
            return Ok(None);
        }

        self.store
            .pricing_settings(lead.company_id)
            .await
            .map_err(QuoteError::unavailable("load pricing settings"))
    }

    async fn load_lead(&self, lead_id: Uuid) -> Result<Lead, QuoteError> {
        self.store
            .lead(lead_id)
            .await
            .map_err(QuoteError::unavailable("load lead"))?
            .ok_or_else(|| QuoteError::NotFound(format!("lead {lead_id} not found")))
    }

    async fn load_quote(&self, quote_id: Uuid) -> Result<Quote, QuoteError> {
        self.store
            .quote(quote_id)
            .await
            .map_err(QuoteError::unavailable("load quote"))?
            .ok_or_else(|| QuoteError::NotFound(format!("quote {quote_id} not found")))
    }

    async fn publish(&self, quote: &Quote, kind: QuoteEventKind) {
        let event = QuoteEvent::for_quote(quote, kind);
        if let Err(err) = self.events.publish(&event).await {
            warn!("failed to publish {:?} event for quote {}: {err:#}", kind, quote.id);
        }
    }
}

fn validate_lines(lines: &[LineRequest]) -> Result<(), QuoteError> {
    if !lines
        .iter()
        .any(|line| matches!(line.target, LineItemTarget::ServicePlan(_)))
    {
        return Err(QuoteError::InvalidArgument(
            "at least one service plan is required".to_string(),
        ));
    }

    for line in lines {
        let manual = match &line.discount {
            DiscountSource::Catalog { fallback, .. } => fallback,
            DiscountSource::Manual(manual) => manual,
        };
        if manual.amount < Decimal::ZERO || manual.percentage < Decimal::ZERO {
            return Err(QuoteError::InvalidArgument(
                "discount_amount and discount_percentage must not be negative".to_string(),
            ));
        }
    }

    Ok(())
}

fn price_lines(
    lead: &Lead,
    catalog: &ResolvedCatalog,
    settings: Option<&CompanyPricingSettings>,
    lines: &[LineRequest],
) -> Result<Vec<NewLineItem>, QuoteError> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let display_order = i32::try_from(index).map_err(|_| {
                QuoteError::InvalidArgument("too many line items".to_string())
            })?;
            let discount = resolve_discount(&line.discount, &catalog.discounts);

            match line.target {
                LineItemTarget::ServicePlan(id) => {
                    let plan = catalog.plans.get(&id).ok_or_else(|| {
                        QuoteError::NotFound(format!("service plan {id} not found"))
                    })?;
                    let size = size_adjustment(
                        settings,
                        plan,
                        lead.home_size_range.as_deref(),
                        lead.yard_size_range.as_deref(),
                    );
                    Ok(price_plan(plan, line, &discount, size, display_order))
                }
                LineItemTarget::AddOn(id) => {
                    let add_on = catalog.add_ons.get(&id).ok_or_else(|| {
                        QuoteError::NotFound(format!("add-on service {id} not found"))
                    })?;
                    Ok(price_add_on(add_on, line, &discount, display_order))
                }
            }
        })
        .collect()
}
