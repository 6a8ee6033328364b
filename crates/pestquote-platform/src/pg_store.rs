use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pestquote_core::{
    AddOnService, AppliesTo, CatalogStore, CompanyPricingSettings, CreateOutcome, DiscountConfig,
    DiscountType, Lead, LeadStore, NewLineItem, NewQuote, Quote, QuoteDraft, QuoteLineItem,
    QuoteStatus, QuoteStore, ServicePlan, SizePricing,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::warn;
use uuid::Uuid;

const QUOTE_COLUMNS: &str = r#"
    id, lead_id, company_id, customer_id, service_address_id, primary_pest,
    COALESCE(additional_pests, '{}') AS additional_pests, home_size_range, yard_size_range,
    total_initial_price, total_recurring_price, quote_status, valid_until, quote_token,
    quote_url, token_expires_at, created_at, updated_at
"#;

/// Quote engine storage over the CRM's Postgres schema.
#[derive(Clone)]
pub struct PgQuoteStore {
    pool: PgPool,
}

impl PgQuoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn line_items(&self, quote_id: Uuid) -> Result<Vec<QuoteLineItem>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, quote_id, service_plan_id, addon_id, item_name, item_description,
                initial_price, recurring_price, discount_id, discount_percentage,
                discount_amount, applies_to_price, final_initial_price, final_recurring_price,
                billing_frequency, service_frequency, display_order
            FROM quote_line_items
            WHERE quote_id = $1
            ORDER BY display_order, id
            "#,
        )
        .bind(quote_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(line_item_from_row).collect()
    }

    async fn with_line_items(&self, row: Option<PgRow>) -> Result<Option<Quote>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let mut quote = quote_from_row(&row)?;
        quote.line_items = self.line_items(quote.id).await?;
        Ok(Some(quote))
    }
}

#[async_trait]
impl CatalogStore for PgQuoteStore {
    async fn service_plans(&self, ids: &[Uuid]) -> Result<Vec<ServicePlan>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, company_id, plan_name, plan_description, initial_price, recurring_price,
                billing_frequency, home_size_pricing, yard_size_pricing
            FROM service_plans
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ServicePlan {
                    id: row.try_get("id")?,
                    company_id: row.try_get("company_id")?,
                    plan_name: row.try_get("plan_name")?,
                    plan_description: row.try_get("plan_description")?,
                    initial_price: row.try_get("initial_price")?,
                    recurring_price: row.try_get("recurring_price")?,
                    billing_frequency: row.try_get("billing_frequency")?,
                    home_size_pricing: size_pricing(row, "home_size_pricing")?,
                    yard_size_pricing: size_pricing(row, "yard_size_pricing")?,
                })
            })
            .collect()
    }

    async fn add_ons(&self, ids: &[Uuid]) -> Result<Vec<AddOnService>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, company_id, addon_name, addon_description, initial_price, recurring_price,
                billing_frequency
            FROM add_on_services
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AddOnService {
                    id: row.try_get("id")?,
                    company_id: row.try_get("company_id")?,
                    addon_name: row.try_get("addon_name")?,
                    addon_description: row.try_get("addon_description")?,
                    initial_price: row.try_get("initial_price")?,
                    recurring_price: row.try_get("recurring_price")?,
                    billing_frequency: row.try_get("billing_frequency")?,
                })
            })
            .collect()
    }

    async fn discounts(&self, ids: &[Uuid]) -> Result<Vec<DiscountConfig>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, company_id, discount_name, discount_type, discount_value,
                applies_to_price, is_active
            FROM company_discounts
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut discounts = Vec::with_capacity(rows.len());
        for row in &rows {
            match discount_from_row(row) {
                Ok(discount) => discounts.push(discount),
                Err(err) => warn!("skipping unreadable discount row: {err:#}"),
            }
        }
        Ok(discounts)
    }

    async fn pricing_settings(&self, company_id: Uuid) -> Result<Option<CompanyPricingSettings>> {
        let row = sqlx::query(
            r#"
            SELECT
                company_id, base_home_sq_ft, home_sq_ft_interval, max_home_sq_ft,
                base_yard_acres, yard_acres_interval, max_yard_acres
            FROM company_pricing_settings
            WHERE company_id = $1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CompanyPricingSettings {
            company_id: row.try_get("company_id")?,
            base_home_sq_ft: row.try_get("base_home_sq_ft")?,
            home_sq_ft_interval: row.try_get("home_sq_ft_interval")?,
            max_home_sq_ft: row.try_get("max_home_sq_ft")?,
            base_yard_acres: row.try_get("base_yard_acres")?,
            yard_acres_interval: row.try_get("yard_acres_interval")?,
            max_yard_acres: row.try_get("max_yard_acres")?,
        }))
    }
}

#[async_trait]
impl LeadStore for PgQuoteStore {
    async fn lead(&self, lead_id: Uuid) -> Result<Option<Lead>> {
        let row = sqlx::query(
            r#"
            SELECT
                l.id,
                l.company_id,
                c.slug AS company_slug,
                l.customer_id,
                l.service_address_id,
                l.lead_status,
                l.pest_type,
                COALESCE(l.additional_pests, '{}') AS additional_pests,
                sa.home_size_range,
                sa.yard_size_range
            FROM leads l
            INNER JOIN companies c ON c.id = l.company_id
            LEFT JOIN service_addresses sa ON sa.id = l.service_address_id
            WHERE l.id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Lead {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            company_slug: row.try_get("company_slug")?,
            customer_id: row.try_get("customer_id")?,
            service_address_id: row.try_get("service_address_id")?,
            lead_status: row.try_get("lead_status")?,
            pest_type: row.try_get("pest_type")?,
            additional_pests: row.try_get("additional_pests")?,
            home_size_range: row.try_get("home_size_range")?,
            yard_size_range: row.try_get("yard_size_range")?,
        }))
    }

    async fn sync_address_sizes(
        &self,
        service_address_id: Uuid,
        home_size_range: Option<&str>,
        yard_size_range: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE service_addresses
            SET home_size_range = COALESCE($2, home_size_range),
                yard_size_range = COALESCE($3, yard_size_range)
            WHERE id = $1
            "#,
        )
        .bind(service_address_id)
        .bind(home_size_range)
        .bind(yard_size_range)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl QuoteStore for PgQuoteStore {
    async fn quote_for_lead(&self, lead_id: Uuid) -> Result<Option<Quote>> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE lead_id = $1"))
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_line_items(row).await
    }

    async fn quote(&self, quote_id: Uuid) -> Result<Option<Quote>> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1"))
            .bind(quote_id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_line_items(row).await
    }

    async fn create_quote(&self, quote: NewQuote) -> Result<CreateOutcome> {
        let draft = &quote.draft;
        let inserted = sqlx::query(
            r#"
            INSERT INTO quotes (
                id, lead_id, company_id, customer_id, service_address_id, primary_pest,
                additional_pests, home_size_range, yard_size_range, total_initial_price,
                total_recurring_price, quote_status, quote_token, quote_url, token_expires_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            ON CONFLICT (lead_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(quote.id)
        .bind(draft.lead_id)
        .bind(draft.company_id)
        .bind(draft.customer_id)
        .bind(draft.service_address_id)
        .bind(draft.primary_pest.as_deref())
        .bind(&draft.additional_pests)
        .bind(draft.home_size_range.as_deref())
        .bind(draft.yard_size_range.as_deref())
        .bind(draft.total_initial_price)
        .bind(draft.total_recurring_price)
        .bind(QuoteStatus::Draft.as_str())
        .bind(&quote.quote_token)
        .bind(&quote.quote_url)
        .bind(quote.token_expires_at)
        .bind(quote.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(CreateOutcome::Created(quote.into_quote()));
        }

        let lead_id = draft.lead_id;
        let existing = self
            .quote_for_lead(lead_id)
            .await?
            .with_context(|| format!("quote for lead {lead_id} conflicted but was not found"))?;
        Ok(CreateOutcome::AlreadyExists(existing))
    }

    async fn update_quote(
        &self,
        quote_id: Uuid,
        draft: &QuoteDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<Quote> {
        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET primary_pest = $2,
                additional_pests = $3,
                home_size_range = $4,
                yard_size_range = $5,
                total_initial_price = $6,
                total_recurring_price = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(quote_id)
        .bind(draft.primary_pest.as_deref())
        .bind(&draft.additional_pests)
        .bind(draft.home_size_range.as_deref())
        .bind(draft.yard_size_range.as_deref())
        .bind(draft.total_initial_price)
        .bind(draft.total_recurring_price)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("quote {quote_id} not found");
        }

        self.quote(quote_id)
            .await?
            .with_context(|| format!("quote {quote_id} vanished during update"))
    }

    async fn update_terms(
        &self,
        quote_id: Uuid,
        quote_status: QuoteStatus,
        valid_until: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET quote_status = $2, valid_until = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(quote_id)
        .bind(quote_status.as_str())
        .bind(valid_until)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("quote {quote_id} not found");
        }

        Ok(())
    }

    async fn replace_line_items(
        &self,
        quote_id: Uuid,
        items: Vec<NewLineItem>,
    ) -> Result<Vec<QuoteLineItem>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM quote_line_items WHERE quote_id = $1")
            .bind(quote_id)
            .execute(&mut *tx)
            .await?;

        let mut written = Vec::with_capacity(items.len());
        for item in items {
            let item = item.into_line_item(Uuid::new_v4(), quote_id);
            sqlx::query(
                r#"
                INSERT INTO quote_line_items (
                    id, quote_id, service_plan_id, addon_id, item_name, item_description,
                    initial_price, recurring_price, discount_id, discount_percentage,
                    discount_amount, applies_to_price, final_initial_price,
                    final_recurring_price, billing_frequency, service_frequency, display_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(item.id)
            .bind(item.quote_id)
            .bind(item.service_plan_id)
            .bind(item.addon_id)
            .bind(&item.item_name)
            .bind(item.item_description.as_deref())
            .bind(item.initial_price)
            .bind(item.recurring_price)
            .bind(item.discount_id)
            .bind(item.discount_percentage)
            .bind(item.discount_amount)
            .bind(item.applies_to_price.as_str())
            .bind(item.final_initial_price)
            .bind(item.final_recurring_price)
            .bind(item.billing_frequency.as_deref())
            .bind(item.service_frequency.as_deref())
            .bind(item.display_order)
            .execute(&mut *tx)
            .await?;
            written.push(item);
        }

        tx.commit().await?;
        written.sort_by_key(|item| item.display_order);

        Ok(written)
    }

    async fn set_share_link(
        &self,
        quote_id: Uuid,
        token: &str,
        url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET quote_token = $2, quote_url = $3, token_expires_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(quote_id)
        .bind(token)
        .bind(url)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("quote {quote_id} not found");
        }

        Ok(())
    }

    async fn delete_quote(&self, quote_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM quotes WHERE id = $1")
            .bind(quote_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn quote_from_row(row: &PgRow) -> Result<Quote> {
    let status: String = row.try_get("quote_status")?;
    let quote_status = QuoteStatus::parse(&status)
        .with_context(|| format!("unknown quote status {status}"))?;

    Ok(Quote {
        id: row.try_get("id")?,
        lead_id: row.try_get("lead_id")?,
        company_id: row.try_get("company_id")?,
        customer_id: row.try_get("customer_id")?,
        service_address_id: row.try_get("service_address_id")?,
        primary_pest: row.try_get("primary_pest")?,
        additional_pests: row.try_get("additional_pests")?,
        home_size_range: row.try_get("home_size_range")?,
        yard_size_range: row.try_get("yard_size_range")?,
        total_initial_price: row.try_get("total_initial_price")?,
        total_recurring_price: row.try_get("total_recurring_price")?,
        quote_status,
        valid_until: row.try_get("valid_until")?,
        quote_token: row.try_get("quote_token")?,
        quote_url: row.try_get("quote_url")?,
        token_expires_at: row.try_get("token_expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        line_items: Vec::new(),
    })
}

fn line_item_from_row(row: &PgRow) -> Result<QuoteLineItem> {
    let applies_to: String = row.try_get("applies_to_price")?;

    Ok(QuoteLineItem {
        id: row.try_get("id")?,
        quote_id: row.try_get("quote_id")?,
        service_plan_id: row.try_get("service_plan_id")?,
        addon_id: row.try_get("addon_id")?,
        item_name: row.try_get("item_name")?,
        item_description: row.try_get("item_description")?,
        initial_price: row.try_get("initial_price")?,
        recurring_price: row.try_get("recurring_price")?,
        discount_id: row.try_get("discount_id")?,
        discount_percentage: row.try_get("discount_percentage")?,
        discount_amount: row.try_get("discount_amount")?,
        applies_to_price: AppliesTo::parse(&applies_to).unwrap_or_default(),
        final_initial_price: row.try_get("final_initial_price")?,
        final_recurring_price: row.try_get("final_recurring_price")?,
        billing_frequency: row.try_get("billing_frequency")?,
        service_frequency: row.try_get("service_frequency")?,
        display_order: row.try_get("display_order")?,
    })
}

fn discount_from_row(row: &PgRow) -> Result<DiscountConfig> {
    let discount_type: String = row.try_get("discount_type")?;
    let applies_to: String = row.try_get("applies_to_price")?;

    Ok(DiscountConfig {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        discount_name: row.try_get("discount_name")?,
        discount_type: DiscountType::parse(&discount_type)
            .with_context(|| format!("unknown discount_type {discount_type}"))?,
        discount_value: row.try_get("discount_value")?,
        applies_to_price: AppliesTo::parse(&applies_to)
            .with_context(|| format!("unknown applies_to_price {applies_to}"))?,
        is_active: row.try_get("is_active")?,
    })
}

fn size_pricing(row: &PgRow, column: &str) -> Result<Option<SizePricing>> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    value
        .filter(|value| !value.is_null())
        .map(|value| {
            serde_json::from_value(value)
                .with_context(|| format!("{column} is not a valid size pricing object"))
        })
        .transpose()
}
