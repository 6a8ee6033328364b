use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Quote;

pub const QUOTES_PRICED_CHANNEL: &str = "quotes.priced";
pub const QUOTES_PROVISIONED_CHANNEL: &str = "quotes.provisioned";
pub const QUOTES_DELETED_CHANNEL: &str = "quotes.deleted";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEventKind {
    Created,
    Updated,
    AutoProvisioned,
    Deleted,
}

impl QuoteEventKind {
    pub fn channel(self) -> &'static str {
        match self {
            Self::Created | Self::Updated => QUOTES_PRICED_CHANNEL,
            Self::AutoProvisioned => QUOTES_PROVISIONED_CHANNEL,
            Self::Deleted => QUOTES_DELETED_CHANNEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteEvent {
    pub quote_id: Uuid,
    pub lead_id: Uuid,
    pub company_id: Uuid,
    pub kind: QuoteEventKind,
    pub total_initial_price: Decimal,
    pub total_recurring_price: Decimal,
    pub line_item_count: usize,
    pub quote_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl QuoteEvent {
    pub fn for_quote(quote: &Quote, kind: QuoteEventKind) -> Self {
        Self {
            quote_id: quote.id,
            lead_id: quote.lead_id,
            company_id: quote.company_id,
            kind,
            total_initial_price: quote.total_initial_price,
            total_recurring_price: quote.total_recurring_price,
            line_item_count: quote.line_items.len(),
            quote_url: quote.quote_url.clone(),
            occurred_at: Utc::now(),
        }
    }
}

/// Downstream notification sink (email senders, public page cache, ...).
#[async_trait]
pub trait QuoteEventPublisher: Send + Sync {
    async fn publish(&self, event: &QuoteEvent) -> anyhow::Result<()>;
}
