pub mod error;
pub mod events;
pub mod models;
pub mod storage;

pub use error::QuoteError;
pub use events::{QuoteEvent, QuoteEventKind, QuoteEventPublisher};
pub use models::{
    AddOnService, AppliesTo, CompanyPricingSettings, DiscountConfig, DiscountType, Lead,
    LineItemTarget, NewLineItem, NewQuote, Quote, QuoteDraft, QuoteLineItem, QuoteStatus,
    QuoteUpdate, ServicePlan, SizePricing,
};
pub use storage::{CatalogStore, CreateOutcome, LeadStore, QuoteStore};
