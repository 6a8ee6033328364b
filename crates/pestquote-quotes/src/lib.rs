pub mod catalog;
pub mod links;
pub mod locks;
pub mod service;

pub use catalog::{ResolvedCatalog, resolve_catalog};
pub use links::{ShareLink, generate_quote_token, quote_path, verify_public_access};
pub use locks::LeadLocks;
pub use service::{LeadQuote, PricedQuote, QuoteAction, QuoteService, QuoteSettings};
