pub mod config;
pub mod contracts;
pub mod db;
pub mod pg_store;
pub mod redis_bus;

pub use config::ServiceConfig;
pub use contracts::{
    AddOnSelection, DeleteQuoteResponse, PriceQuoteRequest, PublicQuoteQuery, QuoteResponse,
    ServicePlanSelection, ShareLinkResponse, UpdateQuoteRequest,
};
pub use db::{apply_schema, connect_database};
pub use pg_store::PgQuoteStore;
pub use redis_bus::RedisBus;
