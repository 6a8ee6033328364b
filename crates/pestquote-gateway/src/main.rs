use std::{net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use pestquote_core::QuoteError;
use pestquote_platform::{
    DeleteQuoteResponse, PgQuoteStore, PriceQuoteRequest, PublicQuoteQuery, QuoteResponse,
    RedisBus, ServiceConfig, ShareLinkResponse, UpdateQuoteRequest, apply_schema,
    connect_database,
};
use pestquote_quotes::{LeadQuote, QuoteAction, QuoteService, QuoteSettings};
use tracing::{error, info, warn};
use uuid::Uuid;

const NO_QUOTE_MESSAGE: &str = "No quote found for this lead";
const AUTO_PROVISIONED_MESSAGE: &str = "Quote created automatically";

type ApiError = (StatusCode, String);

#[derive(Clone)]
struct AppState {
    quotes: QuoteService<PgQuoteStore, RedisBus>,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pestquote_gateway=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url).await?;
    apply_schema(&pool).await?;
    let redis = RedisBus::connect(&config.redis_url)?;

    let quotes = QuoteService::new(
        Arc::new(PgQuoteStore::new(pool)),
        Arc::new(redis),
        QuoteSettings {
            token_ttl: config.quote_token_ttl,
        },
    );

    let state = AppState { quotes };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/leads/{lead_id}/quote",
            get(get_lead_quote).post(price_lead_quote),
        )
        .route(
            "/quotes/{quote_id}",
            get(get_quote).put(update_quote).delete(delete_quote),
        )
        .route("/quotes/{quote_id}/link", post(issue_share_link))
        .route("/public/quotes/{quote_id}", get(get_public_quote))
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn price_lead_quote(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<PriceQuoteRequest>,
) -> Result<(StatusCode, Json<QuoteResponse>), ApiError> {
    let priced = state
        .quotes
        .price_quote(lead_id, payload.into_line_requests())
        .await
        .map_err(quote_error)?;

    let status = match priced.action {
        QuoteAction::Created => StatusCode::CREATED,
        QuoteAction::Updated => StatusCode::OK,
    };

    Ok((
        status,
        Json(QuoteResponse {
            success: true,
            data: Some(priced.quote),
            message: Some(priced.action.message().to_string()),
        }),
    ))
}

async fn get_lead_quote(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let response = match state
        .quotes
        .quote_for_lead(lead_id)
        .await
        .map_err(quote_error)?
    {
        LeadQuote::Existing(quote) => QuoteResponse {
            success: true,
            data: Some(quote),
            message: None,
        },
        LeadQuote::AutoProvisioned(quote) => QuoteResponse {
            success: true,
            data: Some(quote),
            message: Some(AUTO_PROVISIONED_MESSAGE.to_string()),
        },
        LeadQuote::NotQuoted => QuoteResponse {
            success: true,
            data: None,
            message: Some(NO_QUOTE_MESSAGE.to_string()),
        },
    };

    Ok(Json(response))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = state.quotes.quote(quote_id).await.map_err(quote_error)?;

    Ok(Json(QuoteResponse {
        success: true,
        data: Some(quote),
        message: None,
    }))
}

async fn update_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
    Json(payload): Json<UpdateQuoteRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = state
        .quotes
        .update_quote(quote_id, payload.into_update())
        .await
        .map_err(quote_error)?;

    Ok(Json(QuoteResponse {
        success: true,
        data: Some(quote),
        message: Some(QuoteAction::Updated.message().to_string()),
    }))
}

async fn delete_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<DeleteQuoteResponse>, ApiError> {
    state
        .quotes
        .delete_quote(quote_id)
        .await
        .map_err(quote_error)?;

    Ok(Json(DeleteQuoteResponse {
        success: true,
        message: "Quote deleted successfully".to_string(),
    }))
}

async fn issue_share_link(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<ShareLinkResponse>, ApiError> {
    let link = state
        .quotes
        .issue_share_link(quote_id)
        .await
        .map_err(quote_error)?;

    Ok(Json(link.into()))
}

async fn get_public_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
    Query(query): Query<PublicQuoteQuery>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = state
        .quotes
        .public_quote(quote_id, &query.company_slug, &query.token)
        .await
        .map_err(quote_error)?;

    Ok(Json(QuoteResponse {
        success: true,
        data: Some(quote),
        message: None,
    }))
}

fn quote_error(err: QuoteError) -> ApiError {
    let status = match &err {
        QuoteError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        QuoteError::NotFound(_) => StatusCode::NOT_FOUND,
        QuoteError::Forbidden(reason) => {
            warn!("public quote access denied: {}", reason);
            return (StatusCode::FORBIDDEN, "invalid or expired quote link".to_string());
        }
        QuoteError::PartialFailure { .. } => {
            error!("{:#}", err);
            StatusCode::BAD_GATEWAY
        }
        QuoteError::Unavailable { .. } => {
            error!("{:#}", err);
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_is_distinguishable_from_success() {
        let quote_id = Uuid::new_v4();
        let err = QuoteError::partial(Uuid::new_v4(), quote_id, "write line items")(
            anyhow::anyhow!("connection reset"),
        );

        let (status, body) = quote_error(err);

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains(&quote_id.to_string()));
        assert!(body.contains("write line items"));
    }

    #[test]
    fn forbidden_hides_the_reason() {
        let (status, body) = quote_error(QuoteError::Forbidden("token mismatch".to_string()));

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!body.contains("mismatch"));
    }

    #[test]
    fn caller_errors_map_to_client_statuses() {
        assert_eq!(
            quote_error(QuoteError::InvalidArgument("no plans".to_string())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            quote_error(QuoteError::NotFound("lead".to_string())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            quote_error(QuoteError::unavailable("load lead")(anyhow::anyhow!("down"))).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
