use chrono::{DateTime, Utc};
use pestquote_core::{Quote, QuoteError};
use rand::RngCore;
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub quote_id: Uuid,
    pub quote_url: String,
    pub quote_token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// 32 random bytes, hex encoded.
pub fn generate_quote_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn quote_path(company_slug: &str, quote_id: Uuid, token: &str) -> String {
    format!("/{company_slug}/quote/{quote_id}?token={token}")
}

/// The existing link, if the quote already carries both token and URL.
pub fn existing_link(quote: &Quote) -> Option<ShareLink> {
    match (&quote.quote_token, &quote.quote_url) {
        (Some(token), Some(url)) => Some(ShareLink {
            quote_id: quote.id,
            quote_url: url.clone(),
            quote_token: token.clone(),
            token_expires_at: quote.token_expires_at,
        }),
        _ => None,
    }
}

/// Checks a public viewer's capability to read `quote`.
pub fn verify_public_access(
    quote: &Quote,
    company_slug: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<(), QuoteError> {
    let Some(url) = quote.quote_url.as_deref() else {
        return Err(QuoteError::Forbidden(
            "this quote is not publicly accessible".to_string(),
        ));
    };
    let Some(expected) = quote.quote_token.as_deref() else {
        return Err(QuoteError::Forbidden(
            "this quote is not publicly accessible".to_string(),
        ));
    };

    if token.is_empty() || !constant_time_compare(expected, token) {
        return Err(QuoteError::Forbidden("invalid access token".to_string()));
    }
    if !url.starts_with(&format!("/{company_slug}/quote/")) {
        return Err(QuoteError::Forbidden(
            "quote does not belong to this company".to_string(),
        ));
    }
    if quote
        .token_expires_at
        .is_some_and(|expires_at| expires_at < now)
    {
        return Err(QuoteError::Forbidden("access token has expired".to_string()));
    }

    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pestquote_core::QuoteStatus;
    use rust_decimal::Decimal;

    use super::*;

    fn shared_quote(token: &str) -> Quote {
        let id = Uuid::new_v4();
        Quote {
            id,
            lead_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            customer_id: None,
            service_address_id: None,
            primary_pest: None,
            additional_pests: Vec::new(),
            home_size_range: None,
            yard_size_range: None,
            total_initial_price: Decimal::ZERO,
            total_recurring_price: Decimal::ZERO,
            quote_status: QuoteStatus::Draft,
            valid_until: None,
            quote_token: Some(token.to_string()),
            quote_url: Some(quote_path("acme-pest", id, token)),
            token_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            line_items: Vec::new(),
        }
    }

    #[test]
    fn tokens_are_64_hex_chars_and_unique() {
        let first = generate_quote_token();
        let second = generate_quote_token();

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn path_embeds_slug_quote_and_token() {
        let id = Uuid::nil();
        assert_eq!(
            quote_path("acme-pest", id, "abc"),
            "/acme-pest/quote/00000000-0000-0000-0000-000000000000?token=abc"
        );
    }

    #[test]
    fn matching_token_grants_access() {
        let quote = shared_quote("feedface");
        assert!(verify_public_access(&quote, "acme-pest", "feedface", Utc::now()).is_ok());
    }

    #[test]
    fn rejects_wrong_token_company_or_expired_link() {
        let mut quote = shared_quote("feedface");
        let now = Utc::now();

        assert!(matches!(
            verify_public_access(&quote, "acme-pest", "deadbeef", now),
            Err(QuoteError::Forbidden(_))
        ));
        assert!(matches!(
            verify_public_access(&quote, "other-co", "feedface", now),
            Err(QuoteError::Forbidden(_))
        ));

        quote.token_expires_at = Some(now - Duration::days(1));
        assert!(matches!(
            verify_public_access(&quote, "acme-pest", "feedface", now),
            Err(QuoteError::Forbidden(_))
        ));
    }

    #[test]
    fn unshared_quote_is_not_public() {
        let mut quote = shared_quote("feedface");
        quote.quote_url = None;

        assert!(verify_public_access(&quote, "acme-pest", "feedface", Utc::now()).is_err());
    }
}
