use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};

const QUOTE_SCHEMA: &str = include_str!("../../../migrations/0001_quotes.sql");

pub async fn connect_database(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to quote database")?;

    Ok(pool)
}

/// Creates any missing quote tables. Every statement is `IF NOT EXISTS`.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(QUOTE_SCHEMA)
        .execute(pool)
        .await
        .context("failed to apply quote schema")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::QUOTE_SCHEMA;

    fn column_type<'a>(schema: &'a str, column: &str) -> Option<&'a str> {
        schema
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(column)?.split_whitespace().next())
    }

    #[test]
    fn line_item_discount_columns_accept_any_magnitude() {
        assert_eq!(column_type(QUOTE_SCHEMA, "discount_percentage "), Some("NUMERIC"));
        assert_eq!(column_type(QUOTE_SCHEMA, "discount_amount "), Some("NUMERIC"));
    }
}
