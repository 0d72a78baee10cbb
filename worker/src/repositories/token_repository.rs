use anyhow::Result;
use async_trait::async_trait;
use domain::{NewToken, Token};
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use uuid::Uuid;

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn find_by_mint(&self, mint: &str) -> Result<Option<Token>>;
    /// Returns the stored token for `token.mint`, creating it when unseen. An existing row is
    /// returned untouched.
    async fn ensure_token(&self, token: &NewToken) -> Result<Token>;
}

const TOKEN_COLUMNS: &str = "id, chain_id, name, symbol, logo, address, mint, current_price";

pub(crate) fn row_to_token(row: &PgRow) -> Result<Token> {
    Ok(Token {
        id: row.try_get("id")?,
        chain_id: row.try_get("chain_id")?,
        name: row.try_get("name")?,
        symbol: row.try_get("symbol")?,
        logo: row.try_get("logo")?,
        address: row.try_get("address")?,
        mint: row.try_get("mint")?,
        current_price: row.try_get("current_price")?,
    })
}

/// Creates the token or refreshes only its price. Concurrent writers serialize on the mint
/// row and the last fetched price wins; an unknown price keeps the stored one.
pub(crate) async fn upsert_token_price(
    conn: &mut PgConnection,
    token: &NewToken,
    fetched_price: Option<f64>,
) -> Result<Token> {
    let row = sqlx::query(&format!(
        "INSERT INTO tokens (id, chain_id, name, symbol, logo, address, mint, current_price)
         VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, $9))
         ON CONFLICT (mint) DO UPDATE
         SET current_price = COALESCE($8, tokens.current_price), updated_at = NOW()
         RETURNING {TOKEN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&token.chain_id)
    .bind(&token.name)
    .bind(&token.symbol)
    .bind(&token.logo)
    .bind(&token.address)
    .bind(&token.mint)
    .bind(fetched_price)
    .bind(token.current_price)
    .fetch_one(&mut *conn)
    .await?;
    row_to_token(&row)
}

/// Inserts the token if its mint is unseen, then reads back whichever row won.
pub(crate) async fn insert_or_fetch_token(
    conn: &mut PgConnection,
    token: &NewToken,
) -> Result<Token> {
    sqlx::query(
        "INSERT INTO tokens (id, chain_id, name, symbol, logo, address, mint, current_price)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (mint) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(&token.chain_id)
    .bind(&token.name)
    .bind(&token.symbol)
    .bind(&token.logo)
    .bind(&token.address)
    .bind(&token.mint)
    .bind(token.current_price)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(&format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE mint = $1"))
        .bind(&token.mint)
        .fetch_one(&mut *conn)
        .await?;
    row_to_token(&row)
}

#[derive(Clone)]
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn find_by_mint(&self, mint: &str) -> Result<Option<Token>> {
        let row = sqlx::query(&format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE mint = $1"))
            .bind(mint)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row_to_token(&row)).transpose()
    }

    async fn ensure_token(&self, token: &NewToken) -> Result<Token> {
        let mut conn = self.pool.acquire().await?;
        insert_or_fetch_token(&mut conn, token).await
    }
}
