use sqlx::PgPool;
use uuid::Uuid;

/// Takes `amount` credits from the account. Returns the new balance, or `None` when
/// the account is unknown or cannot afford it.
pub async fn debit_credits(
    pool: &PgPool,
    account_id: Uuid,
    amount: i32,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar(
        r"
        update account
        set
            credits = credits - $2
        where
            id = $1
            and credits >= $2
        returning credits
        ",
    )
    .bind(account_id)
    .bind(amount)
    .fetch_optional(pool)
    .await
}
