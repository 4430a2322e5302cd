use sqlx::PgPool;

use crate::db::models::User;

/// Users are provisioned by the identity service; this side only reads them.
pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, full_name, phone, role, is_active, created_at
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
