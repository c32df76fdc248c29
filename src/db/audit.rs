//! Session-scoped audit context.
//!
//! The audit triggers read `app.current_user_id` and `app.client_ip` via
//! `current_setting(..)` when they log a change, so the values must be set
//! on the same connection that later runs the transaction.

use crate::error::Result;
use sqlx::PgConnection;

#[derive(Debug, Clone)]
pub struct AuditContext {
    pub user_id: String,
    pub client_ip: String,
}

pub async fn configure_audit_context(conn: &mut PgConnection, ctx: &AuditContext) -> Result<()> {
    sqlx::query(
        "SELECT set_config('app.current_user_id', $1, false), \
                set_config('app.client_ip', $2, false)",
    )
    .bind(&ctx.user_id)
    .bind(&ctx.client_ip)
    .execute(conn)
    .await?;
    Ok(())
}
