// src/common/db_utils.rs

use sqlx::{Postgres, Transaction};

use crate::{common::error::AppError, config::AppState, models::auth::User};

// ---
// Helper RLS: a "chave" para o banco de dados
// ---
/// Abre uma transação e define as variáveis lidas pelas policies de RLS.
/// `set_config(..., true)` vale só até o fim da transação, então a conexão volta limpa para a pool.
pub(crate) async fn begin_rls_transaction(
    app_state: &AppState,
    user: &User,
) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = app_state.db_pool.begin().await?;

    sqlx::query("SELECT set_config('app.user_id', $1, true), set_config('app.user_role', $2, true)")
        .bind(user.id.to_string())
        .bind(user.role.as_str())
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
