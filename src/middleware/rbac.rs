// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::auth::{User, UserRole},
};

/// 1. O trait que define um conjunto de papéis aceitos
pub trait RoleSet: Send + Sync + 'static {
    const ROLES: &'static [UserRole];
}

/// 2. O extractor (guardião). Devolve o usuário já autorizado.
pub struct RequireRole<T>(pub User, pub PhantomData<T>);

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleSet,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_headers(&parts.headers);

        // A. Usuário colocado pelo auth_guard
        let user = parts
            .extensions
            .get::<User>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated.to_api_error(&locale, &app_state.i18n_store))?;

        // B. Papel precisa estar no conjunto
        if !T::ROLES.contains(&user.role) {
            tracing::debug!("Papel {} barrado (aceitos: {:?})", user.role.as_str(), T::ROLES);
            return Err(AppError::Forbidden.to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequireRole(user, PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS CONJUNTOS (TIPOS)
// ---

pub struct AdminOnly;
impl RoleSet for AdminOnly {
    const ROLES: &'static [UserRole] = &[UserRole::Admin];
}

/// Admin e escritório
pub struct StaffOnly;
impl RoleSet for StaffOnly {
    const ROLES: &'static [UserRole] = &[UserRole::Admin, UserRole::Office];
}

pub struct LeadCreators;
impl RoleSet for LeadCreators {
    const ROLES: &'static [UserRole] = &[UserRole::Admin, UserRole::Office, UserRole::Agent];
}

pub struct MaterialVerifiers;
impl RoleSet for MaterialVerifiers {
    const ROLES: &'static [UserRole] = &[UserRole::Admin, UserRole::Office, UserRole::Installer];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_sets_match_responsibilities() {
        assert!(!StaffOnly::ROLES.contains(&UserRole::Agent));
        assert!(LeadCreators::ROLES.contains(&UserRole::Agent));
        assert!(!LeadCreators::ROLES.contains(&UserRole::Installer));
        assert!(MaterialVerifiers::ROLES.contains(&UserRole::Installer));
        assert!(!MaterialVerifiers::ROLES.contains(&UserRole::Customer));
        assert_eq!(AdminOnly::ROLES, &[UserRole::Admin]);
    }
}
