// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Office,
    Agent,
    Installer,
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Office => "office",
            UserRole::Agent => "agent",
            UserRole::Installer => "installer",
            UserRole::Customer => "customer",
        }
    }

    /// Rota do painel que o frontend abre após o login.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            UserRole::Admin => "/admin",
            UserRole::Office => "/office",
            UserRole::Agent => "/agent",
            UserRole::Installer => "/installer",
            UserRole::Customer => "/customer",
        }
    }

    /// Admin e escritório enxergam e gerenciam todos os leads.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Office)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Disabled,
}

// --- USUÁRIO ---

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "agent@solar.example")]
    pub email: String,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub password_hash: String,

    #[schema(example = "Ravi Kumar")]
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

// --- PAYLOADS ---

// Cadastro público: sempre cria conta de cliente
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    #[validate(email(message = "invalid_email"))]
    #[schema(example = "customer@example.com")]
    pub email: String,
    #[validate(length(min = 6, message = "password_too_short"))]
    pub password: String,
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Anita Sharma")]
    pub full_name: String,
    #[schema(example = "+91 98765 43210")]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginUserPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(min = 6, message = "password_too_short"))]
    pub password: String,
}

// Criação de usuário pelo admin (qualquer papel)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(min = 6, message = "password_too_short"))]
    pub password: String,
    #[validate(length(min = 1, message = "required"))]
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserStatusPayload {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub role: UserRole,
    #[schema(example = "/agent")]
    pub dashboard: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_has_its_own_dashboard() {
        let roles = [
            UserRole::Admin,
            UserRole::Office,
            UserRole::Agent,
            UserRole::Installer,
            UserRole::Customer,
        ];
        let mut paths: Vec<_> = roles.iter().map(|r| r.dashboard_path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), roles.len());
        assert_eq!(UserRole::Installer.dashboard_path(), "/installer");
    }

    #[test]
    fn only_admin_and_office_are_staff() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Office.is_staff());
        assert!(!UserRole::Agent.is_staff());
        assert!(!UserRole::Installer.is_staff());
        assert!(!UserRole::Customer.is_staff());
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Installer).unwrap(), "\"installer\"");
        let role: UserRole = serde_json::from_str("\"office\"").unwrap();
        assert_eq!(role, UserRole::Office);
    }
}
