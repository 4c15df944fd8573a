// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadRepository, UserRepository},
    models::auth::{
        AuthResponse, Claims, CreateUserPayload, RegisterUserPayload, User, UserRole, UserStatus,
    },
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    lead_repo: LeadRepository,
    jwt_secret: String,
    jwt_ttl_days: i64,
    pool: PgPool,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        lead_repo: LeadRepository,
        jwt_secret: String,
        jwt_ttl_days: i64,
        pool: PgPool,
    ) -> Self {
        Self { user_repo, lead_repo, jwt_secret, jwt_ttl_days, pool }
    }

    // Auto-cadastro: sempre cria um cliente e vincula leads com o mesmo e-mail
    pub async fn register_customer(&self, payload: &RegisterUserPayload) -> Result<AuthResponse, AppError> {
        let hashed_password = hash_password(&payload.password).await?;

        let mut tx = self.pool.begin().await?;

        let new_user = self
            .user_repo
            .create_user(
                &mut *tx,
                &payload.email,
                &hashed_password,
                &payload.full_name,
                payload.phone.as_deref(),
                UserRole::Customer,
            )
            .await?;

        let linked = self
            .lead_repo
            .link_customer_by_email(&mut *tx, new_user.id, &new_user.email)
            .await?;

        if linked > 0 {
            tracing::info!("🔗 Cliente {} vinculado a {} leads.", new_user.id, linked);
        }

        tx.commit().await?;

        self.issue_token(&new_user)
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        // Só revela o bloqueio depois de a senha conferir
        if !user.is_active() {
            return Err(AppError::AccountDisabled);
        }

        self.issue_token(&user)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = self.decode_claims(token)?;

        self.user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    // =========================================================================
    //  ADMINISTRAÇÃO DE USUÁRIOS
    // =========================================================================

    pub async fn create_user(&self, payload: &CreateUserPayload) -> Result<User, AppError> {
        let hashed_password = hash_password(&payload.password).await?;

        let mut tx = self.pool.begin().await?;

        let user = self
            .user_repo
            .create_user(
                &mut *tx,
                &payload.email,
                &hashed_password,
                &payload.full_name,
                payload.phone.as_deref(),
                payload.role,
            )
            .await?;

        if user.role == UserRole::Customer {
            self.lead_repo
                .link_customer_by_email(&mut *tx, user.id, &user.email)
                .await?;
        }

        tx.commit().await?;

        tracing::info!("👤 Usuário {} criado com papel {}", user.id, user.role.as_str());
        Ok(user)
    }

    pub async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, AppError> {
        self.user_repo.list_users(&self.pool, role).await
    }

    pub async fn set_user_status(
        &self,
        actor: &User,
        target_id: Uuid,
        status: UserStatus,
    ) -> Result<User, AppError> {
        if actor.id == target_id && status == UserStatus::Disabled {
            return Err(AppError::CannotDisableSelf);
        }

        self.user_repo.update_status(&self.pool, target_id, status).await
    }

    /// Cria o primeiro administrador se ainda não houver nenhum.
    pub async fn ensure_bootstrap_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        if self.user_repo.admin_exists().await? {
            return Ok(());
        }

        let hashed_password = hash_password(password).await?;
        let admin = self
            .user_repo
            .create_user(&self.pool, email, &hashed_password, "Administrator", None, UserRole::Admin)
            .await?;

        tracing::info!("🔑 Administrador inicial criado: {}", admin.email);
        Ok(())
    }

    // =========================================================================
    //  TOKENS
    // =========================================================================

    fn issue_token(&self, user: &User) -> Result<AuthResponse, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(self.jwt_ttl_days);

        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?;

        Ok(AuthResponse {
            token,
            role: user.role,
            dashboard: user.role.dashboard_path().to_string(),
        })
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
    }
}

async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service(secret: &str, ttl_days: i64) -> AuthService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/solar_crm_test")
            .unwrap();
        AuthService::new(
            UserRepository::new(pool.clone()),
            LeadRepository::new(),
            secret.to_string(),
            ttl_days,
            pool,
        )
    }

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "agent@example.com".into(),
            password_hash: String::new(),
            full_name: "Agent".into(),
            phone: None,
            role,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn issued_token_carries_subject_and_role() {
        let svc = service("secret", 7);
        let agent = user(UserRole::Agent);

        let response = svc.issue_token(&agent).unwrap();
        assert_eq!(response.role, UserRole::Agent);
        assert_eq!(response.dashboard, "/agent");

        let claims = svc.decode_claims(&response.token).unwrap();
        assert_eq!(claims.sub, agent.id);
        assert_eq!(claims.role, UserRole::Agent);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let issuer = service("secret-a", 7);
        let verifier = service("secret-b", 7);
        let token = issuer.issue_token(&user(UserRole::Office)).unwrap().token;

        assert!(matches!(verifier.decode_claims(&token), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let svc = service("secret", -1);
        let token = svc.issue_token(&user(UserRole::Customer)).unwrap().token;

        assert!(matches!(svc.decode_claims(&token), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn admin_cannot_disable_own_account() {
        let svc = service("secret", 7);
        let admin = user(UserRole::Admin);

        let result = svc.set_user_status(&admin, admin.id, UserStatus::Disabled).await;
        assert!(matches!(result, Err(AppError::CannotDisableSelf)));
    }
}
