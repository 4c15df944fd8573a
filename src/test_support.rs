// src/test_support.rs

//! Base dos testes que precisam de um Postgres de verdade.
//!
//! Sem `TEST_DATABASE_URL` esses testes são pulados. Cada teste roda dentro de uma
//! transação que nunca é confirmada, então nada fica gravado no banco.

use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgConnection, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    config::{AppState, Config},
    db::UserRepository,
    models::{
        auth::{User, UserRole},
        leads::{CreateLeadPayload, Lead},
    },
    services::storage::{ObjectStorage, StaticStorage},
};

pub(crate) fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok().filter(|url| !url.is_empty())
}

/// Conecta no banco de teste ou encerra o teste quando não há banco configurado.
macro_rules! test_db_or_skip {
    () => {
        match $crate::test_support::TestDb::connect().await {
            Some(db) => db,
            None => {
                eprintln!("Pulando teste de banco (TEST_DATABASE_URL não definida)");
                return;
            }
        }
    };
}
pub(crate) use test_db_or_skip;

pub(crate) fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        db_max_connections: 2,
        bind_addr: "127.0.0.1:0".into(),
        jwt_secret: "test-secret".into(),
        jwt_ttl_days: 1,
        storage_url: "https://storage.test".into(),
        storage_service_key: "service-key".into(),
        storage_bucket: "lead-documents".into(),
        signed_url_ttl_secs: 60,
        admin_email: None,
        admin_password: None,
    }
}

pub(crate) struct TestDb {
    pub state: AppState,
}

impl TestDb {
    pub async fn connect() -> Option<Self> {
        let url = database_url()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("banco de teste acessível");

        // O migrator usa advisory lock: testes em paralelo não disputam o schema
        sqlx::migrate!().run(&pool).await.expect("migrações do banco de teste");

        let storage: Arc<dyn ObjectStorage> = Arc::new(StaticStorage);
        let state = AppState::build(pool, test_config(&url), storage).expect("estado de teste");
        Some(Self { state })
    }

    /// Transação externa do teste. Os serviços abrem savepoints dentro dela.
    /// Descartada sem commit, vira rollback.
    pub async fn begin(&self) -> Transaction<'static, Postgres> {
        self.state.db_pool.begin().await.expect("transação de teste")
    }

    pub async fn user(&self, conn: &mut PgConnection, role: UserRole) -> User {
        let email = format!("{}-{}@test.local", role.as_str(), Uuid::new_v4().simple());
        UserRepository::new(self.state.db_pool.clone())
            .create_user(&mut *conn, &email, "not-a-bcrypt-hash", "Test User", None, role)
            .await
            .expect("usuário de teste")
    }

    pub async fn lead(&self, conn: &mut PgConnection, creator: &User) -> Lead {
        let payload = CreateLeadPayload {
            customer_name: "Anita Sharma".into(),
            customer_phone: "+919876543210".into(),
            customer_email: None,
            address: None,
            city: Some("Jaipur".into()),
            pincode: Some("302001".into()),
            notes: None,
        };
        self.state
            .lead_service
            .create_lead(&mut *conn, creator, &payload)
            .await
            .expect("lead de teste")
    }
}
