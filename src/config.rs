// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{
        ActivityRepository, DocumentRepository, LeadRepository, MaterialRepository,
        NotificationRepository, ReportRepository, StepRepository, UserRepository,
    },
    services::{
        activity_service::ActivityService,
        auth::AuthService,
        document_service::DocumentService,
        lead_service::LeadService,
        material_service::MaterialService,
        notification_service::NotificationService,
        report_service::ReportService,
        storage::{HttpObjectStorage, ObjectStorage},
        workflow_service::WorkflowService,
    },
};

/// Configuração lida do ambiente (.env é carregado antes).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub storage_url: String,
    pub storage_service_key: String,
    pub storage_bucket: String,
    pub signed_url_ttl_secs: u64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            jwt_ttl_days: parse_or("JWT_TTL_DAYS", 7)?,
            storage_url: env::var("STORAGE_URL").context("STORAGE_URL deve ser definida")?,
            storage_service_key: env::var("STORAGE_SERVICE_KEY")
                .context("STORAGE_SERVICE_KEY deve ser definida")?,
            storage_bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| "lead-documents".to_string()),
            signed_url_ttl_secs: parse_or("SIGNED_URL_TTL_SECS", 3600)?,
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().with_context(|| format!("{} inválido: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub i18n_store: Arc<I18nStore>,
    pub auth_service: AuthService,
    pub lead_service: LeadService,
    pub workflow_service: WorkflowService,
    pub document_service: DocumentService,
    pub material_service: MaterialService,
    pub notification_service: NotificationService,
    pub activity_service: ActivityService,
    pub report_service: ReportService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let storage: Arc<dyn ObjectStorage> = Arc::new(HttpObjectStorage::new(
            &config.storage_url,
            &config.storage_service_key,
            &config.storage_bucket,
        )?);

        Self::build(db_pool, config, storage)
    }

    // --- Monta o gráfico de dependências ---
    pub fn build(
        db_pool: PgPool,
        config: Config,
        storage: Arc<dyn ObjectStorage>,
    ) -> anyhow::Result<Self> {
        let i18n_store = Arc::new(I18nStore::load()?);

        let user_repo = UserRepository::new(db_pool.clone());
        let lead_repo = LeadRepository::new();
        let step_repo = StepRepository::new();
        let document_repo = DocumentRepository::new();
        let material_repo = MaterialRepository::new();
        let notification_repo = NotificationRepository::new();
        let activity_repo = ActivityRepository::new();
        let report_repo = ReportRepository::new();

        let notification_service = NotificationService::new(notification_repo);
        let activity_service = ActivityService::new(activity_repo, lead_repo.clone());

        let auth_service = AuthService::new(
            user_repo.clone(),
            lead_repo.clone(),
            config.jwt_secret.clone(),
            config.jwt_ttl_days,
            db_pool.clone(),
        );

        let lead_service = LeadService::new(
            lead_repo.clone(),
            step_repo.clone(),
            user_repo.clone(),
            activity_service.clone(),
            notification_service.clone(),
        );

        let document_service = DocumentService::new(
            document_repo.clone(),
            lead_repo.clone(),
            storage,
            config.signed_url_ttl_secs,
            activity_service.clone(),
            notification_service.clone(),
        );

        let material_service = MaterialService::new(
            material_repo.clone(),
            lead_repo.clone(),
            activity_service.clone(),
            notification_service.clone(),
        );

        let workflow_service = WorkflowService::new(
            step_repo,
            lead_repo,
            document_repo,
            material_repo,
            activity_service.clone(),
            notification_service.clone(),
        );

        let report_service = ReportService::new(report_repo);

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            i18n_store,
            auth_service,
            lead_service,
            workflow_service,
            document_service,
            material_service,
            notification_service,
            activity_service,
            report_service,
        })
    }
}
