use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::documents::repo::{DocumentStore, PgDocumentStore};
use crate::mail::{LogMailer, Mailer};
use crate::storage::{Storage, StorageClient};
use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        // S3 or MinIO
        let storage =
            Arc::new(Storage::new(&config.storage, "us-east-1").await?) as Arc<dyn StorageClient>;
        let mailer = Arc::new(LogMailer::new(config.email_from.clone(), !config.production))
            as Arc<dyn Mailer>;

        Ok(Self::from_parts(db, config, storage, mailer))
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            documents: Arc::new(PgDocumentStore::new(db.clone())),
            db,
            config,
            storage,
            mailer,
        }
    }
}
