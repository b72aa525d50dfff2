use derive_more::Display;

use serde::de::DeserializeOwned;

use crate::checkpoints::{Checkpoint, UnsavedCheckpoint};

#[derive(Debug, Display)]
pub enum RepoError {
    NotConnected,
    Unknown(String),
}

impl std::error::Error for RepoError {}

#[async_trait::async_trait]
pub trait Repo:
    Sync + Send + Migratable + ExecutesWithRawQuery + LoadsDataWithRawQuery + Clone
{
    type Pool;
    type Conn<'a>;

    async fn get_pool(&self, max_size: u32) -> Result<Self::Pool, RepoError>;
    async fn get_conn<'a>(pool: &'a Self::Pool) -> Result<Self::Conn<'a>, RepoError>;

    /// Registers checkpoint rows for newly configured jobs. Existing rows
    /// keep their cursors untouched.
    async fn create_checkpoints<'a>(
        conn: &mut Self::Conn<'a>,
        checkpoints: &[UnsavedCheckpoint],
    ) -> Result<(), RepoError>;
    async fn get_checkpoints<'a>(conn: &mut Self::Conn<'a>) -> Result<Vec<Checkpoint>, RepoError>;
}

#[async_trait::async_trait]
pub trait HasRawQueryClient {
    type RawQueryClient: Send + Sync;
    type RawQueryTxnClient<'a>: Send + Sync;

    async fn get_client(&self) -> Result<Self::RawQueryClient, RepoError>;
    async fn get_txn_client<'a>(
        client: &'a mut Self::RawQueryClient,
    ) -> Result<Self::RawQueryTxnClient<'a>, RepoError>;
}

#[async_trait::async_trait]
pub trait ExecutesWithRawQuery: HasRawQueryClient {
    async fn execute(client: &Self::RawQueryClient, query: &str) -> Result<(), RepoError>;
    async fn execute_in_txn<'a>(
        client: &Self::RawQueryTxnClient<'a>,
        query: &str,
    ) -> Result<(), RepoError>;
    async fn commit_txn<'a>(client: Self::RawQueryTxnClient<'a>) -> Result<(), RepoError>;

    async fn update_historical_block<'a>(
        client: &Self::RawQueryTxnClient<'a>,
        event_table: &str,
        block_number: i64,
    ) -> Result<(), RepoError>;

    async fn update_realtime_block<'a>(
        client: &Self::RawQueryTxnClient<'a>,
        event_table: &str,
        block_number: i64,
    ) -> Result<(), RepoError>;
}

#[async_trait::async_trait]
pub trait LoadsDataWithRawQuery: HasRawQueryClient {
    async fn load_checkpoint(
        client: &Self::RawQueryClient,
        event_table: &str,
    ) -> Result<Option<Checkpoint>, RepoError>;

    async fn load_data<Data: Send + DeserializeOwned>(
        client: &Self::RawQueryClient,
        query: &str,
    ) -> Result<Option<Data>, RepoError>;
    async fn load_data_list<Data: Send + DeserializeOwned>(
        client: &Self::RawQueryClient,
        query: &str,
    ) -> Result<Vec<Data>, RepoError>;
}

pub trait RepoMigrations: Migratable {
    fn create_sync_checkpoints_migration() -> &'static [&'static str];

    fn get_internal_migrations() -> Vec<&'static str> {
        Self::create_sync_checkpoints_migration().to_vec()
    }
}

#[async_trait::async_trait]
pub trait Migratable: ExecutesWithRawQuery + Sync + Send {
    async fn migrate(
        client: &Self::RawQueryClient,
        migrations: Vec<impl AsRef<str> + Send + Sync>,
    ) -> Result<(), RepoError>
    where
        Self: Sized,
    {
        for migration in migrations {
            Self::execute(client, migration.as_ref()).await?;
        }

        Ok(())
    }
}

pub struct SQLikeMigrations;

impl SQLikeMigrations {
    pub fn create_sync_checkpoints() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS chainsync_sync_checkpoints (
                event_table TEXT PRIMARY KEY,
                historical_block BIGINT,
                realtime_block BIGINT
        )"]
    }
}
