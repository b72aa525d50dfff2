mod migrations;
mod raw_queries;

pub use raw_queries::{PostgresRepoClient, PostgresRepoTxnClient};

use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::repo::{Repo, RepoError};
use crate::checkpoints::{Checkpoint, UnsavedCheckpoint};

pub type Conn<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Clone, Debug)]
pub struct PostgresRepo {
    url: String,
}

impl PostgresRepo {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Repo for PostgresRepo {
    type Pool = Pool;
    type Conn<'a> = Conn<'a>;

    async fn get_pool(&self, max_size: u32) -> Result<Pool, RepoError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&self.url);

        bb8::Pool::builder()
            .max_size(max_size)
            .build(manager)
            .await
            .map_err(|error| RepoError::Unknown(error.to_string()))
    }

    async fn get_conn<'a>(pool: &'a Pool) -> Result<Conn<'a>, RepoError> {
        pool.get().await.map_err(|_| RepoError::NotConnected)
    }

    async fn create_checkpoints<'a>(
        conn: &mut Conn<'a>,
        checkpoints: &[UnsavedCheckpoint],
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::chainsync_sync_checkpoints::dsl::{
            chainsync_sync_checkpoints, event_table,
        };

        diesel::insert_into(chainsync_sync_checkpoints)
            .values(checkpoints)
            .on_conflict(event_table)
            .do_nothing()
            .execute(conn)
            .await
            .map_err(|error| RepoError::Unknown(error.to_string()))?;

        Ok(())
    }

    async fn get_checkpoints<'a>(conn: &mut Conn<'a>) -> Result<Vec<Checkpoint>, RepoError> {
        use crate::diesel::schema::chainsync_sync_checkpoints::dsl::chainsync_sync_checkpoints;

        chainsync_sync_checkpoints
            .load(conn)
            .await
            .map_err(|error| RepoError::Unknown(error.to_string()))
    }
}
