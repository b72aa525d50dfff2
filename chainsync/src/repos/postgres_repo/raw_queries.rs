use tokio_postgres::{types::ToSql, Client, NoTls, Transaction};

use serde::de::DeserializeOwned;

use crate::checkpoints::Checkpoint;
use crate::{ExecutesWithRawQuery, HasRawQueryClient, LoadsDataWithRawQuery, RepoError};

use super::PostgresRepo;

pub type PostgresRepoClient = Client;
pub type PostgresRepoTxnClient<'a> = Transaction<'a>;

#[async_trait::async_trait]
impl HasRawQueryClient for PostgresRepo {
    type RawQueryClient = Client;
    type RawQueryTxnClient<'a> = Transaction<'a>;

    async fn get_client(&self) -> Result<Client, RepoError> {
        let (client, conn) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|_| RepoError::NotConnected)?;

        tokio::spawn(async move {
            if let Err(error) = conn.await {
                tracing::error!(%error, "postgres connection task exited");
            }
        });

        Ok(client)
    }

    async fn get_txn_client<'a>(client: &'a mut Client) -> Result<Transaction<'a>, RepoError> {
        client.transaction().await.map_err(to_repo_error)
    }
}

#[async_trait::async_trait]
impl ExecutesWithRawQuery for PostgresRepo {
    async fn execute(client: &Client, query: &str) -> Result<(), RepoError> {
        client
            .execute(query, &[] as &[&(dyn ToSql + Sync)])
            .await
            .map_err(to_repo_error)?;

        Ok(())
    }

    async fn execute_in_txn<'a>(
        txn_client: &Transaction<'a>,
        query: &str,
    ) -> Result<(), RepoError> {
        txn_client
            .execute(query, &[] as &[&(dyn ToSql + Sync)])
            .await
            .map_err(to_repo_error)?;

        Ok(())
    }

    async fn commit_txn<'a>(txn_client: Transaction<'a>) -> Result<(), RepoError> {
        txn_client.commit().await.map_err(to_repo_error)
    }

    async fn update_historical_block<'a>(
        txn_client: &Transaction<'a>,
        event_table: &str,
        block_number: i64,
    ) -> Result<(), RepoError> {
        // GREATEST keeps the cursor monotonic even if a stale writer
        // commits after a restart.
        let query = format!(
            "UPDATE chainsync_sync_checkpoints
            SET historical_block = GREATEST(COALESCE(historical_block, 0), {block_number})
            WHERE event_table = '{event_table}'"
        );

        Self::execute_in_txn(txn_client, &query).await
    }

    async fn update_realtime_block<'a>(
        txn_client: &Transaction<'a>,
        event_table: &str,
        block_number: i64,
    ) -> Result<(), RepoError> {
        let query = format!(
            "UPDATE chainsync_sync_checkpoints
            SET realtime_block = GREATEST(COALESCE(realtime_block, 0), {block_number})
            WHERE event_table = '{event_table}'"
        );

        Self::execute_in_txn(txn_client, &query).await
    }
}

#[async_trait::async_trait]
impl LoadsDataWithRawQuery for PostgresRepo {
    async fn load_checkpoint(
        client: &Client,
        event_table: &str,
    ) -> Result<Option<Checkpoint>, RepoError> {
        let query = format!(
            "SELECT event_table, historical_block, realtime_block
            FROM chainsync_sync_checkpoints
            WHERE event_table = '{event_table}'"
        );

        Self::load_data(client, &query).await
    }

    async fn load_data<Data: Send + DeserializeOwned>(
        client: &Client,
        query: &str,
    ) -> Result<Option<Data>, RepoError> {
        let mut data_list: Vec<Data> = Self::load_data_list(client, query).await?;

        debug_assert!(data_list.len() <= 1);

        Ok(data_list.pop())
    }

    async fn load_data_list<Data: Send + DeserializeOwned>(
        client: &Client,
        query: &str,
    ) -> Result<Vec<Data>, RepoError> {
        let json_aggregate = get_json_aggregate(client, query).await?;

        if json_aggregate.is_object() || json_aggregate.is_array() {
            serde_json::from_value(json_aggregate)
                .map_err(|error| RepoError::Unknown(error.to_string()))
        } else {
            Ok(vec![])
        }
    }
}

async fn get_json_aggregate(client: &Client, query: &str) -> Result<serde_json::Value, RepoError> {
    let rows = client
        .query(json_aggregate_query(query).as_str(), &[])
        .await
        .map_err(to_repo_error)?;

    let row = rows
        .first()
        .ok_or_else(|| RepoError::Unknown("empty json aggregate".to_string()))?;

    row.try_get(0).map_err(to_repo_error)
}

fn json_aggregate_query(query: &str) -> String {
    format!("WITH result AS ({query}) SELECT COALESCE(json_agg(result), '[]'::json) FROM result",)
}

fn to_repo_error(error: tokio_postgres::Error) -> RepoError {
    RepoError::Unknown(error.to_string())
}
