pub mod db;
pub mod factory;
pub mod test_runner;
pub mod tests;

use chainsync::{
    Checkpoint, ChainsyncRepo, ChainsyncRepoClient, ExecutesWithRawQuery, LoadsDataWithRawQuery,
};
use serde::Deserialize;

/// Registers a checkpoint row the way the coordinator does before it spawns
/// jobs, for tests that drive a sync pass directly.
pub async fn register_checkpoint(client: &ChainsyncRepoClient, event_table: &str) {
    ChainsyncRepo::execute(
        client,
        &format!(
            "INSERT INTO chainsync_sync_checkpoints (event_table)
             VALUES ('{event_table}')
             ON CONFLICT DO NOTHING"
        ),
    )
    .await
    .unwrap();
}

pub async fn set_historical_block(
    client: &ChainsyncRepoClient,
    event_table: &str,
    block_number: Option<i64>,
) {
    let value = block_number.map_or("NULL".to_string(), |block| block.to_string());

    ChainsyncRepo::execute(
        client,
        &format!(
            "UPDATE chainsync_sync_checkpoints
             SET historical_block = {value}
             WHERE event_table = '{event_table}'"
        ),
    )
    .await
    .unwrap();
}

pub async fn get_checkpoint(client: &ChainsyncRepoClient, event_table: &str) -> Option<Checkpoint> {
    ChainsyncRepo::load_checkpoint(client, event_table).await.unwrap()
}

pub async fn count_rows(client: &ChainsyncRepoClient, table: &str) -> i64 {
    #[derive(Deserialize)]
    struct CountRow {
        count: i64,
    }

    let row: Option<CountRow> =
        ChainsyncRepo::load_data(client, &format!("SELECT COUNT(*) AS count FROM {table}"))
            .await
            .unwrap();

    row.map_or(0, |row| row.count)
}
