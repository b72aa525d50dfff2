use crate::diesel::schema::chainsync_sync_checkpoints;
use diesel::{Insertable, Queryable};
use serde::Deserialize;

/// Checkpoint row awaiting registration. Cursors start out null, meaning
/// "start at the contract deployment block".
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = chainsync_sync_checkpoints)]
pub struct UnsavedCheckpoint {
    pub event_table: String,
}

impl UnsavedCheckpoint {
    pub fn new(event_table: &str) -> Self {
        Self {
            event_table: event_table.to_string(),
        }
    }
}

/// One row per event table. `historical_block` and `realtime_block` are
/// independent cursors: each records the highest block its sync path has
/// durably persisted, and each only moves inside the same transaction as
/// the event rows it covers.
///
/// N/B: The field order has to match ./diesel.rs to stop diesel from
/// mixing up columns.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Deserialize)]
pub struct Checkpoint {
    pub event_table: String,
    pub historical_block: Option<i64>,
    pub realtime_block: Option<i64>,
}
