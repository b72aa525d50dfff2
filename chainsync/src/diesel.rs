pub mod schema {
    diesel::table! {
      chainsync_sync_checkpoints (event_table) {
          event_table -> Text,
          historical_block -> Nullable<Int8>,
          realtime_block -> Nullable<Int8>,
      }
    }
}
