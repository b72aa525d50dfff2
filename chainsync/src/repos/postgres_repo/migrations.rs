use crate::{Migratable, RepoMigrations, SQLikeMigrations};

use super::PostgresRepo;

impl RepoMigrations for PostgresRepo {
    fn create_sync_checkpoints_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_sync_checkpoints()
    }
}

impl Migratable for PostgresRepo {}
