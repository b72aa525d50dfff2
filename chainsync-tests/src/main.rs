use chainsync::{ChainsyncRepo, HasRawQueryClient, Migratable, RepoMigrations};
use chainsync_tests::db;

#[tokio::main]
async fn main() {
    db::setup();

    let repo = ChainsyncRepo::new(db::database_url().as_str());
    let client = repo.get_client().await.unwrap();

    ChainsyncRepo::migrate(&client, ChainsyncRepo::get_internal_migrations())
        .await
        .unwrap();
}
