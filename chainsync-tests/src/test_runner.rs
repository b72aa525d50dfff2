use std::future::Future;

use chainsync::{
    ChainsyncRepo, ChainsyncRepoClient, HasRawQueryClient, Migratable, RepoMigrations,
};

use crate::db;

pub fn new_repo() -> ChainsyncRepo {
    ChainsyncRepo::new(db::database_url().as_str())
}

/// Hands each test a migrated repo plus a raw-query client for asserting on
/// committed state. Sync passes commit real transactions, so tests isolate
/// through per-test event tables rather than a rolled-back test transaction.
pub async fn run_test<TestFn, Fut>(test_fn: TestFn)
where
    TestFn: Fn(ChainsyncRepo, ChainsyncRepoClient) -> Fut,
    Fut: Future<Output = ()>,
{
    db::setup();

    let repo = new_repo();
    let client = repo.get_client().await.unwrap();

    ChainsyncRepo::migrate(&client, ChainsyncRepo::get_internal_migrations())
        .await
        .unwrap();

    test_fn(repo, client).await;
}
