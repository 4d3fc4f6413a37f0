//! File-backed storage through the full engine

mod common;

use anyhow::Result;
use common::note;
use content_search_engine::config::{Config, StorageBackend, StorageConfig};
use content_search_engine::models::{Address, ContentKind, EntityId};
use content_search_engine::search::{IndexManager, SearchRequest};
use tempfile::TempDir;

fn sled_config(dir: &TempDir) -> Config {
    Config {
        storage: StorageConfig {
            backend: StorageBackend::Sled,
            data_dir: dir.path().to_path_buf(),
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn test_index_and_search_on_sled_backend() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = IndexManager::new(&sled_config(&dir));
    let alice = EntityId::user("alice");

    for i in 0..10 {
        manager
            .index_content(
                &alice,
                ContentKind::Note,
                &note(
                    &format!("tag:n{}", i),
                    "alice",
                    &format!("persistent entry word{}", i),
                ),
            )
            .await?;
    }

    let response = manager.search(&alice, &SearchRequest::new("word3")).await?;
    assert_eq!(response.total_hits, 1);
    assert_eq!(response.hits[0].address, Address::new("tag:n3"));

    // Shared words match all ten documents.
    let response = manager
        .search(&alice, &SearchRequest::new("persistent"))
        .await?;
    assert_eq!(response.total_hits, 10);

    manager.close()?;
    Ok(())
}

#[tokio::test]
async fn test_sled_catalogs_are_separated_per_entity_and_kind() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = IndexManager::new(&sled_config(&dir));
    let alice = EntityId::user("alice");
    let bob = EntityId::user("bob");

    manager
        .index_content(&alice, ContentKind::Note, &note("tag:a", "alice", "marker"))
        .await?;
    manager
        .index_content(&bob, ContentKind::Note, &note("tag:b", "bob", "marker"))
        .await?;

    let alice_hits = manager.search(&alice, &SearchRequest::new("marker")).await?;
    assert_eq!(alice_hits.total_hits, 1);
    assert_eq!(alice_hits.hits[0].address, Address::new("tag:a"));

    let bob_hits = manager.search(&bob, &SearchRequest::new("marker")).await?;
    assert_eq!(bob_hits.total_hits, 1);
    assert_eq!(bob_hits.hits[0].address, Address::new("tag:b"));
    Ok(())
}

#[tokio::test]
async fn test_sled_update_and_delete() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = IndexManager::new(&sled_config(&dir));
    let alice = EntityId::user("alice");

    manager
        .index_content(&alice, ContentKind::Note, &note("tag:n1", "alice", "before edit"))
        .await?;
    manager
        .update_content(&alice, ContentKind::Note, &note("tag:n1", "alice", "after edit"))
        .await?;

    let stale = manager.search(&alice, &SearchRequest::new("before")).await?;
    assert_eq!(stale.total_hits, 0);
    let fresh = manager.search(&alice, &SearchRequest::new("after")).await?;
    assert_eq!(fresh.total_hits, 1);

    assert!(
        manager
            .delete_content(&alice, ContentKind::Note, &Address::new("tag:n1"))
            .await?
    );
    let gone = manager.search(&alice, &SearchRequest::new("after")).await?;
    assert_eq!(gone.total_hits, 0);
    Ok(())
}
