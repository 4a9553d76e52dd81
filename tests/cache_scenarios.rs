//! Cache Scenario Tests
//!
//! Black-box scenarios through the public facade only: an application
//! session writes records, the cache persists them, and a later session
//! picks up where it left off.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test cache_scenarios
//! ```

use std::sync::Arc;
use std::time::Duration;

use relaycache::{
    decode_snapshot, CacheManager, CacheOptions, FieldValue, FileMedium, LoadState, MemoryMedium,
    Record, StorageMedium,
};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("relaycache=debug")
        .try_init();
}

async fn open(medium: Arc<dyn StorageMedium>, options: CacheOptions) -> CacheManager {
    let cache = CacheManager::new(medium, options);
    cache.wait_for_load().await;
    cache
}

// =============================================================================
// Scenarios
// =============================================================================

/// A feed query normalizes into records and a root call, then survives a restart.
#[tokio::test]
async fn test_feed_session_survives_restart() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let options = CacheOptions::new().cache_key("feed-cache");

    {
        let medium = Arc::new(FileMedium::open(temp_dir.path()).unwrap());
        let cache = open(medium, options.clone()).await;

        cache.write_field("story:1", "title", "Launch", Some("Story"));
        cache.write_field("story:2", "title", "Patch notes", Some("Story"));
        cache.write_field("user:9", "name", "Grace", Some("User"));
        let author = cache.read_node("user:9").unwrap();
        cache.write_field("story:1", "author", author.clone(), None);
        cache.write_field("story:2", "author", author, None);
        cache.write_field(
            "feed:home",
            "edges",
            vec![FieldValue::from("story:1"), FieldValue::from("story:2")],
            Some("Feed"),
        );
        cache.write_root_call("viewer_feed", "", "feed:home");

        cache.flush_now().await.unwrap();
    }

    let medium = Arc::new(FileMedium::open(temp_dir.path()).unwrap());
    let cache = CacheManager::new(medium, options);
    assert_eq!(cache.wait_for_load().await, LoadState::Restored);

    let feed_id = cache.resolve_root_call("viewer_feed", "").await.unwrap();
    let feed = cache.read_node(&feed_id).unwrap();
    assert_eq!(feed.type_name().as_deref(), Some("Feed"));
    assert_eq!(feed.to_json()["edges"], json!(["story:1", "story:2"]));

    // The shared author is emitted once, inline under the first story
    let first = cache.read_node("story:1").unwrap();
    assert_eq!(first.to_json()["author"]["name"], json!("Grace"));
    let second = cache.read_node("story:2").unwrap();
    assert!(!second.contains_field("author"));
    assert!(cache.read_node("user:9").is_none());
}

/// Signing out clears memory and disk; the next session starts empty.
#[tokio::test]
async fn test_sign_out_clears_everything() {
    init_tracing();
    let medium = Arc::new(MemoryMedium::new());

    {
        let cache = open(medium.clone(), CacheOptions::default()).await;
        cache.write_field("user:1", "token", "secret", Some("User"));
        cache.flush_now().await.unwrap();
        assert!(medium.contains_key("__RelayCacheManager__"));

        cache.clear_storage().await.unwrap();
        assert_eq!(cache.record_count(), 0);
    }

    let cache = CacheManager::new(medium.clone(), CacheOptions::default());
    assert_eq!(cache.wait_for_load().await, LoadState::Empty);
    assert!(medium.is_empty());
}

/// Two apps sharing one medium keep separate snapshots under their own keys.
#[tokio::test]
async fn test_separate_keys_share_a_medium() {
    let medium = Arc::new(MemoryMedium::new());
    let admin = open(medium.clone(), CacheOptions::new().cache_key("admin")).await;
    let shop = open(medium.clone(), CacheOptions::new().cache_key("shop")).await;

    admin.write_field("1", "role", "owner", None);
    shop.write_field("1", "cart", 3i64, None);
    admin.flush_now().await.unwrap();
    shop.flush_now().await.unwrap();

    let admin_snapshot = decode_snapshot(&medium.contents("admin").unwrap()).unwrap();
    let shop_snapshot = decode_snapshot(&medium.contents("shop").unwrap()).unwrap();
    assert_eq!(
        admin_snapshot.read_node("1").unwrap().to_json(),
        json!({"id": "1", "role": "owner"})
    );
    assert_eq!(
        shop_snapshot.read_node("1").unwrap().to_json(),
        json!({"id": "1", "cart": 3})
    );
}

/// Options read from a config file drive the manager.
#[tokio::test(start_paused = true)]
async fn test_options_from_toml_drive_flush() {
    let options = CacheOptions::from_toml_str(
        r#"
        cacheKey = "configured"
        timeout = 2000
        "#,
    )
    .unwrap();
    let medium = Arc::new(MemoryMedium::new());
    let cache = open(medium.clone(), options).await;
    assert_eq!(cache.cache_key(), "configured");

    let record = Record::from_json(json!({"id": "cfg", "enabled": true})).unwrap();
    cache.write_node("cfg", record);

    tokio::time::sleep(Duration::from_millis(2_001)).await;
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    let text = medium.contents("configured").unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&text).unwrap(),
        json!({"records": {"cfg": {"id": "cfg", "enabled": true}}, "rootCallMap": {}})
    );
}
