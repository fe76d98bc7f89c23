//! Concurrency tests for the metadata cache.
//!
//! Verifies the single-flight guarantee (concurrent refreshes of one key
//! coalesce into one fetch) and chained population across cache instances.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chronicle::metacache::AttrMap;
use chronicle::{LookupParams, MetaCache, MetaLookup};
use futures::FutureExt;

fn slow_lookup(calls: Arc<AtomicU32>, value: &str) -> MetaLookup {
    let value = value.to_string();
    MetaLookup::new(LookupParams::Custom(BTreeMap::new()), move |_params| {
        calls.fetch_add(1, Ordering::SeqCst);
        let value = value.clone();
        async move {
            // Hold the population gate open so other callers pile up.
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut attrs = AttrMap::new();
            attrs.insert("Name".to_string(), value);
            Ok(attrs)
        }
        .boxed()
    })
}

#[tokio::test(start_paused = true)]
async fn concurrent_refreshes_coalesce_into_one_fetch() {
    let cache = Arc::new(MetaCache::new(Some(Duration::from_secs(60)), 100));
    let calls = Arc::new(AtomicU32::new(0));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let lookup = slow_lookup(calls.clone(), "general");
        tasks.push(tokio::spawn(async move {
            cache.check_and_update("42", lookup).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one fetch for N concurrent callers");
    let attrs = cache.retrieve("42").unwrap();
    assert_eq!(attrs.get("Name").map(String::as_str), Some("general"));
}

#[tokio::test(start_paused = true)]
async fn stale_key_refresh_also_coalesces() {
    let cache = Arc::new(MetaCache::new(Some(Duration::from_secs(60)), 100));
    let calls = Arc::new(AtomicU32::new(0));

    cache
        .check_and_update("42", slow_lookup(calls.clone(), "general"))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        let lookup = slow_lookup(calls.clone(), "general-renamed");
        tasks.push(tokio::spawn(async move {
            cache.check_and_update("42", lookup).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2, "one initial fetch plus one coalesced refresh");
    let attrs = cache.retrieve("42").unwrap();
    assert_eq!(attrs.get("Name").map(String::as_str), Some("general-renamed"));
}

#[tokio::test]
async fn chained_lookup_populates_dependent_cache() {
    let channels = Arc::new(MetaCache::new(Some(Duration::from_secs(60)), 100));
    let guilds = Arc::new(MetaCache::new(Some(Duration::from_secs(60)), 100));

    let guilds_for_fetch = Arc::clone(&guilds);
    let lookup = MetaLookup::new(
        LookupParams::Channel {
            channel_id: "1".to_string(),
        },
        move |_params| {
            let guilds = Arc::clone(&guilds_for_fetch);
            async move {
                // Resolving the channel resolves its guild on the other
                // cache first; both entries are visible once the outer
                // call returns.
                let guild_lookup =
                    MetaLookup::new(
                        LookupParams::Guild {
                            guild_id: "guild:9".to_string(),
                        },
                        |_params| {
                            async {
                                let mut attrs = AttrMap::new();
                                attrs.insert("Name".to_string(), "Test Guild".to_string());
                                Ok(attrs)
                            }
                            .boxed()
                        },
                    );
                guilds
                    .check_and_update("guild:9", guild_lookup)
                    .await
                    .map_err(|e| chronicle::FetchError::Unreachable(e.to_string()))?;

                let mut attrs = AttrMap::new();
                attrs.insert("GuildID".to_string(), "guild:9".to_string());
                attrs.insert("Name".to_string(), "general".to_string());
                Ok(attrs)
            }
            .boxed()
        },
    );

    channels.check_and_update("channel:1", lookup).await.unwrap();

    let channel = channels.retrieve("channel:1").unwrap();
    assert_eq!(channel.get("GuildID").map(String::as_str), Some("guild:9"));
    let guild = guilds.retrieve("guild:9").unwrap();
    assert_eq!(guild.get("Name").map(String::as_str), Some("Test Guild"));
}
