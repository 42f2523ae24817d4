//! End-to-end behaviour of the collections against the in-memory store

use rand::distributions::Alphanumeric;
use rand::Rng;
use redis_collections::{
    impl_record, open_store, shard_of, CollectionError, CollectionsConfig, ListEntry,
    MemoryStore, ObjectHash, ScoredList, ShardedBucket, Store,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
struct Article {
    title: String,
    views: u64,
    rating: f32,
    published: bool,
    tags: Vec<String>,
}

impl_record!(Article {
    title,
    views,
    rating => "stars",
    published,
});

fn article(title: &str, views: u64) -> Article {
    Article {
        title: title.to_string(),
        views,
        rating: 4.5,
        published: true,
        tags: vec!["ignored".to_string()],
    }
}

#[test]
fn test_object_hash_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let articles = ObjectHash::new(store.clone(), "articles");

    for i in 0..10 {
        articles
            .set(&format!("a{}", i), &article(&format!("post {}", i), i))
            .unwrap();
    }
    assert_eq!(articles.size().unwrap(), 10);

    let mut a3 = Article::default();
    articles.scan(&mut a3, "a3").unwrap();
    assert_eq!(a3.title, "post 3");
    assert_eq!(a3.views, 3);
    assert_eq!(a3.rating, 4.5);
    assert!(a3.published);
    // Unmapped field does not survive the trip
    assert!(a3.tags.is_empty());

    articles.incr("a3", "views", 100).unwrap();
    assert_eq!(articles.get_field("a3", "views").unwrap(), "103");

    articles.del::<Article, _, _>(["a0", "a1", "a2"]).unwrap();
    assert_eq!(articles.size().unwrap(), 7);
    assert!(!articles.contains("a0").unwrap());

    let ids: Vec<String> = (0..10).map(|i| format!("a{}", i)).collect();
    let found: HashMap<String, Article> = articles.range(&ids).unwrap();
    assert_eq!(found.len(), 7);
    assert_eq!(found["a3"].views, 103);
    assert!(!found.contains_key("a1"));
}

#[test]
fn test_object_hashes_are_isolated_by_key() {
    let store = Arc::new(MemoryStore::new());
    let left = ObjectHash::new(store.clone(), "left");
    let right = ObjectHash::new(store, "right");

    left.set("1", &article("l", 1)).unwrap();
    assert!(left.contains("1").unwrap());
    assert!(!right.contains("1").unwrap());
    assert_eq!(right.size().unwrap(), 0);
}

#[test]
fn test_list_example_paging() {
    let list = ScoredList::new(Arc::new(MemoryStore::new()), "timeline");
    list.set("a", 10).unwrap();
    list.set("b", 20).unwrap();
    list.set("c", 30).unwrap();

    let mut it = list.range_with_score(0, 0, 0, 2, false).unwrap();
    assert_eq!(it.count(), 3);
    assert_eq!(
        it.next_page().unwrap(),
        vec![ListEntry::new("a", 10), ListEntry::new("b", 20)]
    );
    assert_eq!(it.next_page().unwrap(), vec![ListEntry::new("c", 30)]);
    assert!(matches!(
        it.next_page(),
        Err(CollectionError::IteratorExhausted)
    ));

    assert_eq!(list.batch_contains(["a", "z"]).unwrap(), vec!["a".to_string()]);
}

#[test]
fn test_list_pages_cover_large_range() {
    let list = ScoredList::new(Arc::new(MemoryStore::new()), "big");
    for i in 1..=95 {
        list.set(&format!("m{}", i), i).unwrap();
    }

    let mut it = list.range_with_score(0, 0, 0, 10, true).unwrap();
    let pages: Vec<Vec<ListEntry>> = it.pages().map(|p| p.unwrap()).collect();
    assert_eq!(pages.len(), 10);
    assert_eq!(pages[0][0], ListEntry::new("m95", 95));
    assert_eq!(pages[9].len(), 5);

    let scores: Vec<i64> = pages.iter().flatten().map(|e| e.score).collect();
    let mut sorted = scores.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(scores, sorted);
}

#[test]
fn test_bucket_routing_spreads_members() {
    let store = Arc::new(MemoryStore::new());
    let buckets = ShardedBucket::new(store.clone()).unwrap();
    buckets.create("users", 5).unwrap();

    let mut rng = rand::thread_rng();
    let mut per_shard: HashMap<String, usize> = HashMap::new();
    for _ in 0..5000 {
        let member: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let key = buckets.bucket_key("users", &member).unwrap();
        assert_eq!(key, format!("users#{}", shard_of(&member, 5).unwrap()));
        *per_shard.entry(key).or_default() += 1;
    }

    assert_eq!(per_shard.len(), 5);
    for (shard, hits) in &per_shard {
        // Expect ~1000 each; a starved shard would be far below
        assert!(*hits > 700, "{} only got {} members", shard, hits);
    }

    // Routing goes through the cache after create
    let before = store.round_trips();
    buckets.bucket_key("users", "anyone").unwrap();
    assert_eq!(store.round_trips(), before);
}

#[test]
fn test_built_from_config() {
    let config = CollectionsConfig::from_toml_str(
        r#"
        meta_cache_capacity = 4
        lock_ttl_ms = 1000

        [store]
        type = "InMemory"
        "#,
    )
    .unwrap();
    let store = open_store(&config.store).unwrap();
    let buckets = ShardedBucket::with_config(store.clone(), &config).unwrap();

    buckets.create("orders", 2).unwrap();
    assert!(store.exists("orders#bucket_index").unwrap());
    assert_eq!(buckets.size("orders").unwrap(), 0);
    assert!(matches!(
        buckets.create("orders", 2),
        Err(CollectionError::AlreadyExists(_))
    ));
}
