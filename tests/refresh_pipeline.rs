//! Refresh pipeline tests
//!
//! Fetch-then-store cycles against a real temp-file SQLite store and a
//! scripted remote source, including the full write/read-back round
//! trip through the loader.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tempfile::TempDir;

use feedcache::data::{Database, FeedQuery, JsonRecordDecoder, Post, PostAuthor, SqliteCursorSource};
use feedcache::error::AppError;
use feedcache::remote::RemoteSource;
use feedcache::service::loader::ResultObserver;
use feedcache::service::{CachedLoader, DEFAULT_BATCH_SIZE, RefreshPipeline, ResultList, Trigger};

fn post(id: &str, minutes_ago: i64) -> Post {
    Post {
        id: id.to_string(),
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        author: PostAuthor {
            id: format!("author-{id}"),
            handle: format!("user{id}@example.com"),
            display_name: None,
            avatar_url: None,
        },
        text: format!("post number {id}"),
        media: Vec::new(),
    }
}

/// Remote source scripted by the test: serves a fixed batch or fails,
/// and records every requested limit.
#[derive(Clone, Default)]
struct ScriptedRemote {
    posts: Arc<Mutex<Vec<Post>>>,
    fail: Arc<AtomicBool>,
    requested: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedRemote {
    fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: Arc::new(Mutex::new(posts)),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        let remote = Self::default();
        remote.fail.store(true, Ordering::SeqCst);
        remote
    }

    fn requested(&self) -> Vec<usize> {
        self.requested.lock().unwrap().clone()
    }
}

impl RemoteSource for ScriptedRemote {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Post>, AppError> {
        self.requested.lock().unwrap().push(limit);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Auth);
        }
        Ok(self.posts.lock().unwrap().iter().take(limit).cloned().collect())
    }
}

async fn create_test_db() -> (Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::connect(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    (Arc::new(db), temp_dir)
}

#[derive(Clone, Default)]
struct Recorder {
    deliveries: Arc<Mutex<Vec<Vec<Post>>>>,
}

impl ResultObserver for Recorder {
    fn on_result(&mut self, result: ResultList) {
        self.deliveries.lock().unwrap().push(result.to_vec());
    }
}

#[tokio::test]
async fn refresh_stores_full_batch_and_signals_done() {
    let (db, _temp_dir) = create_test_db().await;
    let posts: Vec<Post> = (0..50).map(|i| post(&format!("{i:03}"), i)).collect();
    let pipeline = RefreshPipeline::new(ScriptedRemote::with_posts(posts), Arc::clone(&db));

    let mut done = pipeline.subscribe_done();
    let mut changes = db.subscribe_changes();

    let written = pipeline.refresh(50).await.unwrap();

    assert_eq!(written, 50);
    assert_eq!(db.count_posts().await.unwrap(), 50);
    // One bulk upsert for the whole batch
    assert_eq!(*changes.borrow_and_update(), 1);
    // Busy indicator cleared after the upsert returned
    assert!(done.try_recv().is_ok());
}

#[tokio::test]
async fn failed_refresh_leaves_store_unchanged_but_signals_done() {
    let (db, _temp_dir) = create_test_db().await;
    let pipeline = RefreshPipeline::new(ScriptedRemote::failing(), Arc::clone(&db));

    let mut done = pipeline.subscribe_done();
    let changes = db.subscribe_changes();

    let result = pipeline.refresh(50).await;

    assert!(matches!(result, Err(AppError::Auth)));
    assert_eq!(db.count_posts().await.unwrap(), 0);
    assert_eq!(*changes.borrow(), 0);
    // The done signal fires on failure too
    assert!(done.try_recv().is_ok());
}

#[tokio::test]
async fn done_signal_reaches_every_subscriber() {
    let (db, _temp_dir) = create_test_db().await;
    let pipeline = RefreshPipeline::new(ScriptedRemote::default(), db);

    let mut first = pipeline.subscribe_done();
    let mut second = pipeline.subscribe_done();

    pipeline.refresh(10).await.unwrap();

    assert!(first.try_recv().is_ok());
    assert!(second.try_recv().is_ok());
}

#[tokio::test]
async fn refresh_trigger_uses_default_batch_size() {
    let (db, _temp_dir) = create_test_db().await;
    let remote = ScriptedRemote::with_posts(vec![post("1", 1)]);
    let pipeline = RefreshPipeline::new(remote.clone(), db);

    pipeline.handle(Trigger::Refresh).await.unwrap();

    assert_eq!(remote.requested(), vec![DEFAULT_BATCH_SIZE]);
}

#[tokio::test]
async fn refresh_trigger_uses_configured_batch_size() {
    let (db, _temp_dir) = create_test_db().await;
    let remote = ScriptedRemote::with_posts(vec![post("1", 1)]);
    let pipeline = RefreshPipeline::new(remote.clone(), db).with_batch_size(7);

    pipeline.handle(Trigger::Refresh).await.unwrap();

    assert_eq!(remote.requested(), vec![7]);
}

#[tokio::test]
async fn backfill_trigger_fails_loudly() {
    let (db, _temp_dir) = create_test_db().await;
    let remote = ScriptedRemote::default();
    let pipeline = RefreshPipeline::new(remote.clone(), db);

    let result = pipeline
        .handle(Trigger::Backfill {
            newest_id: "900".to_string(),
            oldest_id: "100".to_string(),
        })
        .await;

    assert!(matches!(result, Err(AppError::Unsupported(_))));
    // The reserved trigger never touches the remote source
    assert!(remote.requested().is_empty());
}

#[tokio::test]
async fn refreshed_posts_round_trip_through_the_loader() {
    let (db, _temp_dir) = create_test_db().await;
    let posts = vec![post("newest", 1), post("middle", 30), post("oldest", 90)];
    let pipeline = RefreshPipeline::new(
        ScriptedRemote::with_posts(posts.clone()),
        Arc::clone(&db),
    );

    pipeline.refresh(DEFAULT_BATCH_SIZE).await.unwrap();

    let recorder = Recorder::default();
    let mut loader = CachedLoader::new(
        SqliteCursorSource::new(Arc::clone(&db)),
        JsonRecordDecoder,
        FeedQuery::default(),
        recorder.clone(),
    );
    loader.start().unwrap();
    loader.drive().await.unwrap();

    let deliveries = recorder.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    // Store serves newest first; decoded posts equal the originals
    assert_eq!(deliveries[0], posts);
}

#[tokio::test]
async fn second_refresh_updates_existing_rows() {
    let (db, _temp_dir) = create_test_db().await;
    let remote = ScriptedRemote::with_posts(vec![post("1", 10)]);
    let pipeline = RefreshPipeline::new(remote.clone(), Arc::clone(&db));

    pipeline.refresh(10).await.unwrap();

    let mut edited = post("1", 10);
    edited.text = "edited text".to_string();
    *remote.posts.lock().unwrap() = vec![edited.clone(), post("2", 5)];

    pipeline.refresh(10).await.unwrap();

    assert_eq!(db.count_posts().await.unwrap(), 2);

    let recorder = Recorder::default();
    let mut loader = CachedLoader::new(
        SqliteCursorSource::new(Arc::clone(&db)),
        JsonRecordDecoder,
        FeedQuery::default(),
        recorder.clone(),
    );
    loader.start().unwrap();
    loader.drive().await.unwrap();

    let deliveries = recorder.deliveries.lock().unwrap();
    let texts: Vec<&str> = deliveries[0].iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["post number 2", "edited text"]);
}
