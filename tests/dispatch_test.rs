//! Integration tests for the dispatcher and outcome accounting
//!
//! Records go in as raw strings, results are read back through `Accounting`.

use async_trait::async_trait;
use dispatchbox::handlers::{
    handler_fn, FailurePayload, JobError, JobRecord, JobRegistry, FAILED_AT_FORMAT,
    MISSING_JOB_EXCEPTION,
};
use dispatchbox::keys::KeyNamer;
use dispatchbox::store::{ListStore, MemoryStore, StoreError};
use dispatchbox::worker::{Accounting, AccountingError, DispatchError, Dispatcher, Outcome, Stats};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn send_email_registry(seen: Arc<Mutex<Vec<Vec<Value>>>>) -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register(
        "mail",
        Some("send_email"),
        handler_fn("send_email", move |args: Vec<Value>| {
            seen.lock().unwrap().push(args);
            async { Ok(()) }
        }),
    );
    registry
}

fn create_test_dispatcher(
    store: Arc<dyn ListStore>,
    registry: JobRegistry,
) -> (Dispatcher, Accounting) {
    let accounting = Accounting::new(store, KeyNamer::default());
    (Dispatcher::new(Arc::new(registry), accounting.clone()), accounting)
}

async fn only_failure(accounting: &Accounting) -> FailurePayload {
    assert_eq!(accounting.failure_count().await.unwrap(), 1);
    accounting.failures(0, 10).await.unwrap().remove(0)
}

#[tokio::test]
async fn test_successful_job_updates_processed_counters() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, accounting) =
        create_test_dispatcher(store.clone(), send_email_registry(seen.clone()));

    let raw = JobRecord::new("send_email", vec![json!("a@example.com")])
        .encode()
        .unwrap();
    let outcome = dispatcher.perform("mail", &raw).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(*seen.lock().unwrap(), vec![vec![json!("a@example.com")]]);
    assert_eq!(
        accounting.stats(None).await.unwrap(),
        Stats { processed: 1, failed: 0 }
    );
    assert_eq!(
        accounting.stats(Some("send_email")).await.unwrap(),
        Stats { processed: 1, failed: 0 }
    );
    assert_eq!(accounting.failure_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_job_is_recorded_as_missing() {
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, accounting) =
        create_test_dispatcher(store, send_email_registry(Arc::default()));

    let raw = json!({"class": "unknown_job", "args": []}).to_string();
    let outcome = dispatcher.perform("mail", &raw).await.unwrap();

    let failure = outcome.failure().unwrap();
    assert!(failure.is_missing_job());

    assert_eq!(
        accounting.stats(None).await.unwrap(),
        Stats { processed: 0, failed: 1 }
    );
    assert_eq!(accounting.stats(Some("unknown_job")).await.unwrap().failed, 1);

    let payload = only_failure(&accounting).await;
    assert_eq!(payload.exception, MISSING_JOB_EXCEPTION);
    assert!(payload.error.contains("unknown_job"));
    assert_eq!(payload.worker, "unknown_job");
    assert_eq!(payload.queue, "mail");
    assert_eq!(payload.payload, json!({"class": "unknown_job", "args": []}));
}

#[tokio::test]
async fn test_failure_log_keeps_entry_verbatim() {
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, accounting) =
        create_test_dispatcher(store, send_email_registry(Arc::default()));

    let entry = json!({"class": "unknown_job", "args": [1], "id": "abc-123", "queue": "mail"});
    dispatcher.perform("mail", &entry.to_string()).await.unwrap();

    let bare = json!({"class": "also_unknown"});
    dispatcher.perform("mail", &bare.to_string()).await.unwrap();

    let failures = accounting.failures(0, 10).await.unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].payload, entry);
    assert_eq!(failures[1].payload, bare);
    assert!(failures[1].payload.get("args").is_none());
}

#[tokio::test]
async fn test_handler_error_is_recorded_with_its_kind() {
    let store = Arc::new(MemoryStore::new());
    let mut registry = JobRegistry::new();
    registry.register(
        "mail",
        Some("send_email"),
        handler_fn("send_email", |_| async { Err(JobError::new("RuntimeError", "boom")) }),
    );
    let (dispatcher, accounting) = create_test_dispatcher(store, registry);

    let raw = json!({"class": "send_email", "args": ["a@example.com"]}).to_string();
    let outcome = dispatcher.perform("mail", &raw).await.unwrap();
    assert!(!outcome.is_success());

    assert_eq!(accounting.stats(None).await.unwrap().failed, 1);
    assert_eq!(accounting.stats(Some("send_email")).await.unwrap().failed, 1);

    let payload = only_failure(&accounting).await;
    assert_eq!(payload.exception, "RuntimeError");
    assert_eq!(payload.error, "boom");
    assert_eq!(payload.payload["args"], json!(["a@example.com"]));
    assert!(!payload.backtrace.is_empty());
    assert!(chrono::NaiveDateTime::parse_from_str(&payload.failed_at, FAILED_AT_FORMAT).is_ok());
}

#[tokio::test]
async fn test_panicking_handler_does_not_escape() {
    let store = Arc::new(MemoryStore::new());
    let mut registry = JobRegistry::new();
    registry.register("q", Some("crash"), Arc::new(Crash));
    let (dispatcher, accounting) = create_test_dispatcher(store, registry);

    let raw = json!({"class": "crash"}).to_string();
    let outcome = dispatcher.perform("q", &raw).await.unwrap();

    assert_eq!(outcome.failure().unwrap().exception(), "panic");
    let payload = only_failure(&accounting).await;
    assert_eq!(payload.error, "disk on fire");
}

struct Crash;

#[async_trait]
impl dispatchbox::handlers::JobHandler for Crash {
    async fn perform(&self, _args: Vec<Value>) -> Result<(), JobError> {
        panic!("disk on fire")
    }
}

#[tokio::test]
async fn test_last_registration_wins() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = JobRegistry::new();
    for version in ["first", "second"] {
        let calls = calls.clone();
        registry.register(
            "q",
            Some("job"),
            handler_fn("job", move |_| {
                calls.lock().unwrap().push(version);
                async { Ok(()) }
            }),
        );
    }
    let (dispatcher, _accounting) = create_test_dispatcher(Arc::new(MemoryStore::new()), registry);

    dispatcher
        .perform("q", &json!({"class": "job"}).to_string())
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["second"]);
}

#[tokio::test]
async fn test_job_registered_on_other_queue_is_missing() {
    let (dispatcher, accounting) = create_test_dispatcher(
        Arc::new(MemoryStore::new()),
        send_email_registry(Arc::default()),
    );

    let raw = json!({"class": "send_email", "args": []}).to_string();
    let outcome = dispatcher.perform("default", &raw).await.unwrap();

    assert!(matches!(outcome, Outcome::Failed(ref f) if f.is_missing_job()));
    assert_eq!(only_failure(&accounting).await.queue, "default");
}

#[tokio::test]
async fn test_malformed_record_records_nothing() {
    let (dispatcher, accounting) = create_test_dispatcher(
        Arc::new(MemoryStore::new()),
        send_email_registry(Arc::default()),
    );

    for raw in ["not json", r#"{"args": [1]}"#] {
        let err = dispatcher.perform("mail", raw).await.unwrap_err();
        assert!(matches!(err, DispatchError::Protocol { .. }));
    }

    assert_eq!(accounting.stats(None).await.unwrap(), Stats::default());
    assert_eq!(accounting.failure_count().await.unwrap(), 0);
}

/// Store whose counters always fail, lists work normally
struct BrokenCounters {
    inner: MemoryStore,
}

#[async_trait]
impl ListStore for BrokenCounters {
    async fn push_tail(&self, key: &str, value: String) -> Result<usize, StoreError> {
        self.inner.push_tail(key, value).await
    }

    async fn pop_head(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.pop_head(key).await
    }

    async fn increment(&self, _key: &str) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("counters offline".to_string()))
    }

    async fn counter(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.counter(key).await
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.len(key).await
    }

    async fn range(&self, key: &str, start: usize, limit: usize) -> Result<Vec<String>, StoreError> {
        self.inner.range(key, start, limit).await
    }
}

#[tokio::test]
async fn test_accounting_error_surfaces_after_all_writes() {
    let store = Arc::new(BrokenCounters {
        inner: MemoryStore::new(),
    });
    let mut registry = JobRegistry::new();
    registry.register("q", None, dispatchbox::handlers::builtin("fail").unwrap());
    let (dispatcher, accounting) = create_test_dispatcher(store, registry);

    let raw = json!({"class": "fail", "args": ["nope"]}).to_string();
    let err = dispatcher.perform("q", &raw).await.unwrap_err();

    match err {
        DispatchError::Accounting { class, source, .. } => {
            assert_eq!(class, "fail");
            assert!(matches!(
                source,
                AccountingError::Store(StoreError::Unavailable(_))
            ));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failure log write is still attempted
    let payload = only_failure(&accounting).await;
    assert_eq!(payload.error, "nope");
}
