//! Generation against a store of previously published values

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use application_values::remote::{DirectoryStore, MemoryStore};
use application_values::{
    ChangeDetector, ConfigLayer, FingerprintAlgorithm, GenerateError, GeneratorConfig, Generator,
    OutputLayout, RemoteEntry, RemoteError, RemoteKey, RemoteStore, ServiceKey, ValuesStatus,
};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn config(dir: &TempDir) -> GeneratorConfig {
    let mut config = GeneratorConfig::new(dir.path().join("values"), dir.path().join("out"));
    config.workers = 2;
    OutputLayout::new(&config.destination_dir).create_dirs().unwrap();
    config
}

/// Copy generated values into a bucket-shaped mirror, as the publish step would
fn publish(out: &Path, mirror: &Path, prefix: &str) {
    let target = mirror.join(prefix);
    fs::create_dir_all(&target).unwrap();
    for entry in fs::read_dir(out.join("resources")).unwrap() {
        let path = entry.unwrap().path();
        fs::copy(&path, target.join(path.file_name().unwrap())).unwrap();
    }
}

#[test]
fn test_second_run_against_published_mirror_is_unchanged() {
    let dir = TempDir::new().unwrap();
    write(&dir.path().join("values"), "staging/global.yaml", "replicaCount: 1\n");
    write(&dir.path().join("values"), "staging/checkout.yaml", "replicaCount: 3\n");
    write(&dir.path().join("values"), "staging/search.yaml", "{}\n");

    let mirror = dir.path().join("mirror");
    let layer = ConfigLayer {
        values: Some(dir.path().join("values")),
        destination: Some(dir.path().join("out")),
        store: Some(mirror.display().to_string()),
        workers: Some(2),
        ..Default::default()
    };
    let config = GeneratorConfig::resolve(vec![layer]).unwrap();
    OutputLayout::new(&config.destination_dir).create_dirs().unwrap();

    let first = Generator::new(&config)
        .with_detector(config.change_detector().unwrap())
        .run()
        .unwrap();
    assert_eq!(first.values_written(), 2);

    publish(&config.destination_dir, &mirror, &config.prefix);
    fs::remove_dir_all(config.destination_dir.join("resources")).unwrap();
    fs::create_dir_all(config.destination_dir.join("resources")).unwrap();

    let second = Generator::new(&config)
        .with_detector(config.change_detector().unwrap())
        .run()
        .unwrap();
    assert_eq!(second.values_written(), 0);
    assert_eq!(second.values_unchanged(), 2);
    assert_eq!(fs::read_dir(config.destination_dir.join("resources")).unwrap().count(), 0);

    // descriptors are produced regardless
    for outcome in &second.services {
        assert!(outcome.pipeline.is_written());
    }
}

#[test]
fn test_only_drifted_service_is_written() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write(&config.source_dir, "staging/checkout.yaml", "replicaCount: 3\n");
    write(&config.source_dir, "staging/search.yaml", "replicaCount: 2\n");

    let store = MemoryStore::new();
    let checkout = ServiceKey::new("staging", "checkout");
    let search = ServiceKey::new("staging", "search");
    store.publish(
        &RemoteKey::for_service("values", &checkout),
        b"replicaCount: 3\nenvironmentVariables: {}\n",
        FingerprintAlgorithm::Md5,
    );
    store.publish(
        &RemoteKey::for_service("values", &search),
        b"replicaCount: 1\nenvironmentVariables: {}\n",
        FingerprintAlgorithm::Md5,
    );

    let detector = ChangeDetector::new(Box::new(store), "values");
    let summary = Generator::new(&config).with_detector(Some(detector)).run().unwrap();

    for outcome in &summary.services {
        if outcome.key == checkout {
            assert_eq!(outcome.values, ValuesStatus::Unchanged);
        } else {
            assert!(matches!(outcome.values, ValuesStatus::Written(_)));
        }
    }
    assert!(!config.destination_dir.join("resources/checkout-staging.yaml").exists());
    assert_eq!(
        fs::read_to_string(config.destination_dir.join("resources/search-staging.yaml")).unwrap(),
        "replicaCount: 2\nenvironmentVariables: {}\n"
    );
}

#[test]
fn test_unchanged_service_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.workers = 1;
    let store = Arc::new(MemoryStore::new());
    for i in 0..10 {
        let key = ServiceKey::new("staging", format!("svc{}", i));
        write(&config.source_dir, &format!("staging/svc{}.yaml", i), "{}\n");
        if i % 2 == 0 {
            store.publish(
                &RemoteKey::for_service("values", &key),
                b"replicaCount: 0\nenvironmentVariables: {}\n",
                FingerprintAlgorithm::Md5,
            );
        }
    }

    let detector = ChangeDetector::new(Box::new(Arc::clone(&store)), "values");
    let summary = Generator::new(&config).with_detector(Some(detector)).run().unwrap();
    assert_eq!(store.lookups(), 10);
    assert_eq!(summary.services.len(), 10);
    assert_eq!(summary.values_unchanged(), 5);
    assert_eq!(summary.values_written(), 5);
}

#[test]
fn test_sha256_mirror() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.fingerprint = FingerprintAlgorithm::Sha256;
    write(&config.source_dir, "staging/checkout.yaml", "replicaCount: 3\n");

    let mirror = dir.path().join("mirror");
    write(&mirror, "values/checkout-staging.yaml", "replicaCount: 3\nenvironmentVariables: {}\n");

    let detector = ChangeDetector::new(
        Box::new(DirectoryStore::new(mirror, FingerprintAlgorithm::Sha256)),
        "values",
    )
    .with_algorithm(FingerprintAlgorithm::Sha256);
    let summary = Generator::new(&config).with_detector(Some(detector)).run().unwrap();
    assert_eq!(summary.values_unchanged(), 1);
}

struct UnavailableStore;

impl RemoteStore for UnavailableStore {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        Err(RemoteError::Status {
            key: key.to_string(),
            status: 403,
        })
    }

    fn describe(&self) -> String {
        "unavailable".to_string()
    }
}

#[test]
fn test_store_failure_aborts_without_writing_values() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write(&config.source_dir, "staging/checkout.yaml", "replicaCount: 3\n");

    let detector = ChangeDetector::new(Box::new(UnavailableStore), "values");
    let err = Generator::new(&config)
        .with_detector(Some(detector))
        .run()
        .unwrap_err();

    assert!(matches!(err, GenerateError::Remote { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().starts_with("staging/checkout: "));
    assert!(!config.destination_dir.join("resources/checkout-staging.yaml").exists());
}

/// Every lookup exceeds its deadline
struct SlowStore {
    calls: Arc<AtomicUsize>,
}

impl RemoteStore for SlowStore {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RemoteError::Timeout {
            key: key.to_string(),
            after: Duration::from_secs(5),
        })
    }

    fn describe(&self) -> String {
        "slow".to_string()
    }
}

#[test]
fn test_timed_out_lookup_is_an_error_not_a_miss() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.workers = 1;
    write(&config.source_dir, "staging/checkout.yaml", "replicaCount: 3\n");

    let calls = Arc::new(AtomicUsize::new(0));
    let store = SlowStore {
        calls: Arc::clone(&calls),
    };
    let detector = ChangeDetector::new(Box::new(store), "values")
        .with_retries(1, Duration::from_millis(1));
    let err = Generator::new(&config)
        .with_detector(Some(detector))
        .run()
        .unwrap_err();

    assert!(matches!(
        err,
        GenerateError::Remote {
            source: RemoteError::Timeout { .. },
            ..
        }
    ));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!config.destination_dir.join("resources/checkout-staging.yaml").exists());
}
