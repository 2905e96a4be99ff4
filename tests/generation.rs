//! End-to-end generation over a values tree on disk

use std::fs;
use std::path::{Path, PathBuf};

use application_values::{
    GenerateError, GeneratorConfig, Generator, OutputLayout, ServiceKey, ValuesStatus,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const STAGING_GLOBAL: &str = r#"
replicaCount: 1
environmentVariables:
  LOG_LEVEL: info
spinnaker:
  templateId: deploy-v2
  triggerRegexp: "^v[0-9.]+$"
  chart:
    name: web
    parameters:
      kubernetesAccount: staging-cluster
"#;

struct Fixture {
    _dir: TempDir,
    config: GeneratorConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("values");
        fs::create_dir_all(&source).unwrap();
        let mut config = GeneratorConfig::new(&source, dir.path().join("out"));
        config.workers = 4;
        OutputLayout::new(&config.destination_dir).create_dirs().unwrap();
        Self { _dir: dir, config }
    }

    fn file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.config.source_dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn out(&self, relative: &str) -> PathBuf {
        self.config.destination_dir.join(relative)
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_service_inherits_namespace_globals() {
    let fx = Fixture::new();
    fx.file("staging/global.yaml", STAGING_GLOBAL);
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");

    let summary = Generator::new(&fx.config).run().unwrap();
    assert_eq!(summary.services.len(), 1);
    assert_eq!(summary.values_written(), 1);

    assert_eq!(
        fs::read_to_string(fx.out("resources/checkout-staging.yaml")).unwrap(),
        "replicaCount: 3\nenvironmentVariables:\n  LOG_LEVEL: info\n"
    );

    assert_eq!(
        read_json(&fx.out("applications/checkout.json")),
        json!({
            "name": "checkout",
            "accounts": "staging-cluster",
            "cloudProviders": "kubernetes"
        })
    );

    let pipeline = read_json(&fx.out("pipelines/checkout-staging.json"));
    assert_eq!(pipeline["application"], "checkout");
    assert_eq!(pipeline["name"], "staging");
    assert_eq!(pipeline["template"]["reference"], "spinnaker://deploy-v2");
    assert_eq!(pipeline["parameters"]["serviceName"], "checkout");
    assert_eq!(pipeline["parameters"]["namespace"], "staging");
    assert_eq!(pipeline["parameters"]["triggerRegexp"], "^v[0-9.]+$");
    assert_eq!(pipeline["parameters"]["kubernetesAccount"], "staging-cluster");
}

#[test]
fn test_global_files_produce_no_artifacts() {
    let fx = Fixture::new();
    fx.file("staging/global.yaml", STAGING_GLOBAL);
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");

    let summary = Generator::new(&fx.config).run().unwrap();
    let keys: Vec<_> = summary.services.iter().map(|s| s.key.clone()).collect();
    assert_eq!(keys, vec![ServiceKey::new("staging", "checkout")]);

    assert!(!fx.out("resources/global-staging.yaml").exists());
    assert!(!fx.out("applications/global.json").exists());
    assert!(!fx.out("pipelines/global-staging.json").exists());
}

#[test]
fn test_namespace_without_globals() {
    let fx = Fixture::new();
    fx.file("dev/search.yml", "replicaCount: 2\n");

    Generator::new(&fx.config).run().unwrap();
    assert_eq!(
        fs::read_to_string(fx.out("resources/search-dev.yaml")).unwrap(),
        "replicaCount: 2\nenvironmentVariables: {}\n"
    );
}

#[test]
fn test_globals_do_not_leak_across_namespaces() {
    let fx = Fixture::new();
    fx.file("staging/global.yaml", STAGING_GLOBAL);
    fx.file("production/global.yaml", "replicaCount: 5\n");
    fx.file("staging/checkout.yaml", "{}\n");
    fx.file("production/checkout.yaml", "{}\n");

    Generator::new(&fx.config).run().unwrap();

    let staging = fs::read_to_string(fx.out("resources/checkout-staging.yaml")).unwrap();
    let production = fs::read_to_string(fx.out("resources/checkout-production.yaml")).unwrap();
    assert_eq!(staging, "replicaCount: 1\nenvironmentVariables:\n  LOG_LEVEL: info\n");
    assert_eq!(production, "replicaCount: 5\nenvironmentVariables: {}\n");
}

#[test]
fn test_one_application_per_service_name() {
    let fx = Fixture::new();
    fx.file("staging/global.yaml", STAGING_GLOBAL);
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");
    fx.file(
        "production/checkout.yaml",
        "spinnaker:\n  chart:\n    parameters:\n      kubernetesAccount: prod-cluster\n",
    );

    let summary = Generator::new(&fx.config).run().unwrap();
    assert_eq!(summary.services.len(), 2);
    assert_eq!(summary.applications_written(), 1);

    let apps: Vec<_> = fs::read_dir(fx.out("applications")).unwrap().collect();
    assert_eq!(apps.len(), 1);
    let account = read_json(&fx.out("applications/checkout.json"))["accounts"].clone();
    assert!(account == "staging-cluster" || account == "prod-cluster");

    assert!(fx.out("pipelines/checkout-staging.json").exists());
    assert!(fx.out("pipelines/checkout-production.json").exists());
}

#[test]
fn test_existing_application_is_kept() {
    let fx = Fixture::new();
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");
    let existing = fx.out("applications/checkout.json");
    fs::write(&existing, "{\"name\":\"checkout\",\"email\":\"owner@example.com\"}\n").unwrap();

    let summary = Generator::new(&fx.config).run().unwrap();
    assert!(!summary.services[0].application.is_written());
    assert_eq!(
        fs::read_to_string(&existing).unwrap(),
        "{\"name\":\"checkout\",\"email\":\"owner@example.com\"}\n"
    );
}

#[test]
fn test_many_services_single_worker_and_many_workers_agree() {
    let mut outputs = Vec::new();
    for workers in [1, 8] {
        let mut fx = Fixture::new();
        fx.config.workers = workers;
        fx.file("staging/global.yaml", STAGING_GLOBAL);
        for i in 0..20 {
            fx.file(&format!("staging/svc{:02}.yaml", i), &format!("replicaCount: {}\n", i));
        }

        let summary = Generator::new(&fx.config).run().unwrap();
        assert_eq!(summary.services.len(), 20);

        let mut files: Vec<(String, String)> = fs::read_dir(fx.out("resources"))
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path();
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                (name, fs::read_to_string(&path).unwrap())
            })
            .collect();
        files.sort();
        outputs.push(files);
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_nested_namespace_directories() {
    let fx = Fixture::new();
    fx.file("team-a/staging/global.yaml", "replicaCount: 2\n");
    fx.file("team-a/staging/api.yaml", "{}\n");

    let summary = Generator::new(&fx.config).run().unwrap();
    assert_eq!(summary.services[0].key, ServiceKey::new("team-a/staging", "api"));
    assert_eq!(
        fs::read_to_string(fx.out("resources/api-team-a-staging.yaml")).unwrap(),
        "replicaCount: 2\nenvironmentVariables: {}\n"
    );
}

#[test]
fn test_root_level_files_are_skipped() {
    let fx = Fixture::new();
    fx.file("README.yaml", "replicaCount: 1\n");
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");

    let summary = Generator::new(&fx.config).run().unwrap();
    assert_eq!(summary.services.len(), 1);
    assert_eq!(summary.skipped, vec![fx.config.source_dir.join("README.yaml")]);
}

#[test]
fn test_other_extensions_are_ignored() {
    let fx = Fixture::new();
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");
    fx.file("staging/notes.txt", "not yaml: [");

    let summary = Generator::new(&fx.config).run().unwrap();
    assert_eq!(summary.services.len(), 1);
}

#[test]
fn test_malformed_service_aborts_run() {
    let fx = Fixture::new();
    let broken = fx.file("staging/broken.yaml", "replicaCount: [3\n");

    let err = Generator::new(&fx.config).run().unwrap_err();
    assert!(matches!(err, GenerateError::Source { .. }));
    assert!(err.to_string().contains(&broken.display().to_string()));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_malformed_global_aborts_before_any_service() {
    let fx = Fixture::new();
    fx.file("staging/global.yaml", "replicaCount: [1\n");
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");

    let err = Generator::new(&fx.config).run().unwrap_err();
    assert!(matches!(err, GenerateError::Globals(_)));
    assert!(!fx.out("resources/checkout-staging.yaml").exists());
    assert!(!fx.out("pipelines/checkout-staging.json").exists());
}

#[test]
fn test_wrong_type_names_service_and_path() {
    let fx = Fixture::new();
    let path = fx.file("staging/checkout.yaml", "replicaCount: three\n");

    let err = Generator::new(&fx.config).run().unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("staging/checkout: "), "{}", message);
    assert!(message.contains(&path.display().to_string()), "{}", message);
}

#[test]
fn test_missing_output_directory_is_a_filesystem_error() {
    let fx = Fixture::new();
    fx.file("staging/checkout.yaml", "replicaCount: 3\n");
    fs::remove_dir_all(fx.out("pipelines")).unwrap();

    let err = Generator::new(&fx.config).run().unwrap_err();
    assert!(matches!(err, GenerateError::Artifact { .. }));
    assert_eq!(err.exit_code(), 2);

    // values and application were written before the failing step
    assert!(fx.out("resources/checkout-staging.yaml").exists());
}

#[test]
fn test_progress_callback_sees_every_service() {
    let fx = Fixture::new();
    fx.file("staging/a.yaml", "{}\n");
    fx.file("staging/b.yaml", "{}\n");
    fx.file("production/a.yaml", "{}\n");

    let seen = std::sync::Mutex::new(Vec::new());
    let summary = Generator::new(&fx.config)
        .run_with(|outcome| seen.lock().unwrap().push(outcome.key.to_string()))
        .unwrap();

    let mut seen = seen.into_inner().unwrap();
    seen.sort();
    assert_eq!(seen, vec!["production/a", "staging/a", "staging/b"]);
    assert!(summary
        .services
        .iter()
        .all(|s| matches!(s.values, ValuesStatus::Written(_))));
}

#[test]
fn test_first_failure_stops_remaining_services() {
    let mut fx = Fixture::new();
    fx.config.workers = 1;
    // sorts before every valid service
    fx.file("staging/a-broken.yaml", "replicaCount: [\n");
    for i in 0..50 {
        fx.file(&format!("staging/svc{:02}.yaml", i), "replicaCount: 1\n");
    }

    let err = Generator::new(&fx.config).run().unwrap_err();
    assert!(matches!(err, GenerateError::Source { .. }));
    assert!(err.to_string().starts_with("staging/a-broken: "));
    assert_eq!(fs::read_dir(fx.out("pipelines")).unwrap().count(), 0);
    assert_eq!(fs::read_dir(fx.out("resources")).unwrap().count(), 0);
}

#[test]
fn test_colliding_artifact_names_are_rejected() {
    let fx = Fixture::new();
    fx.file("a-b/c/api.yaml", "replicaCount: 1\n");
    fx.file("a/b-c/api.yaml", "replicaCount: 2\n");

    let err = Generator::new(&fx.config).run().unwrap_err();
    match &err {
        GenerateError::DuplicateArtifact { stem, first, second } => {
            assert_eq!(stem, "api-a-b-c");
            let mut keys = vec![first.to_string(), second.to_string()];
            keys.sort();
            assert_eq!(keys, vec!["a-b/c/api", "a/b-c/api"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_same_service_in_many_namespaces_is_not_a_collision() {
    let fx = Fixture::new();
    fx.file("staging/api.yaml", "{}\n");
    fx.file("production/api.yaml", "{}\n");
    fx.file("team/staging/api.yaml", "{}\n");

    let summary = Generator::new(&fx.config).run().unwrap();
    assert_eq!(summary.services.len(), 3);
}
