use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::tempdir;
use tutor_bench::config::SessionConfig;
use tutor_bench::session::{PreplanSource, RunSummary, SessionRunner};

fn letters_config(output_dir: &Path, seed: u64) -> SessionConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
concept:
  kind: "letter_addition"
  letters: 4
model:
  kind: "discrete"
planner:
  kind: "forward_search"
  search:
    horizon: 1
    samples: [3]
  preplan:
    enabled: true
    depth: 2
    samples: 2
    cache_path: "{cache}"
learner:
  kind: "discrete"
session:
  seed: {seed}
  trials: 3
  max_actions: 9
  phase_len: 3
outputs:
  jsonl: "{jsonl}"
logging:
  enable_structured: false
"#,
        cache = output_dir.join("{run_id}").join("preplan.json").display(),
        jsonl = output_dir.join("{run_id}").join("session.jsonl").display(),
    );

    let mut cfg: SessionConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

fn run(config: SessionConfig) -> RunSummary {
    let outputs = config.resolved_outputs();
    SessionRunner::new(config, outputs)
        .run()
        .expect("session completes")
}

fn digest(path: &Path) -> String {
    let jsonl = fs::read_to_string(path).expect("jsonl readable");
    let mut hasher = Sha256::new();
    hasher.update(jsonl.as_bytes());
    hex::encode(hasher.finalize())
}

fn rows(path: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .expect("jsonl readable")
        .lines()
        .map(|line| serde_json::from_str(line).expect("row decodes to JSON"))
        .collect()
}

#[test]
fn session_smoke_test_is_deterministic() {
    let first_dir = tempdir().expect("temp dir");
    let second_dir = tempdir().expect("temp dir");

    let first = run(letters_config(first_dir.path(), 4242));
    let second = run(letters_config(second_dir.path(), 4242));

    assert_eq!(first.trials, 3);
    assert_eq!(first.rows_written, second.rows_written);
    assert_eq!(digest(&first.jsonl_path), digest(&second.jsonl_path));

    let rows = rows(&first.jsonl_path);
    assert_eq!(rows.len(), first.rows_written);
    let trials: Vec<&serde_json::Value> = rows.iter().filter(|r| r["kind"] == "trial").collect();
    assert_eq!(trials.len(), 3);
    let passed = trials.iter().filter(|r| r["passed"] == true).count();
    assert_eq!(passed, first.passed);
    for row in rows.iter().filter(|r| r["kind"] == "action") {
        assert_eq!(row["run_id"], "test_smoke");
        assert!(row["belief"]["true_probability"].is_f64());
    }
}

#[test]
fn different_seed_changes_the_log() {
    let first_dir = tempdir().expect("temp dir");
    let second_dir = tempdir().expect("temp dir");

    let first = run(letters_config(first_dir.path(), 1));
    let second = run(letters_config(second_dir.path(), 2));

    assert_ne!(digest(&first.jsonl_path), digest(&second.jsonl_path));
}

#[test]
fn preplan_cache_is_reused() {
    let dir = tempdir().expect("temp dir");

    let computed = run(letters_config(dir.path(), 77));
    let cache = dir.path().join("test_smoke").join("preplan.json");
    assert_eq!(
        computed.preplan,
        Some(PreplanSource::Computed {
            saved_to: Some(cache.clone())
        })
    );
    assert!(cache.exists());
    let computed_digest = digest(&computed.jsonl_path);

    let loaded = run(letters_config(dir.path(), 77));
    assert_eq!(loaded.preplan, Some(PreplanSource::Loaded(cache)));
    assert_eq!(digest(&loaded.jsonl_path), computed_digest);
}

#[test]
fn info_gain_session_on_number_game() {
    let dir = tempdir().expect("temp dir");
    let yaml = format!(
        r#"
run_id: "numbers"
concept:
  kind: "number_game"
  target: "mul7"
model:
  kind: "continuous"
  particle_cap: 4
planner:
  kind: "info_gain"
  actions: "quiz_example_only"
session:
  seed: 9
  trials: 1
  max_actions: 4
  phase_len: 2
outputs:
  jsonl: "{jsonl}"
"#,
        jsonl = dir.path().join("numbers.jsonl").display(),
    );
    let mut config: SessionConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    config.validate().expect("config validates");

    let summary = run(config);
    assert_eq!(summary.trials, 1);
    assert_eq!(summary.fallbacks, 0);
    assert!(summary.preplan.is_none());

    let rows = rows(&summary.jsonl_path);
    let actions: Vec<&serde_json::Value> =
        rows.iter().filter(|r| r["kind"] == "action").collect();
    assert!(!actions.is_empty());
    for action in actions {
        assert_eq!(action["action"], "EXAMPLE");
        assert_eq!(action["planner"], "info_gain");
    }
}
