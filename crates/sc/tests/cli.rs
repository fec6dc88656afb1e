//! End-to-end tests driving the `sc` binary against a temporary state file.
//!
//! Each test gets its own state, config and library files, so they can run
//! in parallel.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const LIBRARY: &str = r#"{
  "entities": [
    { "id": 1, "kind": "series", "name": "Mushishi", "resolutions": ["1080p"],
      "episode_count": 26, "added_at": "2024-01-01T00:00:00Z" },
    { "id": 2, "kind": "series", "name": "Kaiba", "resolutions": ["720p"],
      "episode_count": 12, "added_at": "2024-01-01T00:00:00Z" },
    { "id": 3, "kind": "series", "name": "Haibane Renmei", "resolutions": ["1080p"],
      "episode_count": 13, "added_at": "2024-01-01T00:00:00Z" },
    { "id": 10, "kind": "group", "name": "Monogatari", "resolutions": ["1080p"],
      "episode_count": 90, "added_at": "2024-01-01T00:00:00Z" }
  ],
  "users": [
    { "id": 1, "username": "alice", "watch": { "3": { "watched_episodes": 13 } } }
  ]
}"#;

const HD_UNWATCHED: &str = r#"{ "type": "And", "children": [
  { "type": "HasResolution", "parameters": { "resolution": "1080p" } },
  { "type": "Not", "children": [ { "type": "IsWatched" } ] }
] }"#;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            dir: TempDir::new().unwrap(),
        };
        fs::write(sandbox.path("library.json"), LIBRARY).unwrap();
        fs::write(
            sandbox.path("config.toml"),
            "[engine]\nworkers = 2\ntick_interval_secs = 0\n",
        )
        .unwrap();
        sandbox
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn sc(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_sc"))
            .arg("--state")
            .arg(self.path("state.json"))
            .arg("--config")
            .arg(self.path("config.toml"))
            .arg("--no-color")
            .args(args)
            .env_remove("SC_STATE")
            .env_remove("SC_CONFIG")
            .output()
            .unwrap()
    }

    fn sc_json(&self, args: &[&str]) -> Value {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let output = self.sc(&full);
        assert!(
            output.status.success(),
            "sc {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn add(&self, name: &str, tree: &Path, extra: &[&str]) -> String {
        let tree = tree.to_str().unwrap();
        let mut args = vec!["filters", "add", "--name", name, "--tree", tree];
        args.extend_from_slice(extra);
        let created = self.sc_json(&args);
        assert_eq!(created["status"], "created");
        created["id"].as_str().unwrap().to_string()
    }
}

fn ids(eval: &Value) -> Vec<u64> {
    eval["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_u64().unwrap())
        .collect()
}

#[test]
fn test_operators_json_lists_catalog() {
    let sandbox = Sandbox::new();
    let value = sandbox.sc_json(&["operators"]);
    let operators = value["operators"].as_array().unwrap();
    assert_eq!(operators.len(), 22);
    assert!(operators.iter().any(|op| op["kind"] == "WatchedWithinDays"
        && op["time_dependent"] == true
        && op["user_dependent"] == true));
}

#[test]
fn test_operators_table_by_category() {
    let sandbox = Sandbox::new();
    let output = sandbox.sc(&["operators", "--category", "logic"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("And"));
    assert!(text.contains("Not"));
    assert!(!text.contains("HasResolution"));
}

#[test]
fn test_filter_lifecycle_and_eval() {
    let sandbox = Sandbox::new();
    let tree = sandbox.write("hd.json", HD_UNWATCHED);
    let id = sandbox.add("HD unwatched", &tree, &[]);

    let listed = sandbox.sc_json(&["filters", "list"]);
    assert_eq!(listed["filters"][0]["id"], id.as_str());
    assert_eq!(listed["filters"][0]["user_dependent"], true);

    // Alice has watched Haibane Renmei; series only, so the group is excluded.
    let library = sandbox.path("library.json");
    let library = library.to_str().unwrap();
    let alice = sandbox.sc_json(&["eval", id.as_str(), "--library", library, "--user", "1"]);
    assert_eq!(alice["freshness"], "fresh");
    assert_eq!(alice["scope"], "user 1");
    assert_eq!(ids(&alice), vec![1]);

    // A viewer with no watch state sees nothing as watched.
    let other = sandbox.sc_json(&["eval", id.as_str(), "--library", library, "--user", "2"]);
    assert_eq!(ids(&other), vec![1, 3]);

    let shown = sandbox.sc_json(&["filters", "show", id.as_str()]);
    assert_eq!(shown["memberships"].as_array().unwrap().len(), 2);

    let renamed = sandbox.sc_json(&["filters", "rename", id.as_str(), "Sharp backlog"]);
    assert_eq!(renamed["name"], "Sharp backlog");

    let same = sandbox.sc_json(&["filters", "edit", id.as_str(), "--tree", tree.to_str().unwrap()]);
    assert_eq!(same["status"], "unchanged");

    let narrower = sandbox.write(
        "720.json",
        r#"{ "type": "HasResolution", "parameters": { "resolution": "720p" } }"#,
    );
    let edited = sandbox.sc_json(&["filters", "edit", id.as_str(), "--tree", narrower.to_str().unwrap()]);
    assert_eq!(edited["status"], "updated");
    assert_eq!(edited["user_dependent"], false);

    let shown = sandbox.sc_json(&["filters", "show", id.as_str()]);
    assert_eq!(shown["memberships"], serde_json::json!([]));

    let global = sandbox.sc_json(&["eval", id.as_str(), "--library", library, "--user", "1"]);
    assert_eq!(global["scope"], "global");
    assert_eq!(ids(&global), vec![2]);

    let deleted = sandbox.sc_json(&["filters", "delete", id.as_str()]);
    assert_eq!(deleted["status"], "deleted");
    let listed = sandbox.sc_json(&["filters", "list"]);
    assert_eq!(listed["filters"], serde_json::json!([]));
}

#[test]
fn test_group_target_and_equivalents() {
    let sandbox = Sandbox::new();
    let tree = sandbox.write(
        "1080.json",
        r#"{ "type": "HasResolution", "parameters": { "resolution": "1080p" } }"#,
    );
    let first = sandbox.add("Series 1080p", &tree, &[]);

    let created = sandbox.sc_json(&[
        "filters",
        "add",
        "--name",
        "Groups 1080p",
        "--target",
        "group",
        "--tree",
        tree.to_str().unwrap(),
    ]);
    assert_eq!(created["target"], "group");
    assert_eq!(created["equivalent_to"], serde_json::json!([first]));

    let groups = created["id"].as_str().unwrap();
    let library = sandbox.path("library.json");
    let result = sandbox.sc_json(&["eval", groups, "--library", library.to_str().unwrap()]);
    assert_eq!(ids(&result), vec![10]);
}

#[test]
fn test_owned_filter_visibility() {
    let sandbox = Sandbox::new();
    let tree = sandbox.write("fav.json", r#"{ "type": "IsFavorite" }"#);
    let id = sandbox.add("Alice favorites", &tree, &["--owner", "1"]);

    let anonymous = sandbox.sc_json(&["filters", "list"]);
    assert_eq!(anonymous["filters"], serde_json::json!([]));
    let alice = sandbox.sc_json(&["filters", "list", "--user", "1"]);
    assert_eq!(alice["filters"][0]["id"], id.as_str());

    let library = sandbox.path("library.json");
    let output = sandbox.sc(&[
        "--json",
        "eval",
        id.as_str(),
        "--library",
        library.to_str().unwrap(),
        "--user",
        "2",
    ]);
    assert_eq!(output.status.code(), Some(4));
    let error: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(error["error"]["code"], "NOT_FOUND");
}

#[test]
fn test_invalid_tree_reports_every_error() {
    let sandbox = Sandbox::new();
    let tree = sandbox.write(
        "bad.json",
        r#"{ "type": "Or", "children": [
            { "type": "HasResolution", "parameters": { "resolution": "999p" } },
            { "type": "AiredWithinDays", "parameters": { "days": 0 } }
        ] }"#,
    );
    let output = sandbox.sc(&[
        "--json",
        "filters",
        "add",
        "--name",
        "Broken",
        "--tree",
        tree.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let error: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(error["error"]["code"], "INVALID_FILTER");
    let message = error["error"]["message"].as_str().unwrap();
    assert!(message.contains("$.children[0]"), "{message}");
    assert!(message.contains("$.children[1]"), "{message}");

    assert!(!sandbox.path("state.json").exists());
}

#[test]
fn test_unknown_filter_exit_code() {
    let sandbox = Sandbox::new();
    let output = sandbox.sc(&["filters", "show", "00000000-0000-4000-8000-000000000000"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error: "));
}

#[test]
fn test_config_init_and_show() {
    let sandbox = Sandbox::new();
    let config = sandbox.path("config.toml");
    fs::remove_file(&config).unwrap();

    let init = sandbox.sc_json(&["config", "init"]);
    assert_eq!(init["created"], true);
    assert!(config.exists());

    let again = sandbox.sc_json(&["config", "init"]);
    assert_eq!(again["created"], false);

    let shown = sandbox.sc_json(&["config", "show"]);
    assert_eq!(shown["exists"], true);
    assert_eq!(shown["config"]["engine"]["workers"], 4);

    let path = sandbox.sc(&["config", "path"]);
    assert_eq!(
        String::from_utf8_lossy(&path.stdout).trim(),
        config.display().to_string()
    );
}
