use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Stdio;

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> PathBuf {
        self.path("ledger.toml")
    }

    fn csrctl(&self) -> Command {
        let mut cmd = Command::cargo_bin("csrctl").unwrap();
        cmd.env_remove("CSR_LOG").arg("--config").arg(self.config());
        cmd
    }

    fn keygen(&self, id: &str) -> PathBuf {
        let out = self.path(&format!("{id}.key.json"));
        self.csrctl()
            .args(["keygen", "--id", id, "--out"])
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("[[signers]]"));
        out
    }

    fn init(&self, keys: &[&Path], threshold: usize) {
        let mut cmd = self.csrctl();
        cmd.arg("init")
            .arg("--storage")
            .arg(self.path("ledger"))
            .arg("--threshold")
            .arg(threshold.to_string());
        for key in keys {
            cmd.arg("--key").arg(key);
        }
        cmd.assert().success();
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn propose(&self, payload: &Path, keys: &[&Path]) -> String {
        let mut cmd = self.csrctl();
        cmd.arg("propose").arg("--payload").arg(payload);
        for key in keys {
            cmd.arg("--key").arg(key);
        }
        let output = cmd.assert().success().get_output().clone();
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = self.csrctl().args(args).assert().success().get_output().clone();
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }
}

#[test]
fn propose_commit_and_inspect() {
    let ws = Workspace::new();
    let alice = ws.keygen("alice");
    let bob = ws.keygen("bob");
    let carol = ws.keygen("carol");
    ws.init(&[&alice, &bob, &carol], 2);

    assert_eq!(ws.stdout(&["head"]), "<empty>");

    let genesis = ws.write("genesis.json", r#"{"mode": "LOCKED_DOWN"}"#);
    let h0 = {
        let mut cmd = ws.csrctl();
        cmd.arg("propose")
            .arg("--payload")
            .arg(&genesis)
            .arg("--key")
            .arg(&alice)
            .arg("--key")
            .arg(&bob);
        let output = cmd.assert().success().get_output().clone();
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    };
    assert_eq!(ws.stdout(&["head"]), h0);

    let patch = ws.write(
        "patch.json",
        r#"[{"op": "replace", "path": "/mode", "value": "EVOLUTIONARY_AUTONOMY"}]"#,
    );
    ws.csrctl()
        .arg("propose")
        .arg("--patch")
        .arg(&patch)
        .arg("--key")
        .arg(&bob)
        .arg("--key")
        .arg(&carol)
        .assert()
        .success();

    let state: serde_json::Value = serde_json::from_str(&ws.stdout(&["state"])).unwrap();
    assert_eq!(state, serde_json::json!({"mode": "EVOLUTIONARY_AUTONOMY"}));
    let before: serde_json::Value =
        serde_json::from_str(&ws.stdout(&["state", "--at", h0.as_str()])).unwrap();
    assert_eq!(before, serde_json::json!({"mode": "LOCKED_DOWN"}));

    ws.csrctl()
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries"));
    assert_eq!(ws.stdout(&["log"]).lines().count(), 2);

    let diff: serde_json::Value = serde_json::from_str(&ws.stdout(&["diff", "head"])).unwrap();
    assert_eq!(diff["parent_hash"], serde_json::json!(h0));
    assert_eq!(diff["inverse"][0]["value"], serde_json::json!("LOCKED_DOWN"));
}

#[test]
fn single_signature_does_not_commit() {
    let ws = Workspace::new();
    let alice = ws.keygen("alice");
    let bob = ws.keygen("bob");
    ws.init(&[&alice, &bob], 2);

    let payload = ws.write("payload.json", r#"{"mode": "LOCKED_DOWN"}"#);
    ws.csrctl()
        .arg("propose")
        .arg("--payload")
        .arg(&payload)
        .arg("--key")
        .arg(&alice)
        .assert()
        .failure()
        .stderr(predicate::str::contains("quorum not met"));
    assert_eq!(ws.stdout(&["head"]), "<empty>");
}

#[test]
fn init_refuses_unsatisfiable_threshold() {
    let ws = Workspace::new();
    let alice = ws.keygen("alice");
    ws.csrctl()
        .arg("init")
        .arg("--storage")
        .arg(ws.path("ledger"))
        .arg("--threshold")
        .arg("2")
        .arg("--key")
        .arg(&alice)
        .assert()
        .failure();
    assert!(!ws.config().exists());
}

#[test]
fn pinned_parent_loses_to_a_newer_head() {
    let ws = Workspace::new();
    let alice = ws.keygen("alice");
    ws.init(&[&alice], 1);

    let h0 = ws.propose(&ws.write("a.json", r#"{"mode": "A"}"#), &[&alice]);
    let h1 = ws.propose(&ws.write("b.json", r#"{"mode": "B"}"#), &[&alice]);

    ws.csrctl()
        .arg("propose")
        .arg("--payload")
        .arg(ws.write("c.json", r#"{"mode": "C"}"#))
        .arg("--parent")
        .arg(&h0)
        .arg("--key")
        .arg(&alice)
        .assert()
        .failure()
        .stderr(predicate::str::contains("stale parent"))
        .stderr(predicate::str::contains(h1.as_str()));
    assert_eq!(ws.stdout(&["head"]), h1);
}

#[test]
fn concurrent_proposals_on_one_ledger_commit_once() {
    let ws = Workspace::new();
    let alice = ws.keygen("alice");
    ws.init(&[&alice], 1);
    let h0 = ws.propose(&ws.write("genesis.json", r#"{"mode": "LOCKED_DOWN"}"#), &[&alice]);

    let binary = assert_cmd::cargo::cargo_bin("csrctl");
    let children: Vec<_> = (0..4)
        .map(|i| {
            let payload = ws.write(&format!("p{i}.json"), &format!(r#"{{"mode": "M{i}"}}"#));
            std::process::Command::new(&binary)
                .env_remove("CSR_LOG")
                .arg("--config")
                .arg(ws.config())
                .arg("propose")
                .arg("--payload")
                .arg(payload)
                .arg("--parent")
                .arg(&h0)
                .arg("--key")
                .arg(&alice)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .unwrap()
        })
        .collect();
    let outputs: Vec<_> = children
        .into_iter()
        .map(|child| child.wait_with_output().unwrap())
        .collect();

    let winners: Vec<String> = outputs
        .iter()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .collect();
    assert_eq!(winners.len(), 1);
    for output in outputs.iter().filter(|o| !o.status.success()) {
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("stale parent"), "unexpected failure: {stderr}");
    }

    assert_eq!(ws.stdout(&["head"]), winners[0]);
    ws.csrctl()
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries"));
}

#[test]
fn keygen_refuses_to_overwrite() {
    let ws = Workspace::new();
    let alice = ws.keygen("alice");
    let before = std::fs::read_to_string(&alice).unwrap();
    ws.csrctl()
        .args(["keygen", "--id", "alice", "--out"])
        .arg(&alice)
        .assert()
        .failure();
    assert_eq!(std::fs::read_to_string(&alice).unwrap(), before);
}
