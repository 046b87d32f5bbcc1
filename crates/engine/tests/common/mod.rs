//! Loopback cluster fixtures

#![allow(dead_code)]

use dgrep_config::EngineConfig;
use dgrep_engine::Engine;
use dgrep_utils::RetryPolicy;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

pub struct TestNode {
    pub engine: Engine,
    pub id: String,
    pub log_path: PathBuf,
    _log: Option<NamedTempFile>,
}

pub fn log_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

pub fn dial_policy() -> RetryPolicy {
    RetryPolicy::bounded(Duration::from_millis(25), 80)
}

pub fn config_for(log_path: PathBuf) -> EngineConfig {
    EngineConfig::new(log_path).with_dial_policy(dial_policy())
}

/// Start one node per log (`None` means a log file that does not exist) and
/// connect every node to every other node.
pub async fn cluster_with(logs: &[Option<&str>], export_dir: Option<&TempDir>) -> Vec<TestNode> {
    let mut nodes = Vec::with_capacity(logs.len());
    for (i, contents) in logs.iter().enumerate() {
        let (log, log_path) = match contents {
            Some(contents) => {
                let file = log_file(contents);
                let path = file.path().to_path_buf();
                (Some(file), path)
            }
            None => (None, std::env::temp_dir().join(format!("dgrep-missing-{i}.log"))),
        };

        let mut config = config_for(log_path.clone());
        if let (0, Some(dir)) = (i, export_dir) {
            config = config.with_test_output_dir(dir.path());
        }

        let engine = Engine::with_process_matcher(config).unwrap();
        let id = engine.start_server().await.unwrap().to_string();
        nodes.push(TestNode {
            engine,
            id,
            log_path,
            _log: log,
        });
    }

    let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
    for node in &nodes {
        let peers: Vec<String> = ids.iter().filter(|id| **id != node.id).cloned().collect();
        node.engine.connect_to_peers(&peers).await.unwrap();
    }
    nodes
}

pub async fn cluster(logs: &[&str]) -> Vec<TestNode> {
    let logs: Vec<Option<&str>> = logs.iter().copied().map(Some).collect();
    cluster_with(&logs, None).await
}

/// Poll until `condition` holds, panicking after a few seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub async fn shutdown_all(nodes: &[TestNode]) {
    for node in nodes {
        node.engine.shutdown().await;
    }
}
