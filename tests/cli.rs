use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const GRAPH: &str = r#"{
    "nodes": [
        {"kind": "hub", "id": "physics", "label": "Physics"},
        {"kind": "hub", "id": "music", "label": "Music"},
        {"kind": "leaf", "id": "a", "class": "video"},
        {"kind": "leaf", "id": "b", "class": "video"},
        {"kind": "leaf", "id": "c", "class": "article"},
        {"kind": "leaf", "id": "lonely"}
    ],
    "edges": [
        {"source": "physics", "target": "a"},
        {"source": "physics", "target": "b"},
        {"source": "music", "target": "b"},
        {"source": "music", "target": "c"}
    ]
}"#;

fn write_graph(dir: &Path) -> PathBuf {
    let path = dir.join("graph.json");
    fs::write(&path, GRAPH).expect("Failed to write graph fixture");
    path
}

fn graphscape(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_graphscape"))
        .args(args)
        .output()
        .expect("Failed to execute graphscape")
}

#[test]
fn inspect_prints_counts() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_graph(dir.path());

    let out = graphscape(&["inspect", "-i", graph.to_str().unwrap()]);
    assert!(out.status.success(), "graphscape inspect exited with error");

    insta::assert_snapshot!(String::from_utf8_lossy(&out.stdout), @r"
    hubs: 2
    leaves: 4
    edges: 4
    orphan leaves: 1
    cross-linked leaves: 1
      physics (Physics): 2 leaves
      music (Music): 2 leaves
    ");
}

#[test]
fn layout_writes_every_node() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_graph(dir.path());
    let output = dir.path().join("layout.json");

    let out = graphscape(&[
        "layout",
        "-i",
        graph.to_str().unwrap(),
        "-s",
        "galaxy",
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "graphscape layout exited with error");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["shape"], "galaxy");
    assert_eq!(json["hubs"].as_array().unwrap().len(), 2);
    let leaves = json["leaves"].as_array().unwrap();
    assert_eq!(leaves.len(), 4);
    assert_eq!(leaves[3]["id"], "lonely");
    assert_eq!(leaves[3]["position"].as_array().unwrap().len(), 3);
}

#[test]
fn layout_uses_config_shape() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_graph(dir.path());
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"initial_shape": "sphere"}"#).unwrap();

    let out = graphscape(&[
        "layout",
        "-i",
        graph.to_str().unwrap(),
        "-c",
        config.to_str().unwrap(),
    ]);
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["shape"], "sphere");
}

#[test]
fn pick_at_leaf_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_graph(dir.path());

    let out = graphscape(&["pick", "-i", graph.to_str().unwrap(), "--at", "c"]);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "c");

    let out = graphscape(&[
        "pick",
        "-i",
        graph.to_str().unwrap(),
        "--x",
        "-0.98",
        "--y",
        "0.98",
    ]);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "none");
}

#[test]
fn malformed_graph_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let graph = dir.path().join("bad.json");
    fs::write(
        &graph,
        r#"{"nodes": [{"kind": "hub", "id": "h", "label": "H"}],
            "edges": [{"source": "h", "target": "missing"}]}"#,
    )
    .unwrap();

    let out = graphscape(&["inspect", "-i", graph.to_str().unwrap()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unknown node id `missing`"), "{stderr}");
}
