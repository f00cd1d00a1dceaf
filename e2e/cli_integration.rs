// e2e/cli_integration.rs — the `hset` binary as a black box
//
// Drives the compiled binary with std::process::Command: build from a
// text list, inspect, query by hex hash, and compose two files.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

/// Locate the `hset` binary produced by Cargo.
fn hset_bin() -> PathBuf {
    if let Ok(p) = std::env::var("CARGO_BIN_EXE_hset") {
        return PathBuf::from(p);
    }
    let mut p = std::env::current_exe().unwrap();
    p.pop();
    if p.ends_with("deps") {
        p.pop();
    }
    p.push("hset");
    p
}

fn write_list(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("hashes.txt");
    let mut lines = String::new();
    for v in 0..8u8 {
        for b in [v; 16] {
            lines.push_str(&format!("{b:02x}"));
        }
        lines.push('\n');
    }
    fs::write(&path, lines).unwrap();
    path
}

fn build_set(dir: &TempDir, name: &str, input: &PathBuf) -> PathBuf {
    let out = dir.path().join(format!("{name}.hset"));
    let status = Command::new(hset_bin())
        .args([
            "build",
            name,
            "md5",
            "--input",
            input.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
            "--tmpdir",
            dir.path().to_str().unwrap(),
        ])
        .status()
        .expect("failed to run hset build");
    assert!(status.success(), "build should exit 0");
    assert!(out.exists());
    out
}

#[test]
fn build_info_query_round_trip() {
    let dir = TempDir::new().unwrap();
    let list = write_list(&dir);
    let out = build_set(&dir, "clitest", &list);

    // info prints the name and the column line
    let info = Command::new(hset_bin())
        .args(["info", out.to_str().unwrap()])
        .output()
        .expect("failed to run hset info");
    assert!(info.status.success());
    let text = String::from_utf8_lossy(&info.stdout);
    assert!(text.contains("clitest"));
    assert!(text.contains("md5"));
    assert!(text.contains("8 hashes"));

    // a present hash exits 0 and prints a hit
    let hit = Command::new(hset_bin())
        .args([
            "query",
            out.to_str().unwrap(),
            "--type",
            "md5",
            "03030303030303030303030303030303",
        ])
        .output()
        .unwrap();
    assert!(hit.status.success());
    assert!(String::from_utf8_lossy(&hit.stdout).starts_with("hit"));

    // a missing hash exits nonzero
    let miss = Command::new(hset_bin())
        .args([
            "query",
            out.to_str().unwrap(),
            "--type",
            "md5",
            "ffffffffffffffffffffffffffffff00",
        ])
        .output()
        .unwrap();
    assert!(!miss.status.success());
    assert!(String::from_utf8_lossy(&miss.stdout).starts_with("miss"));
}

#[test]
fn union_subcommand_composes_files() {
    let dir = TempDir::new().unwrap();

    let list_a = dir.path().join("a.txt");
    fs::write(&list_a, "01010101010101010101010101010101\n").unwrap();
    let list_b = dir.path().join("b.txt");
    fs::write(&list_b, "02020202020202020202020202020202\n").unwrap();

    let a = build_set(&dir, "a", &list_a);
    let b = build_set(&dir, "b", &list_b);

    let out = dir.path().join("u.hset");
    let status = Command::new(hset_bin())
        .args([
            "union",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
            "--tmpdir",
            dir.path().to_str().unwrap(),
        ])
        .status()
        .unwrap();
    assert!(status.success());

    for h in [
        "01010101010101010101010101010101",
        "02020202020202020202020202020202",
    ] {
        let q = Command::new(hset_bin())
            .args(["query", out.to_str().unwrap(), "--type", "md5", h])
            .status()
            .unwrap();
        assert!(q.success());
    }
}

#[test]
fn build_rejects_unknown_type() {
    let dir = TempDir::new().unwrap();
    let list = write_list(&dir);
    let status = Command::new(hset_bin())
        .args([
            "build",
            "bad",
            "crc32",
            "--input",
            list.to_str().unwrap(),
            "--output",
            dir.path().join("bad.hset").to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(!status.status.success());
    assert!(String::from_utf8_lossy(&status.stderr).contains("crc32"));
}

#[test]
fn lenient_build_reports_skipped_lines() {
    let dir = TempDir::new().unwrap();
    let list = dir.path().join("dirty.txt");
    fs::write(
        &list,
        "00112233445566778899aabbccddeeff\nbogus\nffeeddccbbaa99887766554433221100\n",
    )
    .unwrap();
    let out = dir.path().join("dirty.hset");

    let output = Command::new(hset_bin())
        .args([
            "build",
            "dirty",
            "md5",
            "--lenient",
            "--input",
            list.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
            "--tmpdir",
            dir.path().to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("skipped"));
    assert!(out.exists());
}
