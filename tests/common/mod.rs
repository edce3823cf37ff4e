use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub fn treesum_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("treesum");
    cmd.arg("-C").arg(cwd);
    cmd
}

/// A tree with `a.txt` ("abcd") and `sub/b.bin` (empty).
pub fn two_file_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "abcd").unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();
    fs::write(temp.path().join("sub/b.bin"), "").unwrap();
    temp
}

/// Non-comment lines of a manifest file.
// Only the verify tests look at residual bodies.
#[allow(dead_code)]
pub fn manifest_body(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("manifest should exist")
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
