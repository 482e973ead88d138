use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A watched directory plus a separate directory holding the baseline.
pub struct Workspace {
    pub watched: TempDir,
    pub state: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace {
            watched: TempDir::new().unwrap(),
            state: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.watched.path()
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.state.path().join("baseline.toml")
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// The key a file is reported under: its canonical absolute path.
    // Not every integration test crate looks at reported paths.
    #[allow(dead_code)]
    pub fn key(&self, relative: &str) -> String {
        self.root()
            .canonicalize()
            .unwrap()
            .join(relative)
            .to_string_lossy()
            .into_owned()
    }

    /// A command watching this workspace, run from the state directory so a
    /// default baseline never lands in the repository.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("treesentry");
        cmd.current_dir(self.state.path())
            .arg(self.root())
            .arg("--baseline")
            .arg(self.baseline_path());
        cmd
    }

    pub fn init(&self) {
        self.cmd().arg("--init").assert().success();
    }

    /// Run exactly one monitoring cycle without sleeping.
    // Only used by the monitor tests.
    #[allow(dead_code)]
    pub fn one_cycle(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["--cycles", "1", "-i", "0"]);
        cmd
    }
}

// Each integration test file is compiled as its own crate and not all of them
// parse fingerprints.
#[allow(dead_code)]
pub fn extract_fingerprint(stdout: &[u8]) -> String {
    let output = std::str::from_utf8(stdout).expect("stdout should be UTF-8");
    output
        .lines()
        .find_map(|line| line.strip_prefix("Fingerprint: "))
        .expect("fingerprint not found in output")
        .to_string()
}
