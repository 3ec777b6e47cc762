#![allow(dead_code)]

use assert_cmd::Command;
use isoforge_test_utils::keys::{ed25519_key, listing};
use isoforge_test_utils::scripts::FakeToolDir;
use isoforge_test_utils::server::KeyServer;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub const BASE_IMAGE: &str = "FCOS-BASE-IMAGE|";

/// One isolated CLI environment: fake tools, a key server and a work dir.
pub struct TestContext {
    pub tools: FakeToolDir,
    pub server: KeyServer,
    pub work: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_isoforge");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(60));
        cmd.current_dir(self.work.path());
        cmd.env_remove("RUST_LOG");
        cmd.env_remove("ISOFORGE_CONFIG");
        cmd.env("ISOFORGE_KEYS_ENDPOINT", self.server.endpoint());
        cmd.env("ISOFORGE_BUTANE", self.tools.path("butane"));
        cmd.env(
            "ISOFORGE_IGNITION_VALIDATE",
            self.tools.path("ignition-validate"),
        );
        cmd.env("ISOFORGE_COREOS_INSTALLER", self.tools.path("coreos-installer"));
        cmd.env("ISOFORGE_GIT", self.tools.path("git"));
        cmd
    }

    /// `build` with a local base image and `out/` as output directory.
    pub fn build_cmd(&self, device: &str, identity: &str) -> Command {
        let mut cmd = self.new_cmd();
        cmd.arg("build")
            .arg(device)
            .arg(identity)
            .arg("--output-dir")
            .arg(self.output_dir())
            .arg("--base-image")
            .arg(self.base_image());
        cmd
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.work.path().join(name)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path("out")
    }

    pub fn base_image(&self) -> PathBuf {
        self.path("base.iso")
    }

    pub fn artifact(&self) -> PathBuf {
        self.output_dir().join("coreos-install.iso")
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, content).expect("write test file");
        path
    }

    /// Names in the output directory, sorted.
    pub fn output_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.output_dir())
            .expect("read output dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Listing served for `alice`.
pub fn alice_key() -> String {
    ed25519_key("alice@laptop")
}

/// Identities served by the key server:
/// - `alice`: one key
/// - `ops`: three keys
/// - `empty`: no keys
/// - `broken`: an invalid second line
/// - `flaky`: 503
/// - anything else: 404
pub fn isoforge() -> TestContext {
    let alice = format!("{}\n", alice_key());
    let ops = listing(3);
    let broken = format!("{}\nnot-a-key\n", alice_key());
    let server = KeyServer::start(&[
        ("/alice.keys", 200, alice.as_str()),
        ("/ops.keys", 200, ops.as_str()),
        ("/empty.keys", 200, ""),
        ("/broken.keys", 200, broken.as_str()),
        ("/flaky.keys", 503, "service unavailable"),
    ]);

    let ctx = TestContext {
        tools: FakeToolDir::new(),
        server,
        work: TempDir::new().expect("create work dir"),
    };
    std::fs::create_dir_all(ctx.output_dir()).expect("create output dir");
    std::fs::write(ctx.base_image(), BASE_IMAGE).expect("write base image");
    ctx
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read file")
}
