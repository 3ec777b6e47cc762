//! End-to-end pipeline runs against in-process fakes.

use isoforge::pipeline::PipelineState;
use isoforge::{
    BaseImageSource, BuildRequest, ForgeError, IdentityReference, InstallTarget,
    ProvisionPipeline, RenderRequest, Stage, TemplateSource,
};
use isoforge_test_utils::fakes::{CallLog, FakeTools, StaticKeySource};
use isoforge_test_utils::keys::{ed25519_key, ed25519_key_seeded, listing};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BASE: &[u8] = b"FCOS-BASE-IMAGE|";

struct Harness {
    dir: TempDir,
    log: CallLog,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("base.iso"), BASE).unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        Self {
            dir,
            log: CallLog::default(),
        }
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn artifact(&self) -> PathBuf {
        self.out().join("coreos-install.iso")
    }

    fn keys(&self) -> StaticKeySource {
        StaticKeySource::new(self.log.clone())
    }

    fn pipeline(&self, keys: StaticKeySource, tools: &FakeTools) -> ProvisionPipeline {
        ProvisionPipeline::new(Arc::new(keys), tools.toolchain())
    }

    fn tools(&self) -> FakeTools {
        FakeTools::new(self.log.clone())
    }

    fn request(&self, device: &str, identity: &str) -> BuildRequest {
        BuildRequest {
            render: RenderRequest {
                target: InstallTarget::new(device).unwrap(),
                identity: IdentityReference::new(identity).unwrap(),
                template: TemplateSource::default(),
                payload_dir: None,
                payload_target_root: "/var/lib/isoforge/payload".to_string(),
            },
            base_image: BaseImageSource::Path(self.dir.path().join("base.iso")),
            output_dir: self.out(),
            artifact_name: "coreos-install.iso".to_string(),
        }
    }
}

/// The embedded config is everything after the base image bytes.
fn embedded_config(artifact: &Path) -> String {
    let bytes = std::fs::read(artifact).unwrap();
    assert!(bytes.starts_with(BASE), "artifact must start with the base image");
    String::from_utf8(bytes[BASE.len()..].to_vec()).unwrap()
}

fn authorized_keys(config: &str) -> Vec<String> {
    let doc: Value = serde_yaml::from_str(config).unwrap();
    doc["passwd"]["users"][0]["ssh_authorized_keys"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

fn out_entries(h: &Harness) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(h.out())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_alice_single_key_builds_image() {
    let h = Harness::new();
    let key = ed25519_key("alice@laptop");
    let pipeline = h.pipeline(h.keys().with_listing("alice", format!("{}\n", key)), &h.tools());

    let report = pipeline.run(&h.request("/dev/sdb", "alice")).await.unwrap();

    assert_eq!(report.artifact.path, h.artifact());
    assert_eq!(report.key_count, 1);
    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(report.metrics.executed(), Stage::ALL);
    assert_eq!(
        h.log.calls(),
        ["keys alice", "transpile", "validate", "embed /dev/sdb"]
    );

    let config = embedded_config(&h.artifact());
    assert_eq!(authorized_keys(&config), [key]);

    let doc: Value = serde_yaml::from_str(&config).unwrap();
    let device_file = &doc["storage"]["files"][0];
    assert_eq!(device_file["path"].as_str(), Some("/etc/isoforge/install-device"));
    assert_eq!(device_file["contents"]["inline"].as_str(), Some("/dev/sdb"));

    assert_eq!(out_entries(&h), ["coreos-install.iso"]);
}

#[tokio::test]
async fn test_keys_preserved_in_listing_order() {
    let h = Harness::new();
    let pipeline = h.pipeline(h.keys().with_listing("ops", listing(3)), &h.tools());

    pipeline.run(&h.request("/dev/nvme0n1", "ops")).await.unwrap();

    let expected: Vec<String> = listing(3).lines().map(str::to_string).collect();
    assert_eq!(authorized_keys(&embedded_config(&h.artifact())), expected);
}

#[tokio::test]
async fn test_validation_failure_never_reaches_composer() {
    let h = Harness::new();
    let tools = h.tools().failing_validation("config.storage.files.0: invalid mode");
    let pipeline = h.pipeline(h.keys().with_listing("alice", ed25519_key("a")), &tools);

    let err = pipeline
        .run(&h.request("/dev/sdb", "alice"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::Validation { .. }));
    assert_eq!(err.stage(), Some(Stage::Validate));
    assert_eq!(err.exit_code(), 40);
    assert!(err.to_string().contains("invalid mode"));
    assert!(!h.log.called("embed"));
    assert!(!h.log.called("download"));
    assert!(out_entries(&h).is_empty());
}

#[tokio::test]
async fn test_zero_keys_stops_before_render() {
    let h = Harness::new();
    let pipeline = h.pipeline(h.keys().with_listing("bob", "\n  \n"), &h.tools());

    let err = pipeline
        .run(&h.request("/dev/sdb", "bob"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::NoKeysConfigured { ref identity } if identity == "bob"));
    assert_eq!(h.log.calls(), ["keys bob"]);
    assert!(out_entries(&h).is_empty());
}

#[tokio::test]
async fn test_unknown_identity() {
    let h = Harness::new();
    let pipeline = h.pipeline(h.keys().with_not_found("ghost"), &h.tools());

    let err = pipeline
        .run(&h.request("/dev/sdb", "ghost"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::IdentityNotFound { .. }));
    assert_eq!(err.exit_code(), 10);
}

#[tokio::test]
async fn test_network_failure_is_transient() {
    let h = Harness::new();
    let pipeline = h.pipeline(h.keys().with_unreachable("alice"), &h.tools());

    let err = pipeline
        .run(&h.request("/dev/sdb", "alice"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(err.exit_code(), 13);
}

#[tokio::test]
async fn test_invalid_key_line_fails_whole_run() {
    let h = Harness::new();
    let listing = format!("{}\nssh-rsa not-base64!!\n", ed25519_key("good"));
    let pipeline = h.pipeline(h.keys().with_listing("alice", listing), &h.tools());

    let err = pipeline
        .run(&h.request("/dev/sdb", "alice"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::InvalidKey { index: 1, .. }));
    assert!(!h.log.called("transpile"));
}

#[tokio::test]
async fn test_unresolved_variable_fails_before_transpile() {
    let h = Harness::new();
    let template = h.dir.path().join("custom.bu");
    std::fs::write(
        &template,
        "variant: fcos\nversion: 1.5.0\nstorage:\n  files:\n    - path: /etc/hostname\n      contents:\n        inline: {{ .hostname }}\n",
    )
    .unwrap();
    let pipeline = h.pipeline(h.keys().with_listing("alice", ed25519_key("a")), &h.tools());

    let mut request = h.request("/dev/sdb", "alice");
    request.render.template = TemplateSource::File(template);
    let err = pipeline.run(&request).await.unwrap_err();

    assert!(matches!(err, ForgeError::TemplateRender { .. }));
    assert!(err.to_string().contains("hostname"));
    assert_eq!(h.log.calls(), ["keys alice"]);
}

#[tokio::test]
async fn test_identical_inputs_embed_identical_config() {
    let h = Harness::new();
    let pipeline = h.pipeline(h.keys().with_listing("alice", listing(2)), &h.tools());
    let request = h.request("/dev/sdb", "alice");

    let first = pipeline.run(&request).await.unwrap();
    let first_bytes = std::fs::read(h.artifact()).unwrap();
    let second = pipeline.run(&request).await.unwrap();
    let second_bytes = std::fs::read(h.artifact()).unwrap();

    assert_eq!(first.config_digest, second.config_digest);
    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn test_failures_leave_prior_artifact_untouched() {
    let failing = [
        FakeTools::default().failing_transpile("error at line 3"),
        FakeTools::default().failing_validation("bad config"),
        FakeTools::default().failing_embed("No space left on device"),
    ];

    for tools in failing {
        let h = Harness::new();
        std::fs::write(h.artifact(), b"previous image").unwrap();
        let pipeline = h.pipeline(h.keys().with_listing("alice", ed25519_key("a")), &tools);

        assert!(pipeline.run(&h.request("/dev/sdb", "alice")).await.is_err());
        assert_eq!(std::fs::read(h.artifact()).unwrap(), b"previous image");
        assert_eq!(out_entries(&h), ["coreos-install.iso"]);
    }
}

#[tokio::test]
async fn test_transpile_error_carries_diagnostic() {
    let h = Harness::new();
    let tools = h.tools().failing_transpile("error at line 7: unknown field \"userz\"");
    let pipeline = h.pipeline(h.keys().with_listing("alice", ed25519_key("a")), &tools);

    let err = pipeline
        .run(&h.request("/dev/sdb", "alice"))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Transpile));
    assert!(err.to_string().contains("error at line 7: unknown field \"userz\""));
    assert!(!h.log.called("validate"));
}

#[tokio::test]
async fn test_payload_files_referenced_and_resolved() {
    let h = Harness::new();
    let payload = h.dir.path().join("payload");
    std::fs::create_dir_all(payload.join("k8s")).unwrap();
    std::fs::write(payload.join("k8s/snapshotter.yaml"), "kind: CustomResourceDefinition").unwrap();
    std::fs::write(payload.join("motd"), "hello").unwrap();

    let tools = h.tools();
    let transpiler = tools.transpiler();
    let pipeline = ProvisionPipeline::new(
        Arc::new(h.keys().with_listing("alice", ed25519_key("a"))),
        tools.toolchain_with(transpiler.clone()),
    );

    let mut request = h.request("/dev/sdb", "alice");
    request.render.payload_dir = Some(payload.clone());
    let report = pipeline.run(&request).await.unwrap();

    assert_eq!(report.payload_files, 2);
    assert_eq!(
        transpiler.last_files_dir(),
        Some(payload.canonicalize().unwrap())
    );

    let doc: Value = serde_yaml::from_str(&embedded_config(&h.artifact())).unwrap();
    let files = doc["storage"]["files"].as_sequence().unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(
        files[1]["path"].as_str(),
        Some("/var/lib/isoforge/payload/k8s/snapshotter.yaml")
    );
    assert_eq!(files[1]["contents"]["local"].as_str(), Some("k8s/snapshotter.yaml"));
    assert_eq!(files[2]["contents"]["local"].as_str(), Some("motd"));
}

#[tokio::test]
async fn test_missing_output_dir_rejected_before_lookup() {
    let h = Harness::new();
    let pipeline = h.pipeline(h.keys().with_listing("alice", ed25519_key("a")), &h.tools());

    let mut request = h.request("/dev/sdb", "alice");
    request.output_dir = h.dir.path().join("nope");
    let err = pipeline.run(&request).await.unwrap_err();

    assert!(matches!(err, ForgeError::InvalidInput(_)));
    assert!(h.log.calls().is_empty());
}

#[tokio::test]
async fn test_render_dry_run_invokes_no_tools() {
    let h = Harness::new();
    let key = ed25519_key_seeded(9, "deploy");
    let pipeline = h.pipeline(h.keys().with_listing("alice", key.clone()), &h.tools());

    let report = pipeline
        .render(&h.request("/dev/vda", "alice").render)
        .await
        .unwrap();

    assert_eq!(report.keys.len(), 1);
    assert_eq!(authorized_keys(report.rendered.as_str()), [key]);
    assert_eq!(h.log.calls(), ["keys alice"]);
    assert!(out_entries(&h).is_empty());
}

#[tokio::test]
async fn test_dropped_run_leaves_prior_artifact() {
    let h = Harness::new();
    std::fs::write(h.artifact(), b"previous build").unwrap();
    let tools = h.tools().stalling_embed();
    let pipeline = h.pipeline(h.keys().with_listing("alice", ed25519_key("a")), &tools);
    let request = h.request("/dev/sdb", "alice");

    let outcome = tokio::time::timeout(Duration::from_millis(500), pipeline.run(&request)).await;

    assert!(outcome.is_err(), "run should still be composing");
    assert!(h.log.called("embed /dev/sdb"));
    assert_eq!(out_entries(&h), ["coreos-install.iso"]);
    assert_eq!(std::fs::read(h.artifact()).unwrap(), b"previous build");
}
