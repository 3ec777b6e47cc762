//! Pipeline runs through the process-backed tools, using stand-in scripts.

use isoforge::options::ToolPaths;
use isoforge::{
    Architecture, BaseImageSource, BuildRequest, ForgeError, IdentityReference, InstallTarget,
    ProvisionPipeline, RenderRequest, TemplateSource, Toolchain,
};
use isoforge_test_utils::fakes::{CallLog, StaticKeySource};
use isoforge_test_utils::keys::ed25519_key;
use isoforge_test_utils::scripts::FakeToolDir;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn tool_paths(tools: &FakeToolDir) -> ToolPaths {
    ToolPaths {
        butane: tools.path("butane"),
        ignition_validate: tools.path("ignition-validate"),
        coreos_installer: tools.path("coreos-installer"),
        git: tools.path("git"),
    }
}

fn pipeline(tools: &FakeToolDir) -> ProvisionPipeline {
    let keys = StaticKeySource::new(CallLog::default()).with_listing("alice", ed25519_key("alice"));
    ProvisionPipeline::new(Arc::new(keys), Toolchain::from_paths(&tool_paths(tools), true))
}

fn request(work: &Path) -> BuildRequest {
    BuildRequest {
        render: RenderRequest {
            target: InstallTarget::new("/dev/sdb").unwrap(),
            identity: IdentityReference::new("alice").unwrap(),
            template: TemplateSource::default(),
            payload_dir: None,
            payload_target_root: "/var/lib/isoforge/payload".to_string(),
        },
        base_image: BaseImageSource::Cached {
            cache_dir: work.join("cache"),
            stream: "stable".to_string(),
            architecture: Architecture::X86_64,
        },
        output_dir: work.to_path_buf(),
        artifact_name: "coreos-install.iso".to_string(),
    }
}

#[tokio::test]
async fn test_build_with_downloaded_base_image() {
    let tools = FakeToolDir::new();
    let work = TempDir::new().unwrap();

    let report = pipeline(&tools).run(&request(work.path())).await.unwrap();

    let calls = tools.calls();
    assert_eq!(calls.len(), 4, "calls: {:?}", calls);
    assert_eq!(calls[0], "butane --pretty --strict");
    assert!(calls[1].starts_with("ignition-validate "));
    assert!(calls[1].ends_with(".ign"));
    assert!(calls[2].starts_with(
        "coreos-installer download --stream stable --format iso --decompress --architecture x86_64 --directory "
    ));
    assert!(calls[3].starts_with("coreos-installer iso customize --dest-ignition "));
    assert!(calls[3].contains(" --dest-device /dev/sdb -o "));

    let artifact = std::fs::read_to_string(&report.artifact.path).unwrap();
    assert!(artifact.starts_with("FAKE-BASE-IMAGE"));
    assert!(artifact.contains("ssh_authorized_keys"));
    assert!(
        work.path()
            .join("cache/fedora-coreos-stable-x86_64.iso")
            .is_file()
    );
}

#[tokio::test]
async fn test_second_build_uses_cached_image() {
    let tools = FakeToolDir::new();
    let work = TempDir::new().unwrap();
    let pipeline = pipeline(&tools);

    pipeline.run(&request(work.path())).await.unwrap();
    pipeline.run(&request(work.path())).await.unwrap();

    let downloads = tools
        .calls()
        .iter()
        .filter(|c| c.starts_with("coreos-installer download"))
        .count();
    assert_eq!(downloads, 1);
}

#[tokio::test]
async fn test_transpiler_stderr_passed_through() {
    let tools = FakeToolDir::new().failing_butane();
    let work = TempDir::new().unwrap();

    let err = pipeline(&tools)
        .run(&request(work.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::Transpile { .. }));
    assert!(
        err.to_string()
            .contains("error at line 7, column 3: unknown field \"passwd.userz\"")
    );
    assert!(!tools.called("ignition-validate"));
}

#[tokio::test]
async fn test_transpiler_exiting_early_keeps_diagnostic() {
    let tools = FakeToolDir::new().butane_rejecting_flags();
    let work = TempDir::new().unwrap();
    let template = work.path().join("large.bu");
    let filler = "# padding\n".repeat(120_000);
    std::fs::write(
        &template,
        format!("variant: fcos\nversion: 1.5.0\n{}# {{{{ .device }}}}\n", filler),
    )
    .unwrap();

    let mut request = request(work.path());
    request.render.template = TemplateSource::File(template);
    let err = pipeline(&tools).run(&request).await.unwrap_err();

    assert!(matches!(err, ForgeError::Transpile { .. }));
    assert!(err.to_string().contains("error: unknown flag --files-dir"));
    assert!(!err.to_string().contains("Broken pipe"));
}

#[tokio::test]
async fn test_invalid_config_never_composed() {
    let tools = FakeToolDir::new().failing_validation();
    let work = TempDir::new().unwrap();

    let err = pipeline(&tools)
        .run(&request(work.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::Validation { .. }));
    assert!(err.to_string().contains("invalid config version"));
    assert!(!tools.called("coreos-installer"));
    assert!(!work.path().join("coreos-install.iso").exists());
}

#[tokio::test]
async fn test_embed_failure_leaves_no_artifact() {
    let tools = FakeToolDir::new().failing_embed();
    let work = TempDir::new().unwrap();
    let base = work.path().join("base.iso");
    std::fs::write(&base, "BASE").unwrap();

    let mut request = request(work.path());
    request.base_image = BaseImageSource::Path(base);
    let err = pipeline(&tools).run(&request).await.unwrap_err();

    assert!(matches!(err, ForgeError::Composition(_)));
    assert!(err.to_string().contains("No space left on device"));
    let mut names: Vec<String> = std::fs::read_dir(work.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["base.iso"]);
}

#[tokio::test]
async fn test_missing_tool_is_config_error() {
    let tools = FakeToolDir::new();
    let work = TempDir::new().unwrap();
    let mut paths = tool_paths(&tools);
    paths.butane = tools.dir().join("not-installed");

    let keys = StaticKeySource::new(CallLog::default()).with_listing("alice", ed25519_key("a"));
    let pipeline = ProvisionPipeline::new(Arc::new(keys), Toolchain::from_paths(&paths, true));

    let err = pipeline.run(&request(work.path())).await.unwrap_err();
    assert!(matches!(err, ForgeError::Config(_)));
    assert_eq!(err.exit_code(), 2);
}
