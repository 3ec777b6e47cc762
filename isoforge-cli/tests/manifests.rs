use predicates::prelude::*;

mod common;

fn repository(ctx: &common::TestContext) -> std::path::PathBuf {
    ctx.write("repo/client/config/crd/b.yaml", "kind: B\n");
    ctx.write("repo/client/config/crd/a.yml", "\nkind: A\n");
    ctx.write("repo/client/config/crd/notes.txt", "ignored");
    ctx.write("repo/deploy/controller.yaml", "kind: Deployment");
    ctx.path("repo")
}

#[test]
fn test_manifests_bundle() {
    let ctx = common::isoforge();
    let repo = repository(&ctx);

    ctx.new_cmd()
        .arg("manifests")
        .arg("--repo")
        .arg(&repo)
        .args(["--version", "v1.0.0", "--path", "client/config/crd"])
        .args(["--path", "deploy", "--output", "bundle.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bundle.yaml"));

    assert_eq!(
        common::read(&ctx.path("bundle.yaml")),
        "kind: A\n---\nkind: B\n---\nkind: Deployment"
    );
    assert!(ctx.tools.called("git clone --quiet -- "));
    assert!(ctx.tools.called("git checkout --quiet v1.0.0"));
}

#[test]
fn test_manifests_missing_path_skipped() {
    let ctx = common::isoforge();
    let repo = repository(&ctx);

    ctx.new_cmd()
        .arg("manifests")
        .arg("--repo")
        .arg(&repo)
        .args(["--path", "deploy", "--path", "does/not/exist"])
        .assert()
        .success()
        .stderr(predicate::str::contains("skipping"));

    assert_eq!(
        common::read(&ctx.path("snapshotter-manifests.yaml")),
        "kind: Deployment"
    );
}

#[test]
fn test_manifests_rejects_escaping_path() {
    let ctx = common::isoforge();

    ctx.new_cmd()
        .args(["manifests", "--path", "../outside"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("relative to the repository root"));

    assert!(!ctx.tools.called("git"));
}

#[test]
fn test_manifests_repo_starting_with_dash_is_not_an_option() {
    let ctx = common::isoforge();
    ctx.write("-repo/deploy/controller.yaml", "kind: Deployment");

    ctx.new_cmd()
        .args(["manifests", "--repo=-repo", "--path", "deploy"])
        .assert()
        .success();

    assert!(ctx.tools.called("git clone --quiet -- -repo "));
    assert_eq!(
        common::read(&ctx.path("snapshotter-manifests.yaml")),
        "kind: Deployment"
    );
}
