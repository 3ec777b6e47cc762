//! Stand-in executables for the external tools.
//!
//! Every script appends its argument list to a shared log file, one line per
//! call, prefixed with the tool name.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const BUTANE_OK: &str = r#"#!/bin/sh
echo "butane $*" >> "@LOG@"
cat
"#;

const BUTANE_FAIL: &str = r#"#!/bin/sh
echo "butane $*" >> "@LOG@"
cat > /dev/null
echo "error at line 7, column 3: unknown field \"passwd.userz\"" >&2
exit 1
"#;

/// Rejects its flags without reading the config on stdin.
const BUTANE_REJECT_FLAGS: &str = r#"#!/bin/sh
echo "butane $*" >> "@LOG@"
echo "error: unknown flag --files-dir" >&2
exit 1
"#;

const VALIDATE_OK: &str = r#"#!/bin/sh
echo "ignition-validate $*" >> "@LOG@"
exit 0
"#;

const VALIDATE_FAIL: &str = r#"#!/bin/sh
echo "ignition-validate $*" >> "@LOG@"
echo "error: invalid config version (couldn't parse)" >&2
exit 1
"#;

const COREOS_INSTALLER: &str = r#"#!/bin/sh
echo "coreos-installer $*" >> "@LOG@"
if [ "$1" = "download" ]; then
  dir=""
  while [ $# -gt 0 ]; do
    if [ "$1" = "--directory" ]; then dir="$2"; fi
    shift
  done
  printf 'FAKE-BASE-IMAGE' > "$dir/fedora-coreos-fake-live.x86_64.iso"
  exit 0
fi
if [ "$1" = "iso" ] && [ "$2" = "customize" ]; then
  shift 2
  ign=""; out=""; base=""
  while [ $# -gt 0 ]; do
    case "$1" in
      --dest-ignition) ign="$2"; shift 2 ;;
      --dest-device) shift 2 ;;
      -o) out="$2"; shift 2 ;;
      *) base="$1"; shift ;;
    esac
  done
  cat "$base" "$ign" > "$out"
  exit 0
fi
echo "unexpected arguments: $*" >&2
exit 64
"#;

const COREOS_INSTALLER_FAIL: &str = r#"#!/bin/sh
echo "coreos-installer $*" >> "@LOG@"
echo "Error: writing output: No space left on device" >&2
exit 1
"#;

/// `git clone <repo> <dir>` copies a local directory; `checkout` succeeds.
/// Like git, a repository starting with `-` is an option unless after `--`.
const GIT: &str = r#"#!/bin/sh
echo "git $*" >> "@LOG@"
if [ "$1" = "clone" ]; then
  shift
  if [ "$1" = "--quiet" ]; then shift; fi
  if [ "$1" = "--" ]; then
    shift
  else
    case "$1" in
      -*) echo "error: unknown option \`$1'" >&2; exit 129 ;;
    esac
  fi
  cp -R -- "$1/." "$2"
  exit 0
fi
if [ "$1" = "checkout" ]; then
  exit 0
fi
exit 1
"#;

/// A directory of fake tools plus the log they write.
pub struct FakeToolDir {
    dir: tempfile::TempDir,
    log: PathBuf,
}

impl FakeToolDir {
    /// All tools succeed.
    pub fn new() -> Self {
        let dir = tempfile::TempDir::new().expect("create fake tool dir");
        let log = dir.path().join("calls.log");
        fs::write(&log, "").expect("create call log");

        let tools = Self { dir, log };
        tools.install("butane", BUTANE_OK);
        tools.install("ignition-validate", VALIDATE_OK);
        tools.install("coreos-installer", COREOS_INSTALLER);
        tools.install("git", GIT);
        tools
    }

    pub fn failing_butane(self) -> Self {
        self.install("butane", BUTANE_FAIL);
        self
    }

    pub fn butane_rejecting_flags(self) -> Self {
        self.install("butane", BUTANE_REJECT_FLAGS);
        self
    }

    pub fn failing_validation(self) -> Self {
        self.install("ignition-validate", VALIDATE_FAIL);
        self
    }

    pub fn failing_embed(self) -> Self {
        self.install("coreos-installer", COREOS_INSTALLER_FAIL);
        self
    }

    pub fn path(&self, tool: &str) -> PathBuf {
        self.dir.path().join(tool)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Logged calls, one per line.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn called(&self, tool: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(tool))
    }

    fn install(&self, name: &str, script: &str) {
        let path = self.path(name);
        let body = script.replace("@LOG@", &self.log.display().to_string());
        fs::write(&path, body).expect("write fake tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake tool");
    }
}

impl Default for FakeToolDir {
    fn default() -> Self {
        Self::new()
    }
}
