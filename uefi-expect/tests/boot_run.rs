//! Full boot runs against a stand-in emulator.
//!
//! The "emulator" is `sh -c <script>`; the arguments that would normally go
//! to QEMU land in the script's positional parameters and are ignored.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use uefi_expect::Error;
use uefi_expect::error::FirmwareError;
use uefi_expect::firmware::{Arch, FirmwareProfile};
use uefi_expect::runner::BootRun;
use uefi_expect::script::{FailureReason, Outcome, ScriptDefinition};

struct Fixture {
    templates: TempDir,
    vars: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let templates = tempfile::tempdir().unwrap();
        fs::write(templates.path().join("OVMF_VARS.fd"), [0u8; 4096]).unwrap();
        Self {
            templates,
            vars: tempfile::tempdir().unwrap(),
        }
    }

    fn template(&self) -> PathBuf {
        self.templates.path().join("OVMF_VARS.fd")
    }

    fn profile(&self, emulator: &str, script: &str) -> FirmwareProfile {
        FirmwareProfile {
            arch: Arch::X64,
            emulator: emulator.to_string(),
            machine_args: vec!["-c".to_string(), script.to_string()],
            device_args: Vec::new(),
            code: PathBuf::from("/dev/null"),
            vars_template: self.template(),
            extra_args: Vec::new(),
        }
    }

    fn run(&self, profile: FirmwareProfile, definition: ScriptDefinition) -> BootRun {
        BootRun::new(profile, definition)
            .vars_dir(self.vars.path())
            .close_grace(Duration::from_millis(100))
    }

    fn vars_left(&self) -> usize {
        count_entries(self.vars.path())
    }
}

fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_shell_boot_success_removes_vars() {
    let fixture = Fixture::new();
    let profile = fixture.profile(
        "sh",
        r#"printf 'Press F2 or any other key to continue'; read key; printf 'Shell> '; read cmd; [ "$cmd" = "reset -s" ]"#,
    );
    let definition = ScriptDefinition::shell_boot().with_prompt_timeout(Duration::from_secs(10));

    let outcome = fixture.run(profile, definition).run().await.unwrap();
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(fixture.vars_left(), 0);
    // The template itself is never touched.
    assert!(fixture.template().exists());
}

#[tokio::test]
async fn test_timeout_removes_vars() {
    let fixture = Fixture::new();
    let profile = fixture.profile("sh", "printf 'BdsDxe: loading Boot0001'; exec sleep 30");
    let definition = ScriptDefinition::shell_boot().with_prompt_timeout(Duration::from_secs(1));

    let outcome = fixture.run(profile, definition).run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Failure(FailureReason::Timeout { .. })
    ));
    assert!(!outcome.passes(None));
    assert_eq!(fixture.vars_left(), 0);
}

#[tokio::test]
async fn test_spawn_failure_removes_vars() {
    let fixture = Fixture::new();
    let profile = fixture.profile("/nonexistent/qemu-system-x86_64", "");

    let err = fixture
        .run(profile, ScriptDefinition::shell_boot())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spawn(_)));
    assert_eq!(fixture.vars_left(), 0);
}

#[tokio::test]
async fn test_missing_template() {
    let fixture = Fixture::new();
    let mut profile = fixture.profile("sh", "true");
    profile.vars_template = fixture.templates.path().join("missing.fd");

    let err = fixture
        .run(profile, ScriptDefinition::shell_boot())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Firmware(FirmwareError::VarsStore { .. })
    ));
    assert_eq!(fixture.vars_left(), 0);
}

#[tokio::test]
async fn test_vars_removal_failure_is_reported() {
    let fixture = Fixture::new();
    // Delete the vars copy behind the runner's back, then reach the shell.
    let profile = fixture.profile(
        "sh",
        r#"for a; do case "$a" in file=*uefi-vars-*) v=${a#file=}; rm -f "${v%%,*}";; esac; done; printf 'Shell> '; read cmd"#,
    );

    let err = fixture
        .run(profile, ScriptDefinition::shell_boot())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Firmware(FirmwareError::VarsCleanup { .. })
    ));
    assert!(err.to_string().contains("Failed to remove vars store"));
    assert_eq!(fixture.vars_left(), 0);
}

#[tokio::test]
async fn test_secure_boot_signed_bootloader() {
    let fixture = Fixture::new();
    let profile = fixture.profile(
        "sh",
        r#"printf 'Shell> '; read a; printf 'FS0:\\> '; read b; printf 'grub> '; read c; [ "$c" = halt ]"#,
    );
    let definition = ScriptDefinition::secure_boot(Arch::X64.removable_media_path())
        .with_prompt_timeout(Duration::from_secs(10));

    let outcome = fixture.run(profile, definition).run().await.unwrap();
    assert_eq!(outcome, Outcome::Verified(true));
    assert!(outcome.passes(Some(true)));
    assert!(!outcome.passes(Some(false)));
    assert_eq!(fixture.vars_left(), 0);
}

#[tokio::test]
async fn test_secure_boot_unsigned_bootloader() {
    let fixture = Fixture::new();
    let profile = fixture.profile(
        "sh",
        r#"printf 'Shell> '; read a; printf 'FS0:\\> '; read b; printf 'Command Error Status: Access Denied\r\nFS0:\\> '; read c; [ "$c" = "reset -s" ]"#,
    );
    let definition = ScriptDefinition::secure_boot(Arch::X64.removable_media_path())
        .with_prompt_timeout(Duration::from_secs(10));

    let outcome = fixture.run(profile, definition).run().await.unwrap();
    assert_eq!(outcome, Outcome::Verified(false));
    assert!(outcome.passes(Some(false)));
    assert_eq!(fixture.vars_left(), 0);
}
