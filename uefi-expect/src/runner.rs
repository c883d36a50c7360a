//! One firmware boot, from vars store copy to outcome.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::driver::SessionBuilder;
use crate::error::{FirmwareError, Result};
use crate::firmware::{FirmwareProfile, QemuCommand, VarsStore};
use crate::script::{BootScript, Outcome, ScriptDefinition};

/// Configuration for a single boot of a firmware image.
///
/// # Example
///
/// ```rust,no_run
/// use uefi_expect::firmware::{Arch, FirmwareOptions, FirmwareProfile};
/// use uefi_expect::runner::BootRun;
/// use uefi_expect::script::ScriptDefinition;
///
/// # async fn example() -> Result<(), uefi_expect::Error> {
/// let profile = FirmwareProfile::select(Arch::X64, &FirmwareOptions::default())?;
/// let outcome = BootRun::new(profile, ScriptDefinition::shell_boot())
///     .debug(true)
///     .run()
///     .await?;
/// assert!(outcome.passes(None));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BootRun {
    profile: FirmwareProfile,
    definition: ScriptDefinition,
    disks: Vec<PathBuf>,
    oem_strings: Vec<(u32, String)>,
    vars_dir: Option<PathBuf>,
    close_grace: Duration,
    debug: bool,
}

impl BootRun {
    pub fn new(profile: FirmwareProfile, definition: ScriptDefinition) -> Self {
        Self {
            profile,
            definition,
            disks: Vec::new(),
            oem_strings: Vec::new(),
            vars_dir: None,
            close_grace: Duration::from_secs(2),
            debug: false,
        }
    }

    /// Attach a raw disk image.
    pub fn disk(mut self, path: impl Into<PathBuf>) -> Self {
        self.disks.push(path.into());
        self
    }

    /// Add an SMBIOS OEM string.
    pub fn oem_string(mut self, kind: u32, value: impl Into<String>) -> Self {
        self.oem_strings.push((kind, value.into()));
        self
    }

    /// Create the vars store copy in `dir` instead of the system temp dir.
    pub fn vars_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.vars_dir = Some(dir.into());
        self
    }

    /// How long to wait for the emulator to exit on its own when closing.
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Mirror the console to stdout.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Build the emulator command line for a given vars store path.
    pub fn command(&self, vars: &Path) -> QemuCommand {
        let command = self
            .disks
            .iter()
            .fold(QemuCommand::new(&self.profile, vars), |command, disk| {
                command.disk(disk)
            });
        self.oem_strings
            .iter()
            .fold(command, |command, (kind, value)| command.oem_string(*kind, value))
    }

    /// Boot the firmware and drive the console to a terminal state.
    ///
    /// The vars store copy and the emulator process are released on every
    /// path out of this function, including spawn failures and timeouts.
    pub async fn run(self) -> Result<Outcome> {
        let vars = match &self.vars_dir {
            Some(dir) => VarsStore::create_in(dir, &self.profile.vars_template)?,
            None => VarsStore::create(&self.profile.vars_template)?,
        };

        let vars_path = vars.path().to_path_buf();
        let argv = self.command(&vars_path).into_args();
        info!("Booting {} firmware {}", self.profile.arch, self.profile.code.display());

        let spawned = SessionBuilder::new(argv)
            .close_grace(self.close_grace)
            .debug(self.debug)
            .spawn();
        let mut session = match spawned {
            Ok(session) => session,
            Err(e) => {
                if let Err(remove) = vars.close() {
                    warn!("Failed to remove vars store: {}", remove);
                }
                return Err(e);
            }
        };

        let outcome = BootScript::new(self.definition).run(&mut session).await;
        let closed = session.close().await;
        let removed = vars.close();

        let outcome = outcome?;
        let status = closed?;
        removed.map_err(|source| FirmwareError::VarsCleanup {
            path: vars_path,
            source,
        })?;

        info!("Emulator exited with {}: {}", status, outcome);
        Ok(outcome)
    }
}
