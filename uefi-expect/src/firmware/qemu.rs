//! QEMU argument vector assembly.

use std::path::Path;

use super::FirmwareProfile;

/// Arguments shared by every firmware, as used by ovmf-vars-generator.
const COMMON_ARGS: &[&str] = &[
    "-no-user-config",
    "-nodefaults",
    "-m",
    "256",
    "-smp",
    "2,sockets=2,cores=1,threads=1",
    "-display",
    "none",
    "-serial",
    "stdio",
];

/// An emulator command line for one firmware boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QemuCommand {
    args: Vec<String>,
}

impl QemuCommand {
    /// Boot `profile` with `vars` as the writable variable store.
    pub fn new(profile: &FirmwareProfile, vars: &Path) -> Self {
        let mut args = vec![profile.emulator.clone()];
        args.extend(profile.machine_args.iter().cloned());
        args.extend(COMMON_ARGS.iter().map(|s| s.to_string()));
        args.extend(profile.device_args.iter().cloned());
        args.extend([
            "-drive".to_string(),
            format!(
                "file={},if=pflash,format=raw,unit=0,readonly=on",
                profile.code.display()
            ),
            "-drive".to_string(),
            format!(
                "file={},if=pflash,format=raw,unit=1,readonly=off",
                vars.display()
            ),
        ]);
        args.extend(profile.extra_args.iter().cloned());
        Self { args }
    }

    /// Attach a raw disk image.
    pub fn disk(mut self, path: &Path) -> Self {
        self.args.push("-drive".to_string());
        self.args.push(format!("file={},format=raw", path.display()));
        self
    }

    /// Add an SMBIOS OEM string of the given structure type.
    pub fn oem_string(mut self, kind: u32, value: &str) -> Self {
        // QEMU option values escape a literal comma by doubling it.
        let value = value.replace(',', ",,");
        self.args.push("-smbios".to_string());
        self.args.push(format!("type={},value={}", kind, value));
        self
    }

    /// Get the argument vector, program first.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Consume the command, returning the argument vector.
    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}
