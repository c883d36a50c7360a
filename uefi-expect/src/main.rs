//! Boot a packaged UEFI firmware image under QEMU and check the console.
//!
//! # Usage
//!
//! Reach the UEFI Shell on the default OVMF image:
//! ```bash
//! uefi-boot-test --arch x64
//! ```
//!
//! Check that secure boot rejects an unsigned bootloader on a prepared disk:
//! ```bash
//! uefi-boot-test --arch x64 --machine q35 --flavor ms \
//!     --protocol secure-boot --disk unsigned.img --expect unsigned
//! ```
//!
//! Set `RUST_LOG=debug` for protocol tracing and `--debug` to mirror the
//! console to stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{error, info};

use uefi_expect::firmware::{Arch, FirmwareOptions, FirmwareProfile, Flavor, Machine};
use uefi_expect::runner::BootRun;
use uefi_expect::script::ScriptDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProtocolArg {
    /// Reach the UEFI Shell and reset
    Shell,
    /// Run the removable-media bootloader and report the verdict
    SecureBoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Expectation {
    /// The bootloader is signed and must run
    Signed,
    /// The bootloader is unsigned and must be denied
    Unsigned,
}

/// Test EDK2 images in QEMU.
#[derive(Debug, Parser)]
#[command(name = "uefi-boot-test", version)]
struct Args {
    /// Firmware architecture (X64, IA32, AARCH64, ARM)
    #[arg(long)]
    arch: Arch,

    /// x86_64 machine type (pc, q35)
    #[arg(long)]
    machine: Option<Machine>,

    /// Image flavor (ms, secboot)
    #[arg(long)]
    flavor: Option<Flavor>,

    /// Pflash size in MB (x86_64 defaults to 2)
    #[arg(long)]
    flash_size: Option<u32>,

    /// Raw disk image to attach
    #[arg(long)]
    disk: Vec<PathBuf>,

    /// SMBIOS OEM string as TYPE=VALUE
    #[arg(long, value_parser = parse_oem_string)]
    oem_string: Vec<(u32, String)>,

    /// Console protocol to drive
    #[arg(long, value_enum, default_value_t = ProtocolArg::Shell)]
    protocol: ProtocolArg,

    /// Expected secure boot verdict (secure-boot protocol only)
    #[arg(long, value_enum)]
    expect: Option<Expectation>,

    /// Bootloader to launch from fs0: (defaults to the removable-media path)
    #[arg(long)]
    bootloader: Option<String>,

    /// Seconds to wait for each prompt
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    timeout: u64,

    /// Mirror the console to stdout
    #[arg(long)]
    debug: bool,
}

fn parse_oem_string(s: &str) -> Result<(u32, String), String> {
    let (kind, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=VALUE, got '{}'", s))?;
    let kind = kind
        .parse()
        .map_err(|e| format!("invalid SMBIOS type '{}': {}", kind, e))?;
    Ok((kind, value.to_string()))
}

impl Args {
    fn definition(&self) -> ScriptDefinition {
        let definition = match self.protocol {
            ProtocolArg::Shell => ScriptDefinition::shell_boot(),
            ProtocolArg::SecureBoot => {
                let path = self
                    .bootloader
                    .clone()
                    .unwrap_or_else(|| self.arch.removable_media_path().to_string());
                ScriptDefinition::secure_boot(path)
            }
        };
        definition.with_prompt_timeout(Duration::from_secs(self.timeout))
    }

    fn options(&self) -> FirmwareOptions {
        FirmwareOptions {
            machine: self.machine,
            flavor: self.flavor,
            flash_size_mb: self.flash_size,
        }
    }

    fn expected_verdict(&self) -> Option<bool> {
        match self.protocol {
            ProtocolArg::Shell => None,
            ProtocolArg::SecureBoot => Some(self.expect != Some(Expectation::Unsigned)),
        }
    }
}

async fn run(args: &Args) -> uefi_expect::error::Result<bool> {
    let profile = FirmwareProfile::select(args.arch, &args.options())?;

    let mut boot = BootRun::new(profile, args.definition()).debug(args.debug);
    for disk in &args.disk {
        boot = boot.disk(disk);
    }
    for (kind, value) in &args.oem_string {
        boot = boot.oem_string(*kind, value);
    }

    let outcome = boot.run().await?;
    let passed = outcome.passes(args.expected_verdict());
    if passed {
        info!("PASS: {}", outcome);
    } else {
        error!("FAIL: {}", outcome);
    }
    Ok(passed)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oem_string() {
        assert_eq!(
            parse_oem_string("11=io.systemd.credential:x=y").unwrap(),
            (11, "io.systemd.credential:x=y".to_string())
        );
        assert!(parse_oem_string("novalue").is_err());
        assert!(parse_oem_string("eleven=x").is_err());
    }

    #[test]
    fn test_args_secure_boot_defaults() {
        let args = Args::parse_from([
            "uefi-boot-test",
            "--arch",
            "aarch64",
            "--protocol",
            "secure-boot",
            "--expect",
            "unsigned",
        ]);
        assert_eq!(args.expected_verdict(), Some(false));

        let definition = args.definition();
        assert_eq!(definition.bootloader_path, r"\EFI\BOOT\BOOTAA64.EFI");
        assert_eq!(definition.prompt_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_args_timeout_is_bounded() {
        for timeout in ["0", "86401", "18446744073709551615"] {
            assert!(
                Args::try_parse_from(["uefi-boot-test", "--arch", "x64", "--timeout", timeout])
                    .is_err()
            );
        }
        let args =
            Args::try_parse_from(["uefi-boot-test", "--arch", "x64", "--timeout", "86400"]).unwrap();
        assert_eq!(args.definition().prompt_timeout, Duration::from_secs(86_400));
    }

    #[test]
    fn test_args_x64_boots_legacy_image() {
        let args = Args::parse_from(["uefi-boot-test", "--arch", "x64"]);
        let profile = FirmwareProfile::select(args.arch, &args.options()).unwrap();
        assert_eq!(profile.code, PathBuf::from("/usr/share/OVMF/OVMF_CODE.fd"));
        assert_eq!(profile.vars_template, PathBuf::from("/usr/share/OVMF/OVMF_VARS.fd"));
    }

    #[test]
    fn test_args_shell_defaults() {
        let args = Args::parse_from(["uefi-boot-test", "--arch", "X64", "--timeout", "5"]);
        assert_eq!(args.protocol, ProtocolArg::Shell);
        assert_eq!(args.expected_verdict(), None);
        assert_eq!(args.definition().prompt_timeout, Duration::from_secs(5));
    }
}
