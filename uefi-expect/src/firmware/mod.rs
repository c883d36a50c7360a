//! Firmware images and the QEMU invocation that boots them.
//!
//! Selecting an image is a table lookup on architecture, machine type,
//! flavor and flash size. Each run gets its own copy of the vars template
//! ([`VarsStore`]) so variable writes never leak between runs.

mod qemu;
mod vars;

pub use qemu::QemuCommand;
pub use vars::VarsStore;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::FirmwareError;

/// Firmware architecture, named after the EDK2 target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X64,
    Ia32,
    Aarch64,
    Arm,
}

impl Arch {
    /// Default bootloader path on removable media.
    pub fn removable_media_path(&self) -> &'static str {
        match self {
            Arch::X64 => r"\EFI\BOOT\BOOTX64.EFI",
            Arch::Ia32 => r"\EFI\BOOT\BOOTIA32.EFI",
            Arch::Aarch64 => r"\EFI\BOOT\BOOTAA64.EFI",
            Arch::Arm => r"\EFI\BOOT\BOOTARM.EFI",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Arch::X64 => "X64",
            Arch::Ia32 => "IA32",
            Arch::Aarch64 => "AARCH64",
            Arch::Arm => "ARM",
        };
        f.write_str(name)
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "X64" | "X86_64" | "AMD64" => Ok(Arch::X64),
            "IA32" | "I386" => Ok(Arch::Ia32),
            "AARCH64" | "ARM64" => Ok(Arch::Aarch64),
            "ARM" => Ok(Arch::Arm),
            _ => Err(format!("unknown architecture '{}'", s)),
        }
    }
}

/// Build variants of the x86 images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Secure boot enabled with Microsoft keys enrolled.
    Ms,
    /// Secure boot capable, no keys enrolled.
    Secboot,
}

impl FromStr for Flavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ms" => Ok(Flavor::Ms),
            "secboot" => Ok(Flavor::Secboot),
            _ => Err(format!("unknown flavor '{}'", s)),
        }
    }
}

/// x86 machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Machine {
    #[default]
    Pc,
    Q35,
}

impl Machine {
    fn qemu_arg(&self) -> &'static str {
        match self {
            Machine::Pc => "pc,accel=tcg",
            Machine::Q35 => "q35,accel=tcg",
        }
    }
}

impl FromStr for Machine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pc" => Ok(Machine::Pc),
            "q35" => Ok(Machine::Q35),
            _ => Err(format!("unknown machine type '{}'", s)),
        }
    }
}

/// Options narrowing down which image of an architecture to boot.
#[derive(Debug, Clone, Default)]
pub struct FirmwareOptions {
    /// x86_64 only; defaults to `pc`.
    pub machine: Option<Machine>,

    /// x86 only.
    pub flavor: Option<Flavor>,

    /// Pflash size in MB; 2 (default) or 4 for x86_64, 4 for ia32.
    pub flash_size_mb: Option<u32>,
}

/// A firmware image plus the emulator arguments it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareProfile {
    pub arch: Arch,

    /// Emulator executable.
    pub emulator: String,

    /// Machine and CPU selection.
    pub machine_args: Vec<String>,

    /// Serial devices for the architecture.
    pub device_args: Vec<String>,

    /// Read-only code image.
    pub code: PathBuf,

    /// Template copied into each run's vars store.
    pub vars_template: PathBuf,

    /// Workarounds for specific images.
    pub extra_args: Vec<String>,
}

const OVMF_DIR: &str = "/usr/share/OVMF";
const AAVMF_DIR: &str = "/usr/share/AAVMF";

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl FirmwareProfile {
    /// Look up the image and emulator arguments for `arch`.
    pub fn select(arch: Arch, options: &FirmwareOptions) -> Result<Self, FirmwareError> {
        let unsupported = |detail: &str| FirmwareError::Unsupported {
            arch,
            detail: detail.to_string(),
        };

        match arch {
            Arch::X64 => Self::ovmf(options),
            Arch::Ia32 => {
                if options.machine == Some(Machine::Pc) {
                    return Err(unsupported("the pc machine type"));
                }
                if options.flavor == Some(Flavor::Ms) {
                    return Err(unsupported("the ms flavor"));
                }
                match options.flash_size_mb {
                    None | Some(4) => {}
                    Some(size) => return Err(FirmwareError::UnsupportedFlashSize(size)),
                }
                Ok(Self {
                    arch,
                    emulator: "qemu-system-i386".to_string(),
                    machine_args: args(&["-machine", Machine::Q35.qemu_arg()]),
                    device_args: Vec::new(),
                    code: PathBuf::from(OVMF_DIR).join("OVMF32_CODE_4M.secboot.fd"),
                    vars_template: PathBuf::from(OVMF_DIR).join("OVMF32_VARS_4M.fd"),
                    extra_args: Vec::new(),
                })
            }
            Arch::Aarch64 | Arch::Arm => {
                if options.machine.is_some() {
                    return Err(unsupported("x86 machine types"));
                }
                if options.flavor.is_some() {
                    return Err(unsupported("image flavors"));
                }
                if let Some(size) = options.flash_size_mb {
                    return Err(FirmwareError::UnsupportedFlashSize(size));
                }
                let (cpu, prefix) = match arch {
                    Arch::Aarch64 => ("cortex-a57", "AAVMF"),
                    _ => ("cortex-a15", "AAVMF32"),
                };
                Ok(Self {
                    arch,
                    emulator: "qemu-system-aarch64".to_string(),
                    machine_args: args(&["-cpu", cpu, "-machine", "virt"]),
                    device_args: args(&["-device", "virtio-serial-device"]),
                    code: PathBuf::from(AAVMF_DIR).join(format!("{}_CODE.fd", prefix)),
                    vars_template: PathBuf::from(AAVMF_DIR).join(format!("{}_VARS.fd", prefix)),
                    extra_args: Vec::new(),
                })
            }
        }
    }

    fn ovmf(options: &FirmwareOptions) -> Result<Self, FirmwareError> {
        let flash_size_mb = options.flash_size_mb.unwrap_or(2);
        let size_ext = match flash_size_mb {
            2 => "",
            4 => "_4M",
            other => return Err(FirmwareError::UnsupportedFlashSize(other)),
        };

        let (code_ext, vars_ext) = match options.flavor {
            Some(Flavor::Ms) => (".ms", ".ms"),
            Some(Flavor::Secboot) => (".secboot", ""),
            None => ("", ""),
        };

        // Legacy 2 MB secure boot images have a 64-bit PEI without S3 support.
        let extra_args = if flash_size_mb == 2 && options.flavor.is_some() {
            args(&["-global", "ICH9-LPC.disable_s3=1"])
        } else {
            Vec::new()
        };

        let machine = options.machine.unwrap_or_default();
        Ok(Self {
            arch: Arch::X64,
            emulator: "qemu-system-x86_64".to_string(),
            machine_args: args(&["-machine", machine.qemu_arg()]),
            device_args: args(&[
                "-chardev",
                "pty,id=charserial1",
                "-device",
                "isa-serial,chardev=charserial1,id=serial1",
            ]),
            code: PathBuf::from(OVMF_DIR).join(format!("OVMF_CODE{}{}.fd", size_ext, code_ext)),
            vars_template: PathBuf::from(OVMF_DIR)
                .join(format!("OVMF_VARS{}{}.fd", size_ext, vars_ext)),
            extra_args,
        })
    }
}
