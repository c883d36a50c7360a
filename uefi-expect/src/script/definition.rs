//! Prompt tables and scripted responses for the boot protocols.

use std::time::Duration;

use indexmap::IndexMap;
use regex::bytes::Regex;

use super::state::{Prompt, Protocol};
use crate::channel::PatternSet;

/// Everything a protocol run needs to know about the console.
///
/// The prompt table is ordered: when several prompts are in the buffer at
/// once, the one inserted first is handled first.
#[derive(Debug, Clone)]
pub struct ScriptDefinition {
    /// Protocol driven by this definition.
    pub protocol: Protocol,

    /// Prompt patterns, in priority order.
    pub prompts: IndexMap<Prompt, Regex>,

    /// Sent to dismiss the boot menu.
    pub escape: String,

    /// Sent at the shell prompt to select the removable-media filesystem.
    pub filesystem_command: String,

    /// Sent at the filesystem prompt to launch the bootloader.
    pub bootloader_path: String,

    /// Sent to reset the machine from the shell.
    pub reset_command: String,

    /// Sent to halt from the bootloader prompt.
    pub halt_command: String,

    /// How long to wait for each prompt.
    pub prompt_timeout: Duration,

    /// How long to wait for the child to exit after a reset or halt.
    pub reset_timeout: Duration,
}

const MENU_PROMPT: &str = r"Press .* or any other key to continue";
const SHELL_PROMPT: &str = r"Shell> ";
const FILESYSTEM_PROMPT: &str = r"FS0:\\> ";
const BOOTLOADER_PROMPT: &str = r"grub> ";
const ACCESS_DENIED: &str = r"Command Error Status: Access Denied";

fn builtin(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in prompt patterns are valid")
}

impl ScriptDefinition {
    fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            prompts: IndexMap::new(),
            escape: "\x1b".to_string(),
            filesystem_command: "fs0:".to_string(),
            bootloader_path: String::new(),
            reset_command: "reset -s".to_string(),
            halt_command: "halt".to_string(),
            prompt_timeout: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
        }
    }

    /// Boot to the UEFI Shell and reset.
    pub fn shell_boot() -> Self {
        let mut definition = Self::new(Protocol::ShellBoot);
        definition.prompts.insert(Prompt::Menu, builtin(MENU_PROMPT));
        definition.prompts.insert(Prompt::Shell, builtin(SHELL_PROMPT));
        definition
    }

    /// Launch `bootloader_path` from `fs0:` and report the secure-boot verdict.
    ///
    /// The verdict prompts come before the filesystem prompt: the firmware
    /// prints a fresh `FS0:\>` right after denying access, and the denial
    /// must be seen before the reset consumes it.
    pub fn secure_boot(bootloader_path: impl Into<String>) -> Self {
        let mut definition = Self::new(Protocol::SecureBoot);
        definition.bootloader_path = bootloader_path.into();
        definition.prompts.insert(Prompt::Menu, builtin(MENU_PROMPT));
        definition.prompts.insert(Prompt::Shell, builtin(SHELL_PROMPT));
        definition.prompts.insert(Prompt::Bootloader, builtin(BOOTLOADER_PROMPT));
        definition.prompts.insert(Prompt::AccessDenied, builtin(ACCESS_DENIED));
        definition.prompts.insert(Prompt::Filesystem, builtin(FILESYSTEM_PROMPT));
        definition
    }

    /// Replace (or add, at lowest priority) the pattern for a prompt.
    pub fn with_prompt(mut self, prompt: Prompt, pattern: &str) -> Result<Self, regex::Error> {
        self.prompts.insert(prompt, Regex::new(pattern)?);
        Ok(self)
    }

    /// Set the per-prompt timeout.
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Set how long to wait for the child to exit after reset or halt.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Compile the prompt table into a pattern set plus the prompt each
    /// pattern index stands for.
    pub fn pattern_set(&self) -> (PatternSet, Vec<Prompt>) {
        let prompts = self.prompts.keys().copied().collect();
        let set = self.prompts.values().cloned().collect();
        (set, prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_boot_prompts() {
        let definition = ScriptDefinition::shell_boot();
        let (set, prompts) = definition.pattern_set();
        assert_eq!(prompts, vec![Prompt::Menu, Prompt::Shell]);
        assert_eq!(set.len(), 2);

        let found = set.find(b"Press F2 or any other key to continue").unwrap();
        assert_eq!(prompts[found.index], Prompt::Menu);
        let found = set.find(b"\r\nShell> ").unwrap();
        assert_eq!(prompts[found.index], Prompt::Shell);
    }

    #[test]
    fn test_secure_boot_verdict_before_filesystem() {
        let definition = ScriptDefinition::secure_boot(r"\EFI\BOOT\BOOTX64.EFI");
        assert_eq!(definition.bootloader_path, r"\EFI\BOOT\BOOTX64.EFI");

        let (set, prompts) = definition.pattern_set();
        let found = set
            .find(b"Command Error Status: Access Denied\r\nFS0:\\> ")
            .unwrap();
        assert_eq!(prompts[found.index], Prompt::AccessDenied);

        let found = set.find(b"FS0:\\> ").unwrap();
        assert_eq!(prompts[found.index], Prompt::Filesystem);
    }

    #[test]
    fn test_with_prompt_keeps_position() {
        let definition = ScriptDefinition::shell_boot()
            .with_prompt(Prompt::Menu, r"Press ESC in \d+ seconds")
            .unwrap();
        let (set, prompts) = definition.pattern_set();
        assert_eq!(prompts, vec![Prompt::Menu, Prompt::Shell]);
        assert!(set.find(b"Press ESC in 5 seconds").is_some());
    }

    #[test]
    fn test_with_prompt_invalid() {
        assert!(ScriptDefinition::shell_boot()
            .with_prompt(Prompt::Shell, r"[")
            .is_err());
    }

    #[test]
    fn test_timeouts() {
        let definition = ScriptDefinition::shell_boot()
            .with_prompt_timeout(Duration::from_secs(5))
            .with_reset_timeout(Duration::from_secs(1));
        assert_eq!(definition.prompt_timeout, Duration::from_secs(5));
        assert_eq!(definition.reset_timeout, Duration::from_secs(1));
    }
}
