//! Platform detection for hook execution
//!
//! Provides OS and architecture information using standard Unix conventions:
//! - macOS → `"darwin"` (kernel name)
//! - Linux → `"linux"`
//! - Windows → `"windows"`
//!
//! Platform info is cached on first access.

use std::sync::LazyLock;

/// Current platform information (cached)
///
/// # Example
/// ```
/// use hitch_core::platform::CURRENT_PLATFORM;
///
/// let limit = CURRENT_PLATFORM.max_command_length();
/// assert!(limit > 0);
/// ```
pub static CURRENT_PLATFORM: LazyLock<Platform> = LazyLock::new(Platform::detect);

/// Platform information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// OS: "darwin" (macOS), "linux", "windows", "unknown"
    pub os: &'static str,
    /// CPU architecture: "x86_64", "aarch64", etc.
    pub arch: &'static str,
}

impl Platform {
    /// Detect the platform this binary was compiled for
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            arch: std::env::consts::ARCH,
        }
    }

    const fn detect_os() -> &'static str {
        #[cfg(target_os = "macos")]
        {
            "darwin"
        }

        #[cfg(target_os = "linux")]
        {
            "linux"
        }

        #[cfg(target_os = "windows")]
        {
            "windows"
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            "unknown"
        }
    }

    /// Upper bound (in bytes) for a single hook command line
    ///
    /// Kept well under the kernel limits since the environment shares the same
    /// budget on Unix.
    #[must_use]
    pub fn max_command_length(&self) -> usize {
        match self.os {
            "windows" => 32_000 - 2048,
            "darwin" => 256 * 1024 - 64 * 1024,
            _ => 128 * 1024 - 32 * 1024,
        }
    }
}
