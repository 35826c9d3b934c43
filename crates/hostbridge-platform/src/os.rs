use std::borrow::Cow;

/// Reported when the host OS identifier is empty.
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// Map a Rust target OS name onto the identifier the UI expects
/// (`darwin`, `win32`, `linux`, ...).
///
/// Names without a dedicated mapping pass through unchanged.
#[must_use]
pub fn platform_identifier(os: &str) -> Cow<'static, str> {
    let mapped = match os.trim() {
        "" => UNKNOWN_PLATFORM,
        "macos" | "ios" => "darwin",
        "windows" => "win32",
        "linux" => "linux",
        "freebsd" => "freebsd",
        "openbsd" => "openbsd",
        "netbsd" => "netbsd",
        "android" => "android",
        "aix" => "aix",
        "solaris" | "illumos" => "sunos",
        other => return Cow::Owned(other.to_string()),
    };
    Cow::Borrowed(mapped)
}

#[must_use]
pub fn current_platform() -> Cow<'static, str> {
    platform_identifier(std::env::consts::OS)
}
