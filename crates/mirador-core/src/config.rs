//! Process-wide runtime options.
//!
//! The only option today is the debug flag, which gates how much detail the
//! session runtime reports when something goes wrong.  It is read once from
//! the `MIRADOR_DEBUG` environment variable (`1`, `true`, or `yes`, case
//! insensitive) and may be flipped at runtime with [`set_debug`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static DEBUG: OnceLock<AtomicBool> = OnceLock::new();

fn cell() -> &'static AtomicBool {
    DEBUG.get_or_init(|| AtomicBool::new(debug_from_env()))
}

fn debug_from_env() -> bool {
    std::env::var("MIRADOR_DEBUG")
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Whether debug mode is enabled for this process.
pub fn debug() -> bool {
    cell().load(Ordering::Relaxed)
}

/// Enable or disable debug mode, overriding `MIRADOR_DEBUG`.
pub fn set_debug(enabled: bool) {
    cell().store(enabled, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_spellings() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("Yes"));
        assert!(is_truthy(" yes "));

        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("on"));
    }

    #[test]
    fn set_debug_overrides() {
        set_debug(true);
        assert!(debug());
        set_debug(false);
        assert!(!debug());
    }
}
