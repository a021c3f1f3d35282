//! Small helpers shared across the pipeline: path normalization,
//! identifier checks and the process-wide abort flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use regex::Regex;

/// Normalize a vendor path to forward slashes.
pub fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}

/// Wrap a script argument in double quotes.
pub fn quoted(text: &str) -> String {
    format!("\"{text}\"")
}

/// Trailing decimal digits of `s`, or `""` when it ends in none.
///
/// `PB8` yields `"8"`, `PC12` yields `"12"`.
pub fn digits_at_end(s: &str) -> &str {
    let start = s
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    &s[start..]
}

/// Whether `s` is a valid C identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_c_identifier(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
        .is_match(s)
}

/// Process-wide SIGINT flag.
///
/// Signal delivery is inherently global; the flag is exposed through a
/// start/stop lifecycle pair instead of being touched from arbitrary
/// places. The orchestrator polls [`signal::should_abort`] between
/// subsystems.
pub mod signal {
    use super::*;

    static ABORT: AtomicBool = AtomicBool::new(false);
    static INSTALLED: AtomicBool = AtomicBool::new(false);

    /// Install the Ctrl-C handler. The OS handler can only be
    /// registered once per process; restarting just clears the flag.
    pub fn start_watcher() {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            ABORT.store(false, Ordering::SeqCst);
            return;
        }
        if let Err(e) = ctrlc::set_handler(|| {
            ABORT.store(true, Ordering::SeqCst);
        }) {
            log::warn!("could not install SIGINT handler: {e}");
        }
    }

    /// Tear down the watcher state. The OS handler stays registered;
    /// any pending abort request is cleared so a later run starts
    /// clean.
    pub fn stop_watcher() {
        ABORT.store(false, Ordering::SeqCst);
    }

    pub fn should_abort() -> bool {
        ABORT.load(Ordering::SeqCst)
    }
}
