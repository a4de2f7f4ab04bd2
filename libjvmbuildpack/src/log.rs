use libcnb::Env;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable that switches on debug output when set to `DEBUG`.
pub const LOG_LEVEL_ENV_VAR: &str = "BP_LOG_LEVEL";

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn is_debug_enabled(env: &Env) -> bool {
    env.get(LOG_LEVEL_ENV_VAR)
        .is_some_and(|level| level.to_string_lossy().trim().eq_ignore_ascii_case("debug"))
}

/// Enables [`log_debug`] output for the rest of the process if the environment asks for it.
pub fn init_debug_logging(env: &Env) {
    DEBUG_ENABLED.store(is_debug_enabled(env), Ordering::Relaxed);
}

pub fn log_debug(message: impl AsRef<str>) {
    if DEBUG_ENABLED.load(Ordering::Relaxed) {
        println!("[Debug] {}", message.as_ref());
    }
}
