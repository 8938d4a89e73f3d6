use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use capeq_algo::Interrupt;
use rayon::ThreadPoolBuilder;
use tracing::warn;

pub fn configure_threads(spec: &str) {
    let count = if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse().unwrap_or_else(|_| num_cpus::get())
    };
    let _ = ThreadPoolBuilder::new().num_threads(count).build_global();
}

static SIGINT_TARGET: OnceLock<Interrupt> = OnceLock::new();

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    // Only an atomic store happens here
    if let Some(interrupt) = SIGINT_TARGET.get() {
        interrupt.trigger();
    }
}

/// Route SIGINT to `interrupt` so a running round stops at the next agent.
pub fn install_sigint(interrupt: &Interrupt) {
    if SIGINT_TARGET.set(interrupt.clone()).is_err() {
        return;
    }
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
}

/// Parse a `--deadline-secs` value into a wall-clock budget.
pub fn deadline(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("deadline must be a finite, non-negative number of seconds, got {secs}"))
}

/// Trigger `interrupt` once `delay` has elapsed.
pub fn spawn_deadline(interrupt: &Interrupt, delay: Duration) {
    let interrupt = interrupt.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        if !interrupt.is_triggered() {
            warn!(
                seconds = delay.as_secs_f64(),
                "deadline reached; stopping after the current agent"
            );
            interrupt.trigger();
        }
    });
}
