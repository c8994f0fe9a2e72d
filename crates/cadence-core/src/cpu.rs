//! Process CPU time probe.
//!
//! Reads user + system CPU time of the current process with
//! `getrusage(RUSAGE_SELF)`. Non-Unix targets always report zero. A
//! `cpuTime` output control needs an interval above zero, so on those
//! targets it never fires.

use std::time::Duration;

/// Total CPU time (user + system) consumed by this process so far.
///
/// Returns [`Duration::ZERO`] if the reading fails.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn process_cpu_time() -> Duration {
    // SAFETY: an all-zero `rusage` is a valid value, and `getrusage` only
    // writes into the struct we pass. The return code is checked.
    let usage = unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &raw mut usage) != 0 {
            return Duration::ZERO;
        }
        usage
    };
    timeval_to_duration(usage.ru_utime).saturating_add(timeval_to_duration(usage.ru_stime))
}

/// Non-Unix fallback: CPU time is unavailable.
#[cfg(not(unix))]
pub const fn process_cpu_time() -> Duration {
    Duration::ZERO
}

/// Convert a `timeval`, clamping negative or out-of-range fields.
#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec.clamp(0, 999_999)).unwrap_or(0);
    Duration::from_secs(secs).saturating_add(Duration::from_micros(micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_time_is_monotonic() {
        let before = process_cpu_time();
        let mut acc: u64 = 0;
        for i in 0..200_000_u64 {
            acc = acc.wrapping_add(i.wrapping_mul(i));
        }
        assert!(acc > 0);
        let after = process_cpu_time();
        assert!(after >= before);
    }

    #[cfg(unix)]
    #[test]
    fn timeval_conversion_clamps() {
        let tv = libc::timeval {
            tv_sec: -5,
            tv_usec: 2_000_000,
        };
        assert_eq!(timeval_to_duration(tv), Duration::from_micros(999_999));

        let tv = libc::timeval {
            tv_sec: 2,
            tv_usec: 500_000,
        };
        assert_eq!(timeval_to_duration(tv), Duration::from_millis(2500));
    }

    #[cfg(not(unix))]
    #[test]
    fn cpu_time_is_unavailable() {
        assert_eq!(process_cpu_time(), Duration::ZERO);
    }
}
