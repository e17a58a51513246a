//! Time and timing module.
//!
//! TSC-based timing with calibrated timeouts. The TSC frequency comes from
//! platform init; zero means "uncalibrated" and turns every deadline into a
//! pure iteration budget.

/// Read TSC (Time Stamp Counter).
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn get_tsc() -> u64 {
    let lo: u32;
    let hi: u32;
    unsafe {
        core::arch::asm!(
            "rdtsc",
            out("eax") lo,
            out("edx") hi,
            options(nostack, nomem, preserves_flags)
        );
    }
    ((hi as u64) << 32) | (lo as u64)
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn get_tsc() -> u64 {
    0
}

/// Timeout configuration derived from TSC frequency.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    ticks_per_ms: u64,
}

impl Timeouts {
    /// Create from TSC frequency.
    pub fn new(tsc_freq: u64) -> Self {
        Self {
            ticks_per_ms: tsc_freq / 1_000,
        }
    }

    /// ARP resolution for a UDP write (2 seconds)
    #[inline]
    pub fn arp(&self) -> u64 {
        self.ms_to_ticks(2_000)
    }

    #[inline]
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms * self.ticks_per_ms
    }

    /// Milliseconds since TSC reset, for smoltcp timestamps.
    #[inline]
    pub fn now_ms(&self) -> i64 {
        if self.ticks_per_ms == 0 {
            0
        } else {
            (get_tsc() / self.ticks_per_ms) as i64
        }
    }

    /// Whether `start + budget` has passed. Never true when uncalibrated.
    #[inline]
    pub fn expired(&self, start: u64, budget: u64) -> bool {
        self.ticks_per_ms != 0 && get_tsc().wrapping_sub(start) > budget
    }
}
