//! Fast timing utilities using direct clock_gettime calls
//!
//! This module provides ultra-fast timing for IO latency measurement.
//! Uses direct libc calls to avoid Rust's Instant overhead.

use std::time::Duration;

/// Fast timestamp using direct clock_gettime with CLOCK_MONOTONIC
///
/// This is faster than std::time::Instant because it bypasses Rust's
/// additional overhead and calls clock_gettime directly.
///
/// Resolution: Nanosecond (accurate for IO latency measurement)
/// Speed: ~15-20ns per call (vs ~25-30ns for std::time::Instant)
#[derive(Debug, Copy, Clone)]
pub struct FastInstant {
    nanos: u64,
}

impl FastInstant {
    /// Get the current time using CLOCK_MONOTONIC (accurate, nanosecond resolution)
    #[inline(always)]
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }
        
        let nanos = (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64);
        
        Self { nanos }
    }
    
    /// Get the current time using CLOCK_MONOTONIC_COARSE (fast, ~1ms resolution)
    ///
    /// Use this for duration checking where microsecond accuracy isn't needed.
    #[inline(always)]
    pub fn now_coarse() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC_COARSE, &mut ts);
        }
        
        let nanos = (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64);
        
        Self { nanos }
    }
    
    /// Calculate duration since another FastInstant
    #[inline(always)]
    pub fn duration_since(&self, earlier: FastInstant) -> Duration {
        let nanos = self.nanos.saturating_sub(earlier.nanos);
        Duration::from_nanos(nanos)
    }
    
    /// Get elapsed time since this instant
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        Self::now().duration_since(*self)
    }

    /// Raw tick value (nanoseconds since an arbitrary monotonic epoch).
    ///
    /// Used as the tick unit for `LatencyHistogram`/`TimeSeriesRing`, so
    /// `ticks_per_microsecond` is always `1000.0` for trials timed with this clock.
    #[inline(always)]
    pub fn ticks(&self) -> u64 {
        self.nanos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    
    #[test]
    fn test_fast_instant_basic() {
        let start = FastInstant::now();
        thread::sleep(Duration::from_millis(10));
        let end = FastInstant::now();
        
        let elapsed = end.duration_since(start);
        
        // Should be at least 10ms
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(50));
    }
    
    #[test]
    fn test_fast_instant_elapsed() {
        let start = FastInstant::now();
        thread::sleep(Duration::from_millis(10));
        
        let elapsed = start.elapsed();
        
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(50));
    }
    
    #[test]
    fn test_fast_instant_coarse() {
        let start = FastInstant::now_coarse();
        thread::sleep(Duration::from_millis(10));
        let end = FastInstant::now_coarse();
        
        let elapsed = end.duration_since(start);
        
        // Coarse clock has ~1ms resolution, so allow more variance
        assert!(elapsed >= Duration::from_millis(9));
        assert!(elapsed < Duration::from_millis(50));
    }
    
    #[test]
    fn test_fast_instant_ordering() {
        let t1 = FastInstant::now();
        thread::sleep(Duration::from_millis(1));
        let t2 = FastInstant::now();
        
        assert!(t2.nanos >= t1.nanos);
    }
}

