//! Small helpers shared by the passes

pub mod performance;

pub use performance::{PerformanceMonitor, TimingRecord};

/// Greatest common divisor, `gcd(0, 0) == 0`
pub fn gcd(mut a: i64, mut b: i64) -> i64 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Least common multiple, `None` on overflow
pub fn lcm(a: i64, b: i64) -> Option<i64> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)).checked_mul(b).map(i64::abs)
}
