//! Progress coalescing
//!
//! Transfer clients report progress at whatever rate bytes arrive. Only
//! changes larger than a threshold are forwarded to the queue.

/// Forwards a progress fraction only when it moved more than `threshold`
/// since the last forwarded value.
///
/// One coalescer serves one transfer attempt.
#[derive(Debug, Clone)]
pub struct ProgressCoalescer {
    threshold: f64,
    last_emitted: f64,
}

impl ProgressCoalescer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(0.0),
            last_emitted: 0.0,
        }
    }

    /// Offer a new fraction; returns it when it should be emitted.
    pub fn offer(&mut self, fraction: f64) -> Option<f64> {
        if !fraction.is_finite() {
            return None;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction - self.last_emitted > self.threshold {
            self.last_emitted = fraction;
            Some(fraction)
        } else {
            None
        }
    }
}
