use crate::motion;
use crate::position::PositionFix;

/// Outcome of gating one averaged sample.
///
/// Promotion is unconditional: the pipeline always advances its notion of
/// "now", even under poor geometry. The gate only decides whether the
/// apparent displacement is trustworthy enough to recompute motion and
/// advance the baseline.
#[derive(Clone, Copy, Debug)]
pub struct GateDecision {
    pub displacement_m: f64,
    pub effective_m: f64,
    pub recompute_motion: bool,
}

/// Scales the displacement requirement with signal quality: the noisier
/// the fix (higher PDOP), the more apparent movement it takes before the
/// gate trusts it as real motion rather than jitter.
pub struct QualityGate {
    pdop_threshold: f64,
    min_distance_m: f64,
}

impl QualityGate {
    pub fn new(pdop_threshold: f64, min_distance_m: f64) -> Self {
        QualityGate {
            pdop_threshold,
            min_distance_m,
        }
    }

    /// Evaluate a candidate against the current motion baseline.
    ///
    /// The effective value is
    /// `pdop_threshold * distance / max(candidate_pdop, pdop_threshold)`;
    /// the threshold doubles as a floor so PDOP near zero cannot blow up
    /// the ratio. Motion is recomputed only when the effective value
    /// exceeds `min_distance_m`.
    pub fn admit(&self, candidate: &PositionFix, previous: &PositionFix) -> GateDecision {
        let displacement_m = motion::distance_m(
            previous.latitude,
            previous.longitude,
            candidate.latitude,
            candidate.longitude,
        );

        let denominator = candidate.pdop.max(self.pdop_threshold);
        let effective_m = self.pdop_threshold * displacement_m / denominator;

        GateDecision {
            displacement_m,
            effective_m,
            recompute_motion: effective_m > self.min_distance_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lon: f64, pdop: f64) -> PositionFix {
        let mut f = PositionFix::new(lat, lon, 0);
        f.pdop = pdop;
        f
    }

    #[test]
    fn test_clean_displacement_passes() {
        // ~55.6 m north at PDOP 1.0 against a 20 m threshold
        let gate = QualityGate::new(3.0, 20.0);
        let previous = fix(10.0, 20.0, 1.0);
        let candidate = fix(10.0005, 20.0, 1.0);

        let decision = gate.admit(&candidate, &previous);
        assert!(decision.recompute_motion);
        assert!((decision.displacement_m - 55.6).abs() < 0.5);
        // PDOP below the threshold floors out: effective equals displacement
        assert!((decision.effective_m - decision.displacement_m).abs() < 1e-9);
    }

    #[test]
    fn test_small_displacement_rejected() {
        let gate = QualityGate::new(3.0, 20.0);
        let previous = fix(10.0, 20.0, 1.0);
        let candidate = fix(10.0001, 20.0, 1.0); // ~11 m

        assert!(!gate.admit(&candidate, &previous).recompute_motion);
    }

    #[test]
    fn test_high_pdop_suppresses_marginal_motion() {
        // 55.6 m passes at PDOP 3 but not at PDOP 12: 3 * 55.6 / 12 = 13.9 m
        let gate = QualityGate::new(3.0, 20.0);
        let previous = fix(10.0, 20.0, 1.0);

        let clean = gate.admit(&fix(10.0005, 20.0, 3.0), &previous);
        assert!(clean.recompute_motion);

        let noisy = gate.admit(&fix(10.0005, 20.0, 12.0), &previous);
        assert!(!noisy.recompute_motion);
    }

    #[test]
    fn test_monotonic_in_pdop() {
        // Fixed displacement: raising PDOP never flips rejected to accepted
        let gate = QualityGate::new(3.0, 20.0);
        let previous = fix(10.0, 20.0, 1.0);

        let mut accepted_after_rejection = false;
        let mut seen_rejection = false;
        for step in 0..40 {
            let pdop = 0.5 + step as f64 * 0.5;
            let decision = gate.admit(&fix(10.0005, 20.0, pdop), &previous);
            if seen_rejection && decision.recompute_motion {
                accepted_after_rejection = true;
            }
            if !decision.recompute_motion {
                seen_rejection = true;
            }
        }
        assert!(!accepted_after_rejection);
    }

    #[test]
    fn test_low_pdop_uses_threshold_floor() {
        // PDOP -> 0 behaves exactly like PDOP == pdop_threshold
        let gate = QualityGate::new(3.0, 20.0);
        let previous = fix(10.0, 20.0, 1.0);

        let at_zero = gate.admit(&fix(10.0005, 20.0, 0.0), &previous);
        let at_threshold = gate.admit(&fix(10.0005, 20.0, 3.0), &previous);
        assert!((at_zero.effective_m - at_threshold.effective_m).abs() < 1e-9);
    }
}
