// SPDX-License-Identifier: AGPL-3.0-only

//! Validation harness for the halo-exchange binaries.
//!
//! Every validation binary follows the same pattern:
//!   - Expected values computed from a single-process reference
//!   - Explicit pass/fail checks against [`crate::tolerances`]
//!   - Exit code 0 (all checks pass) or 1 (any check fails)
//!
//! Ranks run their own harness; the driver merges them with
//! [`ValidationHarness::absorb`] and reports once.

use std::fmt;
use std::process;

use tracing::{error, info};

/// A single validation check with result tracking.
#[derive(Debug, Clone)]
pub struct Check {
    /// Human-readable label
    pub label: String,
    /// Whether this check passed
    pub passed: bool,
    /// Observed value
    pub observed: f64,
    /// Expected value
    pub expected: f64,
    /// Tolerance used
    pub tolerance: f64,
    /// How the tolerance was applied
    pub mode: ToleranceMode,
}

/// How a tolerance threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    /// |observed - expected| <= tolerance
    Absolute,
    /// |observed - expected| / |expected| < tolerance
    Relative,
    /// observed < threshold (upper bound only)
    UpperBound,
    /// Bit-for-bit equality
    Exact,
}

impl fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => write!(f, "abs"),
            Self::Relative => write!(f, "rel"),
            Self::UpperBound => write!(f, "<"),
            Self::Exact => write!(f, "=="),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = if self.passed { "✓" } else { "✗" };
        write!(
            f,
            "{icon} {}: observed={:.6e}, expected={:.6e}, tol={:.2e} ({})",
            self.label, self.observed, self.expected, self.tolerance, self.mode
        )
    }
}

/// Accumulates validation checks and produces a summary with exit code.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    /// Name of the validation binary or scenario
    pub name: String,
    /// All checks performed
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    /// Create a new harness for a named validation binary.
    #[must_use = "validation harness must be used to run checks"]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, passed: bool, observed: f64, expected: f64, tolerance: f64, mode: ToleranceMode) {
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            mode,
        });
    }

    /// Absolute check: |observed - expected| <= tolerance. A zero tolerance
    /// demands equality.
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = (observed - expected).abs() <= tolerance;
        self.push(label, passed, observed, expected, tolerance, ToleranceMode::Absolute);
    }

    /// Relative check: |observed - expected| / |expected| < tolerance
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = if expected.abs() > f64::EPSILON {
            ((observed - expected) / expected).abs() < tolerance
        } else {
            observed.abs() < tolerance
        };
        self.push(label, passed, observed, expected, tolerance, ToleranceMode::Relative);
    }

    /// Upper-bound check: observed < threshold
    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) {
        self.push(label, observed < threshold, observed, threshold, threshold, ToleranceMode::UpperBound);
    }

    /// Count check: `observed == expected` for integer quantities such as
    /// mismatching sites or allocation counts.
    pub fn check_count(&mut self, label: &str, observed: usize, expected: usize) {
        #[allow(clippy::cast_precision_loss)]
        let (o, e) = (observed as f64, expected as f64);
        self.push(label, observed == expected, o, e, 0.0, ToleranceMode::Exact);
    }

    /// Add a boolean pass/fail check.
    pub fn check_bool(&mut self, label: &str, passed: bool) {
        self.push(label, passed, f64::from(u8::from(passed)), 1.0, 0.0, ToleranceMode::Exact);
    }

    /// Move `other`'s checks into this harness, labels prefixed by its name.
    pub fn absorb(&mut self, other: Self) {
        for mut c in other.checks {
            c.label = format!("{}: {}", other.name, c.label);
            self.checks.push(c);
        }
    }

    /// Number of checks that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Total number of checks.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether all checks passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// 0 when every check passed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed())
    }

    /// Summary header followed by one line per check.
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "═══ {} validation: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        )];
        lines.extend(self.checks.iter().map(|c| format!("  {c}")));
        lines
    }

    /// Log the summary and exit with [`exit_code`](Self::exit_code).
    pub fn finish(&self) -> ! {
        for line in self.summary() {
            info!("{line}");
        }
        if self.all_passed() {
            info!("ALL CHECKS PASSED");
        } else {
            let failed: Vec<&str> = self
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| c.label.as_str())
                .collect();
            error!("FAILED CHECKS: {}", failed.join(", "));
        }
        process::exit(self.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_tracks_pass_fail() {
        let mut h = ValidationHarness::new("test");
        h.check_abs("exact", 1.0, 1.0, 0.0);
        h.check_abs("close", 1.0001, 1.0, 1e-3);
        h.check_abs("far", 2.0, 1.0, 1e-3);
        assert_eq!(h.passed_count(), 2);
        assert_eq!(h.total_count(), 3);
        assert!(!h.all_passed());
        assert_eq!(h.exit_code(), 1);
    }

    #[test]
    fn zero_tolerance_demands_equality() {
        let mut h = ValidationHarness::new("test");
        h.check_abs("equal", 0.25, 0.25, 0.0);
        h.check_abs("ulp off", 0.25, 0.25 + f64::EPSILON, 0.0);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn relative_check_handles_zero() {
        let mut h = ValidationHarness::new("test");
        h.check_rel("near_zero", 1e-15, 0.0, 1e-10);
        h.check_rel("obs_large", 1.0, 0.0, 1e-10);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn check_upper_boundary_equal_fails() {
        let mut h = ValidationHarness::new("test");
        h.check_upper("below", 0.5, 1.0);
        h.check_upper("at", 1.0, 1.0);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn counts_and_bools() {
        let mut h = ValidationHarness::new("test");
        h.check_count("mismatched sites", 0, 0);
        h.check_count("allocations", 2, 1);
        h.check_bool("phase idle", true);
        assert_eq!(h.passed_count(), 2);
        assert_eq!(h.checks[1].mode, ToleranceMode::Exact);
    }

    #[test]
    fn absorb_prefixes_labels() {
        let mut all = ValidationHarness::new("halo");
        let mut r1 = ValidationHarness::new("rank 1");
        r1.check_bool("ghost t+", false);
        all.absorb(r1);
        assert_eq!(all.checks[0].label, "rank 1: ghost t+");
        assert_eq!(all.exit_code(), 1);
    }

    #[test]
    fn summary_counts_and_icons() {
        let mut h = ValidationHarness::new("my_validation");
        h.check_abs("a", 1.0, 1.0, 1e-10);
        h.check_abs("b", 2.0, 1.0, 0.1);
        let s = h.summary().join("\n");
        assert!(s.contains("my_validation"));
        assert!(s.contains("1/2"));
        assert!(s.contains('✓'));
        assert!(s.contains('✗'));
    }

    #[test]
    fn harness_zero_checks() {
        let h = ValidationHarness::new("empty");
        assert_eq!(h.total_count(), 0);
        assert!(h.all_passed());
        assert_eq!(h.exit_code(), 0);
    }

    #[test]
    fn tolerance_mode_display_all_variants() {
        assert_eq!(ToleranceMode::Absolute.to_string(), "abs");
        assert_eq!(ToleranceMode::Relative.to_string(), "rel");
        assert_eq!(ToleranceMode::UpperBound.to_string(), "<");
        assert_eq!(ToleranceMode::Exact.to_string(), "==");
    }
}
