//! # Effectiveness Report Module
//!
//! Calcola quanto è stata efficace la compressione e genera il feedback per l'utente.
//!
//! ## Tier (soglie inclusive, valutate dalla più alta):
//! - `excellent`: ≥ 50%
//! - `good`: ≥ 20%
//! - `moderate`: ≥ 5% (warning + suggerimento di usare un preset più forte)
//! - `minimal`: ≥ 0% (warning + probabili cause)
//! - `increased`: < 0%, il file è cresciuto (warning + tenere l'originale)

use crate::file_manager::FileManager;
use serde::Serialize;

/// Effectiveness bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Excellent,
    Good,
    Moderate,
    Minimal,
    Increased,
}

impl Tier {
    pub fn for_ratio(ratio_percent: f64) -> Self {
        if ratio_percent >= 50.0 {
            Self::Excellent
        } else if ratio_percent >= 20.0 {
            Self::Good
        } else if ratio_percent >= 5.0 {
            Self::Moderate
        } else if ratio_percent >= 0.0 {
            Self::Minimal
        } else {
            Self::Increased
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Moderate => "moderate",
            Self::Minimal => "minimal",
            Self::Increased => "increased",
        }
    }
}

/// User-facing summary of a successful compression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessReport {
    pub original_size: u64,
    pub compressed_size: u64,
    pub ratio_percent: f64,
    pub tier: Tier,
    pub message: String,
    pub warnings: Vec<String>,
    pub tips: Vec<String>,
}

impl EffectivenessReport {
    /// Signed: negative when the output grew
    pub fn saved_bytes(&self) -> i64 {
        self.original_size as i64 - self.compressed_size as i64
    }

    pub fn saved_bytes_formatted(&self) -> String {
        let saved = self.saved_bytes();
        let formatted = FileManager::format_size(saved.unsigned_abs());
        if saved < 0 {
            format!("-{}", formatted)
        } else {
            formatted
        }
    }
}

/// Build the report for a pair of sizes. Total: equal or larger output is a valid result.
pub fn report(original_size: u64, compressed_size: u64) -> EffectivenessReport {
    let ratio_percent = round2(FileManager::calculate_reduction(original_size, compressed_size));
    let tier = Tier::for_ratio(ratio_percent);

    let (message, warnings, tips): (&str, &[&str], &[&str]) = match tier {
        Tier::Excellent => (
            "PDF compressed successfully - Excellent compression achieved!",
            &[],
            &[],
        ),
        Tier::Good => ("PDF compressed successfully - Good compression achieved", &[], &[]),
        Tier::Moderate => (
            "PDF compressed successfully - Moderate compression achieved",
            &["This PDF had limited compression potential. It may already be optimized."],
            &["Try a stronger preset (e.g., \"strong\") for more compression, though quality may decrease."],
        ),
        Tier::Minimal => (
            "PDF processed - Minimal compression achieved",
            &["This PDF is already well-optimized. Compression had minimal effect."],
            &["This usually happens with: text-only PDFs, already-compressed PDFs, or vector graphics."],
        ),
        Tier::Increased => (
            "PDF processed - File size increased slightly",
            &["The compressed file is slightly larger than the original."],
            &["This can happen with already-optimized PDFs. Consider keeping the original file or try the \"strong\" preset."],
        ),
    };

    EffectivenessReport {
        original_size,
        compressed_size,
        ratio_percent,
        tier,
        message: message.to_string(),
        warnings: warnings.iter().map(|w| w.to_string()).collect(),
        tips: tips.iter().map(|t| t.to_string()).collect(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_tiers_are_exhaustive_and_exclusive() {
        let cases = [
            (60.0, Tier::Excellent),
            (30.0, Tier::Good),
            (10.0, Tier::Moderate),
            (1.0, Tier::Minimal),
            (-5.0, Tier::Increased),
        ];
        for (ratio, tier) in cases {
            assert_eq!(Tier::for_ratio(ratio), tier, "ratio {}", ratio);
        }
    }

    #[test]
    fn test_tier_boundaries_are_inclusive() {
        assert_eq!(Tier::for_ratio(50.0), Tier::Excellent);
        assert_eq!(Tier::for_ratio(49.99), Tier::Good);
        assert_eq!(Tier::for_ratio(20.0), Tier::Good);
        assert_eq!(Tier::for_ratio(5.0), Tier::Moderate);
        assert_eq!(Tier::for_ratio(0.0), Tier::Minimal);
        assert_eq!(Tier::for_ratio(-0.01), Tier::Increased);
    }

    #[test]
    fn test_conservative_example_is_good() {
        let report = report(10 * MB, 6 * MB);
        assert_eq!(report.ratio_percent, 40.0);
        assert_eq!(report.tier, Tier::Good);
        assert!(report.warnings.is_empty());
        assert_eq!(report.saved_bytes(), (4 * MB) as i64);
    }

    #[test]
    fn test_aggressive_example_is_excellent() {
        let report = report(10 * MB, 3 * MB);
        assert_eq!(report.ratio_percent, 70.0);
        assert_eq!(report.tier, Tier::Excellent);
    }

    #[test]
    fn test_growth_is_reported_not_rejected() {
        let report = report(10 * MB, 10 * MB + MB / 2);
        assert_eq!(report.ratio_percent, -5.0);
        assert_eq!(report.tier, Tier::Increased);
        assert!(!report.warnings.is_empty());
        assert!(!report.tips.is_empty());
        assert!(report.saved_bytes() < 0);
        assert_eq!(report.saved_bytes_formatted(), "-512.00 KB");
    }

    #[test]
    fn test_advisories_per_tier() {
        assert_eq!(report(100, 90).tier, Tier::Moderate);
        assert_eq!(report(100, 90).warnings.len(), 1);
        assert_eq!(report(100, 99).tier, Tier::Minimal);
        assert_eq!(report(100, 99).tips.len(), 1);
        assert_eq!(report(100, 100).ratio_percent, 0.0);
    }

    #[test]
    fn test_empty_original_does_not_divide_by_zero() {
        let report = report(0, 0);
        assert_eq!(report.ratio_percent, 0.0);
        assert_eq!(report.tier, Tier::Minimal);
    }

    #[test]
    fn test_ratio_rounded_to_two_decimals() {
        assert_eq!(report(3, 2).ratio_percent, 33.33);
    }
}
