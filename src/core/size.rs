//! Human-readable size strings to device sector counts
//!
//! Binary suffixes (`KiB`, `MiB`, `GiB`, `TiB`) scale by powers of 1024,
//! decimal suffixes (`K`, `M`, `G`, `T`, optionally followed by `B`) by powers
//! of 1000. The numeric part may be fractional; the byte count is rounded up
//! to whole sectors.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SizeError;

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*(KiB|MiB|GiB|TiB|KB|MB|GB|TB|K|M|G|T)\s*$")
        .expect("size regex is valid")
});

/// Multiplier in bytes for a unit suffix
fn unit_multiplier(unit: &str) -> Option<f64> {
    let multiplier = match unit {
        "KiB" => 1024_f64,
        "MiB" => 1024_f64.powi(2),
        "GiB" => 1024_f64.powi(3),
        "TiB" => 1024_f64.powi(4),
        "K" | "KB" => 1000_f64,
        "M" | "MB" => 1000_f64.powi(2),
        "G" | "GB" => 1000_f64.powi(3),
        "T" | "TB" => 1000_f64.powi(4),
        _ => return None,
    };
    Some(multiplier)
}

/// Parse a size string into bytes
pub fn to_bytes(size: &str) -> Result<f64, SizeError> {
    let invalid = || SizeError::InvalidFormat {
        size: size.to_string(),
    };

    let caps = SIZE_RE.captures(size).ok_or_else(invalid)?;
    let value: f64 = caps[1].parse().map_err(|_| invalid())?;
    let multiplier = unit_multiplier(&caps[2]).ok_or_else(invalid)?;

    Ok(value * multiplier)
}

/// Check that a size string parses and requests a non-zero amount
pub fn validate(size: &str) -> Result<(), SizeError> {
    if to_bytes(size)? > 0.0 {
        Ok(())
    } else {
        Err(SizeError::Zero {
            size: size.to_string(),
        })
    }
}

/// Convert a size string to a whole number of sectors, rounding up.
///
/// ```
/// use lithos::core::size::to_sectors;
///
/// assert_eq!(to_sectors("5GiB", 512).unwrap(), 10_485_760);
/// assert_eq!(to_sectors("10M", 512).unwrap(), 19_532);
/// assert!(to_sectors("512", 512).is_err());
/// ```
pub fn to_sectors(size: &str, sector_size: u32) -> Result<u64, SizeError> {
    if sector_size == 0 {
        return Err(SizeError::InvalidSectorSize { sector_size });
    }

    let bytes = to_bytes(size)?;
    let sectors = (bytes / f64::from(sector_size)).ceil();

    // u64::MAX is not exactly representable; anything at or above 2^64 overflows
    if !sectors.is_finite() || sectors >= 18_446_744_073_709_551_616_f64 {
        return Err(SizeError::Overflow {
            size: size.to_string(),
        });
    }

    if sectors < 1.0 {
        return Err(SizeError::Zero {
            size: size.to_string(),
        });
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(sectors as u64)
}

/// Check if a size string is in a recognised format and non-zero
pub fn is_valid_size(size: &str) -> bool {
    validate(size).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_binary_suffixes() {
        assert_eq!(to_sectors("1KiB", 512).unwrap(), 2);
        assert_eq!(to_sectors("512MiB", 512).unwrap(), 1_048_576);
        assert_eq!(to_sectors("5GiB", 512).unwrap(), 10_485_760);
        assert_eq!(to_sectors("1TiB", 4096).unwrap(), 268_435_456);
    }

    #[test]
    fn test_decimal_suffixes() {
        assert_eq!(to_sectors("10M", 512).unwrap(), 19_532);
        assert_eq!(to_sectors("10MB", 512).unwrap(), 19_532);
        assert_eq!(to_sectors("1K", 512).unwrap(), 2);
        assert_eq!(to_sectors("2G", 512).unwrap(), 3_906_250);
    }

    #[test]
    fn test_fractional_sizes_round_up() {
        assert_eq!(to_sectors("1.5KiB", 512).unwrap(), 3);
        assert_eq!(to_sectors("0.1K", 512).unwrap(), 1);
    }

    #[test]
    fn test_binary_suffix_wins_over_decimal() {
        // "MiB" must not be read as "M" followed by garbage
        assert_ne!(
            to_sectors("1MiB", 512).unwrap(),
            to_sectors("1M", 512).unwrap()
        );
    }

    #[test]
    fn test_unsuffixed_is_rejected() {
        assert_eq!(
            to_sectors("1024", 512),
            Err(SizeError::InvalidFormat {
                size: "1024".to_string()
            })
        );
    }

    #[test]
    fn test_malformed_is_rejected() {
        for size in ["", "GiB", "abcM", "1..5G", "-1G", "1 PiB", "5 gib"] {
            assert!(to_sectors(size, 512).is_err(), "'{size}' should be rejected");
        }
    }

    #[test]
    fn test_zero_sector_size_is_rejected() {
        assert_eq!(
            to_sectors("1GiB", 0),
            Err(SizeError::InvalidSectorSize { sector_size: 0 })
        );
    }

    #[test]
    fn test_zero_is_rejected() {
        for size in ["0MiB", "0.0G", "0K"] {
            assert_eq!(
                to_sectors(size, 512),
                Err(SizeError::Zero {
                    size: size.to_string()
                })
            );
            assert!(!is_valid_size(size));
        }
        assert!(validate("1MiB").is_ok());
    }

    #[test]
    fn test_overflow_is_rejected() {
        let huge = format!("{}TiB", "9".repeat(20));
        assert!(matches!(
            to_sectors(&huge, 1),
            Err(SizeError::Overflow { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Whole MiB counts map exactly onto 512-byte sectors
        #[test]
        fn prop_mib_is_exact(n in 1u64..100_000) {
            prop_assert_eq!(to_sectors(&format!("{n}MiB"), 512).unwrap(), n * 2048);
        }

        /// Sector count never undershoots the byte count
        #[test]
        fn prop_sectors_cover_bytes(n in 1u64..1_000_000, sector in prop_oneof![Just(512u32), Just(4096u32)]) {
            let sectors = to_sectors(&format!("{n}K"), sector).unwrap();
            prop_assert!(sectors * u64::from(sector) >= n * 1000);
            prop_assert!((sectors - 1) * u64::from(sector) < n * 1000);
        }
    }
}
