//! Deterministic fingerprints of configurations.
//!
//! A fingerprint is the BLAKE3 hash of a value's canonical JSON. Structs
//! serialize fields in declaration order and maps should be `BTreeMap`, so
//! the same parameters always produce the same fingerprint. Backtest and
//! calibration reports embed one so results trace back to their inputs.

use serde::Serialize;

/// Hex length kept in reports.
pub const SHORT_LEN: usize = 16;

/// Full 64-character hex fingerprint.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// First [`SHORT_LEN`] hex characters of [`fingerprint`].
pub fn short_fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut full = fingerprint(value)?;
    full.truncate(SHORT_LEN);
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringConfig;

    #[test]
    fn identical_configs_share_a_fingerprint() {
        let a = short_fingerprint(&ScoringConfig::default()).unwrap();
        let b = short_fingerprint(&ScoringConfig::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), SHORT_LEN);
    }

    #[test]
    fn any_parameter_change_moves_the_fingerprint() {
        let base = fingerprint(&ScoringConfig::default()).unwrap();
        let changed = fingerprint(&ScoringConfig {
            rr_floor: 1.2,
            ..ScoringConfig::default()
        })
        .unwrap();
        assert_ne!(base, changed);
        assert_eq!(base.len(), 64);
    }
}
