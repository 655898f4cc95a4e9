//! Weight packet shape shared by every federation round: the four namespaces
//! a client contributes to and downloads from the swarm, plus the
//! scrub-then-noise-then-checksum packaging pipeline.

use crate::error::{Error, Result};
use crate::privacy;
use chrono::{DateTime, Utc};
use rand::thread_rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Plugin version stamped into every outbound packet, per §6's wire schema.
pub const PACKET_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightPacket {
    pub tools: HashMap<String, f64>,
    pub errors: HashMap<String, f64>,
    pub commands: HashMap<String, f64>,
    pub teams: HashMap<String, f64>,
}

/// One of the four fixed namespaces a packet carries, per §6. A delta
/// download names which of these the server actually sent; categories not
/// named are left untouched on merge rather than pulled toward an implicit
/// empty map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightCategory {
    Tools,
    Errors,
    Commands,
    Teams,
}

pub const ALL_CATEGORIES: [WeightCategory; 4] = [
    WeightCategory::Tools,
    WeightCategory::Errors,
    WeightCategory::Commands,
    WeightCategory::Teams,
];

impl WeightPacket {
    fn merge_map(a: &HashMap<String, f64>, b: &HashMap<String, f64>, local_ratio: f64) -> HashMap<String, f64> {
        let mut out = HashMap::new();
        for key in a.keys().chain(b.keys()) {
            let av = a.get(key).copied().unwrap_or(0.0);
            let bv = b.get(key).copied().unwrap_or(0.0);
            out.insert(key.clone(), local_ratio * av + (1.0 - local_ratio) * bv);
        }
        out
    }

    /// Weighted-average merge: `local_ratio * self + (1 - local_ratio) * other`,
    /// keyed union of both sides, across all four categories.
    pub fn merge(&self, other: &WeightPacket, local_ratio: f64) -> WeightPacket {
        self.merge_categories(other, local_ratio, &ALL_CATEGORIES)
    }

    /// Same weighted-average merge, but only for the named categories —
    /// the rest of `self` passes through unchanged. This is what a delta
    /// download merges with: the server only shipped the categories that
    /// actually moved since the last sync, so categories it omitted must
    /// not be treated as having gone to zero.
    pub fn merge_categories(
        &self,
        other: &WeightPacket,
        local_ratio: f64,
        categories: &[WeightCategory],
    ) -> WeightPacket {
        let mut out = self.clone();
        for category in categories {
            match category {
                WeightCategory::Tools => out.tools = Self::merge_map(&self.tools, &other.tools, local_ratio),
                WeightCategory::Errors => out.errors = Self::merge_map(&self.errors, &other.errors, local_ratio),
                WeightCategory::Commands => {
                    out.commands = Self::merge_map(&self.commands, &other.commands, local_ratio)
                }
                WeightCategory::Teams => out.teams = Self::merge_map(&self.teams, &other.teams, local_ratio),
            }
        }
        out
    }
}

/// The packet as exchanged over the wire, per §6:
/// `{version, timestamp, checksum, weights, noise: σ}`. `checksum` covers
/// the noised weight vector plus `version` and `timestamp` (§4.7 step 3),
/// so a tampered or replayed packet fails verification even if the weights
/// themselves are untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedPacket {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    pub weights: WeightPacket,
    pub noise: f64,
}

/// A downloaded packet, optionally a delta: when `changed` is `Some`, only
/// those categories of `signed.weights` are populated with server data and
/// the client must merge only those into its local copy (§4.7 Download).
/// `changed: None` means the server sent a full packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaPacket {
    #[serde(flatten)]
    pub signed: SignedPacket,
    #[serde(default)]
    pub changed: Option<Vec<WeightCategory>>,
}

impl DeltaPacket {
    /// Categories this response actually carries — all four for a full
    /// packet, or whatever the server named for a delta.
    pub fn categories(&self) -> Vec<WeightCategory> {
        self.changed.clone().unwrap_or_else(|| ALL_CATEGORIES.to_vec())
    }
}

/// Hash the noised weight vector together with version and timestamp, in
/// that field order, so the checksum commits to all three.
pub fn checksum(weights: &WeightPacket, version: &str, timestamp: DateTime<Utc>) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(weights)?);
    hasher.update(version.as_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn verify_checksum(signed: &SignedPacket) -> Result<bool> {
    Ok(checksum(&signed.weights, &signed.version, signed.timestamp)? == signed.checksum)
}

/// Add zero-mean Gaussian noise (differential-privacy style) to every value
/// in the packet.
pub fn add_noise(packet: &WeightPacket, sigma: f64) -> WeightPacket {
    fn noisy_map(map: &HashMap<String, f64>, sigma: f64) -> HashMap<String, f64> {
        if sigma <= 0.0 {
            return map.clone();
        }
        let normal = Normal::new(0.0, sigma).expect("sigma must be finite and non-negative");
        let mut rng = thread_rng();
        map.iter()
            .map(|(k, v)| (k.clone(), v + normal.sample(&mut rng)))
            .collect()
    }

    WeightPacket {
        tools: noisy_map(&packet.tools, sigma),
        errors: noisy_map(&packet.errors, sigma),
        commands: noisy_map(&packet.commands, sigma),
        teams: noisy_map(&packet.teams, sigma),
    }
}

/// Scrub every key name in the packet (tool names, error messages, command
/// strings, and team pattern names can all carry embedded secrets or PII)
/// and abort if anything survives a re-scan.
pub fn scrub_packet(packet: &WeightPacket) -> Result<WeightPacket> {
    fn scrub_map(map: &HashMap<String, f64>) -> Result<HashMap<String, f64>> {
        let mut out = HashMap::new();
        for (key, value) in map {
            let scrubbed = privacy::scrub(key).text;
            let residual = privacy::validate_scrubbed(&scrubbed);
            if !residual.is_empty() {
                return Err(Error::scrub_residual(residual.len()));
            }
            out.insert(scrubbed, *value);
        }
        Ok(out)
    }

    Ok(WeightPacket {
        tools: scrub_map(&packet.tools)?,
        errors: scrub_map(&packet.errors)?,
        commands: scrub_map(&packet.commands)?,
        teams: scrub_map(&packet.teams)?,
    })
}

/// Full outbound packaging pipeline: scrub, add noise, checksum over
/// weights+version+timestamp. Aborts before any noise or checksum step if
/// scrubbing finds residual PII.
pub fn package(packet: &WeightPacket, noise_sigma: f64) -> Result<SignedPacket> {
    let scrubbed = scrub_packet(packet)?;
    let noisy = add_noise(&scrubbed, noise_sigma);
    let version = PACKET_VERSION.to_string();
    let timestamp = Utc::now();
    let checksum = checksum(&noisy, &version, timestamp)?;
    Ok(SignedPacket {
        version,
        timestamp,
        checksum,
        weights: noisy,
        noise: noise_sigma,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> WeightPacket {
        let mut tools = HashMap::new();
        tools.insert("grep".to_string(), 0.8);
        WeightPacket {
            tools,
            ..Default::default()
        }
    }

    fn sample_signed(packet: &WeightPacket) -> SignedPacket {
        let version = PACKET_VERSION.to_string();
        let timestamp = Utc::now();
        let checksum = checksum(packet, &version, timestamp).unwrap();
        SignedPacket {
            version,
            timestamp,
            checksum,
            weights: packet.clone(),
            noise: 0.0,
        }
    }

    #[test]
    fn checksum_round_trips() {
        let packet = sample_packet();
        let signed = sample_signed(&packet);
        assert!(verify_checksum(&signed).unwrap());
    }

    #[test]
    fn tampered_packet_fails_checksum() {
        let packet = sample_packet();
        let mut signed = sample_signed(&packet);
        signed.weights.tools.insert("curl".to_string(), 0.1);
        assert!(!verify_checksum(&signed).unwrap());
    }

    #[test]
    fn checksum_changes_if_version_or_timestamp_changes() {
        let packet = sample_packet();
        let timestamp = Utc::now();
        let a = checksum(&packet, "0.1.0", timestamp).unwrap();
        let b = checksum(&packet, "0.2.0", timestamp).unwrap();
        let c = checksum(&packet, "0.1.0", timestamp + chrono::Duration::seconds(1)).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn package_aborts_on_residual_secret_in_key() {
        let mut errors = HashMap::new();
        errors.insert("token=sk-ant-REDACTED".to_string(), 0.2);
        let packet = WeightPacket { errors, ..Default::default() };
        let result = package(&packet, 0.0);
        assert!(matches!(result, Err(Error::ScrubResidual(_))));
    }

    #[test]
    fn merge_combines_with_given_ratio() {
        let mut local = HashMap::new();
        local.insert("a".to_string(), 1.0);
        let mut global = HashMap::new();
        global.insert("a".to_string(), 0.0);
        let local_packet = WeightPacket { tools: local, ..Default::default() };
        let global_packet = WeightPacket { tools: global, ..Default::default() };
        let merged = local_packet.merge(&global_packet, 0.3);
        assert!((merged.tools["a"] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn merge_categories_leaves_unnamed_categories_untouched() {
        let mut local_tools = HashMap::new();
        local_tools.insert("grep".to_string(), 1.0);
        let mut local_errors = HashMap::new();
        local_errors.insert("timeout".to_string(), 1.0);
        let local = WeightPacket {
            tools: local_tools,
            errors: local_errors,
            ..Default::default()
        };

        let mut global_tools = HashMap::new();
        global_tools.insert("grep".to_string(), 0.0);
        let mut global_errors = HashMap::new();
        global_errors.insert("timeout".to_string(), 0.0);
        let global = WeightPacket {
            tools: global_tools,
            errors: global_errors,
            ..Default::default()
        };

        let merged = local.merge_categories(&global, 0.3, &[WeightCategory::Tools]);
        assert!((merged.tools["grep"] - 0.3).abs() < 1e-9);
        assert!((merged.errors["timeout"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn delta_packet_without_changed_list_reports_all_categories() {
        let packet = sample_packet();
        let signed = sample_signed(&packet);
        let delta = DeltaPacket { signed, changed: None };
        assert_eq!(delta.categories().len(), ALL_CATEGORIES.len());
    }

    #[test]
    fn delta_packet_with_changed_list_reports_only_those() {
        let packet = sample_packet();
        let signed = sample_signed(&packet);
        let delta = DeltaPacket {
            signed,
            changed: Some(vec![WeightCategory::Tools, WeightCategory::Teams]),
        };
        assert_eq!(delta.categories(), vec![WeightCategory::Tools, WeightCategory::Teams]);
    }
}
