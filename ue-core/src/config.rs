//! UE configuration data (spec §6 "Non-goals" carve the NAS/security stack
//! out of the core's *behavior*, but the core still needs to carry the
//! identifiers and PLMN/session data that RRC and NAS are configured with).
//! Grounded on `ue.cpp`'s `ReadConfigYaml`/`GetConfigByUe`: parsing itself
//! (YAML there, TOML here) happens in the `ue` binary; this struct is pure
//! data, `Deserialize` so the binary can load it with `toml`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Plmn, PduSessionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleSlice {
    pub sst: u8,
    pub sd: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nssai {
    #[serde(default)]
    pub slices: Vec<SingleSlice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub apn: Option<String>,
    pub slice: Option<SingleSlice>,
    #[serde(rename = "type")]
    pub session_type: PduSessionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Op,
    Opc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedAlgorithms {
    pub nia1: bool,
    pub nia2: bool,
    pub nia3: bool,
    pub nea1: bool,
    pub nea2: bool,
    pub nea3: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityMaxRate {
    pub uplink_full: bool,
    pub downlink_full: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UacAic {
    pub mps: bool,
    pub mcs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UacAcc {
    pub normal_class: u8,
    pub class11: bool,
    pub class12: bool,
    pub class13: bool,
    pub class14: bool,
    pub class15: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UeConfig {
    pub supi: Option<String>,
    pub imei: Option<String>,
    pub imei_sv: Option<String>,

    pub home_plmn: Plmn,
    #[serde(default)]
    pub gnb_search_list: Vec<String>,

    #[serde(default)]
    pub default_configured_nssai: Nssai,
    #[serde(default)]
    pub configured_nssai: Nssai,

    pub key: String,
    pub op_c: String,
    pub op_type: OpType,
    pub amf: String,

    #[serde(default)]
    pub default_sessions: Vec<SessionConfig>,

    pub supported_algs: SupportedAlgorithms,
    pub integrity_max_rate: IntegrityMaxRate,
    pub uac_aic: UacAic,
    pub uac_acc: UacAcc,

    #[serde(default)]
    pub configure_routing: bool,
    #[serde(default)]
    pub disable_cmd: bool,
}

impl UeConfig {
    /// `getNodeName()`: `imsi-<supi>` when set, falling back to a stable
    /// placeholder so log line prefixes never collide across UEs in the
    /// same process (SPEC_FULL's "per-UE-node-name-prefixed logger
    /// targets").
    pub fn node_name(&self) -> String {
        match &self.supi {
            Some(supi) => supi.clone(),
            None => "ue".to_string(),
        }
    }

    /// `GetConfigByUe(ueIndex)`: clones this config for the `index`-th UE in
    /// a multi-UE launch, numerically incrementing its SUPI/IMEI/IMEISV by
    /// `index` the same way the original's `LargeSum`/`IncrementNumber` do.
    /// Per §7 "IMSI overflow" is a fatal config error, not a silent
    /// widening of the identifier.
    pub fn derive_for_index(&self, index: u32) -> Result<UeConfig, ConfigError> {
        let mut cloned = self.clone();
        if index == 0 {
            return Ok(cloned);
        }
        cloned.supi = self
            .supi
            .as_deref()
            .map(|s| increment_numeric_suffix("supi", s, index))
            .transpose()?;
        cloned.imei = self
            .imei
            .as_deref()
            .map(|s| increment_numeric_suffix("imei", s, index))
            .transpose()?;
        cloned.imei_sv = self
            .imei_sv
            .as_deref()
            .map(|s| increment_numeric_suffix("imei_sv", s, index))
            .transpose()?;
        Ok(cloned)
    }
}

/// Adds `delta` to the decimal number formed by `value`'s trailing digits,
/// preserving width via zero-padding and any non-digit prefix (e.g.
/// `imsi-001010000000001` -> `imsi-001010000000002`), mirroring
/// `LargeSum`/`IncrementNumber` in `ue.cpp`. Errors if the sum needs more
/// digits than `value` had, matching the original's throw on overflowing
/// carry rather than silently growing the identifier.
fn increment_numeric_suffix(field: &'static str, value: &str, delta: u32) -> Result<String, ConfigError> {
    let digit_start = value
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(value.len());

    let (prefix, digits) = value.split_at(digit_start);
    if digits.is_empty() {
        return Ok(value.to_string());
    }

    let width = digits.len();
    let number: u128 = digits.parse().unwrap_or(0);
    let incremented = number + delta as u128;
    let formatted = format!("{prefix}{incremented:0width$}", width = width);
    if formatted.len() != value.len() {
        return Err(ConfigError::NumericOverflow {
            field,
            value: value.to_string(),
            delta,
        });
    }
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_trailing_digits_preserving_width_and_prefix() {
        assert_eq!(
            increment_numeric_suffix("supi", "imsi-001010000000001", 1).unwrap(),
            "imsi-001010000000002"
        );
        assert_eq!(increment_numeric_suffix("supi", "001", 9).unwrap(), "010");
    }

    #[test]
    fn leaves_non_numeric_values_untouched() {
        assert_eq!(increment_numeric_suffix("supi", "no-digits-here", 5).unwrap(), "no-digits-here");
    }

    #[test]
    fn overflowing_the_existing_digit_width_is_a_config_error() {
        let err = increment_numeric_suffix("supi", "999", 1).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NumericOverflow { field: "supi", value: "999".to_string(), delta: 1 }
        );
    }

    #[test]
    fn derive_for_index_zero_is_identity() {
        let base = UeConfig {
            supi: Some("imsi-001010000000001".to_string()),
            imei: None,
            imei_sv: None,
            home_plmn: Plmn { mcc: 1, mnc: 1, is_long_mnc: false },
            gnb_search_list: vec![],
            default_configured_nssai: Nssai::default(),
            configured_nssai: Nssai::default(),
            key: "0".repeat(32),
            op_c: "0".repeat(32),
            op_type: OpType::Opc,
            amf: "0000".to_string(),
            default_sessions: vec![],
            supported_algs: SupportedAlgorithms {
                nia1: false,
                nia2: true,
                nia3: false,
                nea1: false,
                nea2: true,
                nea3: false,
            },
            integrity_max_rate: IntegrityMaxRate { uplink_full: true, downlink_full: true },
            uac_aic: UacAic { mps: false, mcs: false },
            uac_acc: UacAcc {
                normal_class: 0,
                class11: false,
                class12: false,
                class13: false,
                class14: false,
                class15: false,
            },
            configure_routing: true,
            disable_cmd: false,
        };

        let derived = base.derive_for_index(0).unwrap();
        assert_eq!(derived.supi, base.supi);

        let derived = base.derive_for_index(3).unwrap();
        assert_eq!(derived.supi.unwrap(), "imsi-001010000000004");
    }

    #[test]
    fn derive_for_index_propagates_overflow_as_a_config_error() {
        let base = UeConfig {
            supi: Some("999".to_string()),
            imei: None,
            imei_sv: None,
            home_plmn: Plmn { mcc: 1, mnc: 1, is_long_mnc: false },
            gnb_search_list: vec![],
            default_configured_nssai: Nssai::default(),
            configured_nssai: Nssai::default(),
            key: "0".repeat(32),
            op_c: "0".repeat(32),
            op_type: OpType::Opc,
            amf: "0000".to_string(),
            default_sessions: vec![],
            supported_algs: SupportedAlgorithms {
                nia1: false,
                nia2: true,
                nia3: false,
                nea1: false,
                nea2: true,
                nea3: false,
            },
            integrity_max_rate: IntegrityMaxRate { uplink_full: true, downlink_full: true },
            uac_aic: UacAic { mps: false, mcs: false },
            uac_acc: UacAcc {
                normal_class: 0,
                class11: false,
                class12: false,
                class13: false,
                class14: false,
                class15: false,
            },
            configure_routing: true,
            disable_cmd: false,
        };

        assert!(base.derive_for_index(1).is_err());
    }
}
