//! Canonical key vocabulary shared by every calculator module.
//!
//! Keys serialize as their stable snake_case identifiers (`co_lmin`,
//! `svr_wood`, ...). The set is closed: strings outside it are rejected when
//! parsed or deserialized, so a typo in one calculator cannot silently create
//! a key nobody else reads.

use crate::units::Unit;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Bumped whenever a key is added; keys are never renamed or removed.
pub const VOCABULARY_VERSION: u32 = 1;

/// A stable identifier addressing one value across calculator modules
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    // Anthropometrics
    HeightCm,
    WeightKg,
    BsaM2,
    // Fick inputs
    HrBpm,
    HgbGDl,
    Sao2Pct,
    Svo2Pct,
    Vo2MlMin,
    // Flows
    CoLmin,
    CiLminM2,
    CoMethod,
    // Pressures
    MapMmhg,
    CvpMmhg,
    RapMmhg,
    PaspMmhg,
    PadpMmhg,
    MpapMmhg,
    PawpMmhg,
    // Resistances
    SvrWood,
    SvrDyn,
    SvrUnits,
    PvrWood,
    PvrDyn,
    PvrUnits,
    // Derived indices
    Papi,
    CpoW,
    CpiWM2,
}

/// Whether a key carries a number or a token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Numeric,
    Token,
}

/// Registry entry describing a canonical key
#[derive(Clone, Debug)]
pub struct KeySpec {
    pub key: CanonicalKey,
    pub id: &'static str,
    pub label: &'static str,
    pub kind: KeyKind,
    /// Storage unit for numeric keys
    pub unit: Option<Unit>,
}

impl CanonicalKey {
    pub const ALL: [CanonicalKey; 27] = [
        CanonicalKey::HeightCm,
        CanonicalKey::WeightKg,
        CanonicalKey::BsaM2,
        CanonicalKey::HrBpm,
        CanonicalKey::HgbGDl,
        CanonicalKey::Sao2Pct,
        CanonicalKey::Svo2Pct,
        CanonicalKey::Vo2MlMin,
        CanonicalKey::CoLmin,
        CanonicalKey::CiLminM2,
        CanonicalKey::CoMethod,
        CanonicalKey::MapMmhg,
        CanonicalKey::CvpMmhg,
        CanonicalKey::RapMmhg,
        CanonicalKey::PaspMmhg,
        CanonicalKey::PadpMmhg,
        CanonicalKey::MpapMmhg,
        CanonicalKey::PawpMmhg,
        CanonicalKey::SvrWood,
        CanonicalKey::SvrDyn,
        CanonicalKey::SvrUnits,
        CanonicalKey::PvrWood,
        CanonicalKey::PvrDyn,
        CanonicalKey::PvrUnits,
        CanonicalKey::Papi,
        CanonicalKey::CpoW,
        CanonicalKey::CpiWM2,
    ];

    /// The stable string identifier
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalKey::HeightCm => "height_cm",
            CanonicalKey::WeightKg => "weight_kg",
            CanonicalKey::BsaM2 => "bsa_m2",
            CanonicalKey::HrBpm => "hr_bpm",
            CanonicalKey::HgbGDl => "hgb_g_dl",
            CanonicalKey::Sao2Pct => "sao2_pct",
            CanonicalKey::Svo2Pct => "svo2_pct",
            CanonicalKey::Vo2MlMin => "vo2_ml_min",
            CanonicalKey::CoLmin => "co_lmin",
            CanonicalKey::CiLminM2 => "ci_lmin_m2",
            CanonicalKey::CoMethod => "co_method",
            CanonicalKey::MapMmhg => "map_mmhg",
            CanonicalKey::CvpMmhg => "cvp_mmhg",
            CanonicalKey::RapMmhg => "rap_mmhg",
            CanonicalKey::PaspMmhg => "pasp_mmhg",
            CanonicalKey::PadpMmhg => "padp_mmhg",
            CanonicalKey::MpapMmhg => "mpap_mmhg",
            CanonicalKey::PawpMmhg => "pawp_mmhg",
            CanonicalKey::SvrWood => "svr_wood",
            CanonicalKey::SvrDyn => "svr_dyn",
            CanonicalKey::SvrUnits => "svr_units",
            CanonicalKey::PvrWood => "pvr_wood",
            CanonicalKey::PvrDyn => "pvr_dyn",
            CanonicalKey::PvrUnits => "pvr_units",
            CanonicalKey::Papi => "papi",
            CanonicalKey::CpoW => "cpo_w",
            CanonicalKey::CpiWM2 => "cpi_w_m2",
        }
    }

    /// Registry entry for this key
    pub fn spec(self) -> &'static KeySpec {
        // Every variant is registered; see `test_registry_is_complete`.
        &KEY_REGISTRY.by_key[&self]
    }

    pub fn kind(self) -> KeyKind {
        self.spec().kind
    }

    pub fn unit(self) -> Option<Unit> {
        self.spec().unit
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        KEY_REGISTRY
            .by_id
            .get(s.trim())
            .copied()
            .ok_or_else(|| Error::UnknownKey(s.to_string()))
    }
}

struct KeyRegistry {
    by_key: HashMap<CanonicalKey, KeySpec>,
    by_id: HashMap<&'static str, CanonicalKey>,
}

/// Built once; the vocabulary never changes at runtime
static KEY_REGISTRY: Lazy<KeyRegistry> = Lazy::new(build_registry);

fn build_registry() -> KeyRegistry {
    use CanonicalKey as K;
    use KeyKind::{Numeric, Token};

    let entries: [(CanonicalKey, &'static str, KeyKind, Option<Unit>); 27] = [
        (K::HeightCm, "Height", Numeric, Some(Unit::Centimeters)),
        (K::WeightKg, "Weight", Numeric, Some(Unit::Kilograms)),
        (K::BsaM2, "Body surface area", Numeric, Some(Unit::SquareMeters)),
        (K::HrBpm, "Heart rate", Numeric, Some(Unit::BeatsPerMin)),
        (K::HgbGDl, "Hemoglobin", Numeric, Some(Unit::GramsPerDl)),
        (K::Sao2Pct, "Arterial saturation", Numeric, Some(Unit::Percent)),
        (K::Svo2Pct, "Mixed venous saturation", Numeric, Some(Unit::Percent)),
        (K::Vo2MlMin, "Oxygen consumption", Numeric, Some(Unit::MlPerMin)),
        (K::CoLmin, "Cardiac output", Numeric, Some(Unit::LitersPerMin)),
        (K::CiLminM2, "Cardiac index", Numeric, Some(Unit::LitersPerMinPerM2)),
        (K::CoMethod, "Cardiac output method", Token, None),
        (K::MapMmhg, "Mean arterial pressure", Numeric, Some(Unit::MmHg)),
        (K::CvpMmhg, "Central venous pressure", Numeric, Some(Unit::MmHg)),
        (K::RapMmhg, "Right atrial pressure", Numeric, Some(Unit::MmHg)),
        (K::PaspMmhg, "PA systolic pressure", Numeric, Some(Unit::MmHg)),
        (K::PadpMmhg, "PA diastolic pressure", Numeric, Some(Unit::MmHg)),
        (K::MpapMmhg, "Mean PA pressure", Numeric, Some(Unit::MmHg)),
        (K::PawpMmhg, "PA wedge pressure", Numeric, Some(Unit::MmHg)),
        (K::SvrWood, "SVR", Numeric, Some(Unit::WoodUnits)),
        (K::SvrDyn, "SVR", Numeric, Some(Unit::DynSecCm5)),
        (K::SvrUnits, "SVR units", Token, None),
        (K::PvrWood, "PVR", Numeric, Some(Unit::WoodUnits)),
        (K::PvrDyn, "PVR", Numeric, Some(Unit::DynSecCm5)),
        (K::PvrUnits, "PVR units", Token, None),
        (K::Papi, "PAPi", Numeric, Some(Unit::Unitless)),
        (K::CpoW, "Cardiac power output", Numeric, Some(Unit::Watts)),
        (K::CpiWM2, "Cardiac power index", Numeric, Some(Unit::WattsPerM2)),
    ];

    let mut by_key = HashMap::new();
    let mut by_id = HashMap::new();
    for (key, label, kind, unit) in entries {
        by_id.insert(key.as_str(), key);
        by_key.insert(
            key,
            KeySpec {
                key,
                id: key.as_str(),
                label,
                kind,
                unit,
            },
        );
    }

    KeyRegistry { by_key, by_id }
}
