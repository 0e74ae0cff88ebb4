//! Core domain types for the hemodynamics workshop.
//!
//! This module defines the fundamental types used throughout the system:
//! - Calculator entries and their line items
//! - Workshop session context
//! - The consolidated per-study snapshot row

use crate::keys::{CanonicalKey, KeyKind, VOCABULARY_VERSION};
use crate::units::{format_value, Unit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Calculator Entries
// ============================================================================

/// Calculator module that produced an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcType {
    Fick,
    Svr,
    Pvr,
    Cpo,
    Papi,
}

impl CalcType {
    pub const ALL: [CalcType; 5] = [
        CalcType::Fick,
        CalcType::Svr,
        CalcType::Pvr,
        CalcType::Cpo,
        CalcType::Papi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CalcType::Fick => "fick",
            CalcType::Svr => "svr",
            CalcType::Pvr => "pvr",
            CalcType::Cpo => "cpo",
            CalcType::Papi => "papi",
        }
    }
}

impl fmt::Display for CalcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalcType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let wanted = s.trim().to_lowercase();
        CalcType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| crate::Error::InvalidEntry(format!("unknown calculator type: {}", s)))
    }
}

/// One labelled value on a calculator report
///
/// Only items carrying a `key` take part in cross-module lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<CanonicalKey>,
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LineItem {
    /// Keyed item labelled from the registry
    pub fn keyed(key: CanonicalKey, value: impl Into<String>) -> Self {
        let spec = key.spec();
        Self {
            key: Some(key),
            label: spec.label.to_string(),
            value: value.into(),
            unit: spec.unit.map(|u| u.label().to_string()).filter(|l| !l.is_empty()),
            detail: None,
        }
    }

    /// Keyed numeric item in the key's storage unit
    pub fn number(key: CanonicalKey, value: f64) -> Self {
        Self::keyed(key, format_value(value, 4))
    }

    /// Free-form item that no other module can look up
    pub fn plain(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: None,
            label: label.into(),
            value: value.into(),
            unit: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The result of one completed calculation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalcEntry {
    #[serde(rename = "type")]
    pub calc_type: CalcType,
    pub timestamp_millis: i64,
    pub title: String,
    #[serde(default)]
    pub inputs: Vec<LineItem>,
    #[serde(default)]
    pub outputs: Vec<LineItem>,
    #[serde(default)]
    pub notes: Vec<LineItem>,
}

impl CalcEntry {
    pub fn new(calc_type: CalcType, timestamp_millis: i64, title: impl Into<String>) -> Self {
        Self {
            calc_type,
            timestamp_millis,
            title: title.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn input(mut self, item: LineItem) -> Self {
        self.inputs.push(item);
        self
    }

    pub fn output(mut self, item: LineItem) -> Self {
        self.outputs.push(item);
        self
    }

    pub fn note(mut self, item: LineItem) -> Self {
        self.notes.push(item);
        self
    }

    /// Keyed items that participate in lookup (inputs then outputs)
    pub fn keyed_items(&self) -> impl Iterator<Item = (CanonicalKey, &LineItem)> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .filter_map(|item| item.key.map(|k| (k, item)))
    }
}

// ============================================================================
// Session Context
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkshopMode {
    /// Ad-hoc calculations, nothing persisted
    #[default]
    Quick,
    /// Calculations belong to a patient study and are autosaved
    PatientStudy,
}

/// Which workshop is active and for whom
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkshopSessionContext {
    pub mode: WorkshopMode,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub study_id: Option<String>,
    /// When the study started; defaults to the first save time
    #[serde(default)]
    pub started_at_millis: Option<i64>,
}

impl WorkshopSessionContext {
    pub fn quick() -> Self {
        Self::default()
    }

    pub fn patient_study(patient_id: impl Into<String>, study_id: impl Into<String>) -> Self {
        Self {
            mode: WorkshopMode::PatientStudy,
            patient_id: Some(patient_id.into()),
            study_id: Some(study_id.into()),
            started_at_millis: None,
        }
    }

    pub fn started_at(mut self, millis: i64) -> Self {
        self.started_at_millis = Some(millis);
        self
    }

    /// Study id autosave writes to, if autosave applies to this context
    pub fn autosave_study_id(&self) -> Option<&str> {
        if self.mode != WorkshopMode::PatientStudy {
            return None;
        }
        self.study_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

// ============================================================================
// Consolidated Snapshot Row
// ============================================================================

/// The single persisted record per study
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedSnapshotRow {
    pub id: Uuid,
    pub study_id: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    pub started_at_millis: i64,
    pub created_at_millis: i64,
    pub updated_at_millis: i64,

    // Anthropometrics
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bsa_m2: Option<f64>,

    // Fick inputs
    pub hr_bpm: Option<f64>,
    pub hgb_g_dl: Option<f64>,
    pub sao2_pct: Option<f64>,
    pub svo2_pct: Option<f64>,
    pub vo2_ml_min: Option<f64>,

    // Pressures
    pub map_mmhg: Option<f64>,
    pub cvp_mmhg: Option<f64>,
    pub rap_mmhg: Option<f64>,
    pub pasp_mmhg: Option<f64>,
    pub padp_mmhg: Option<f64>,
    pub mpap_mmhg: Option<f64>,
    pub pawp_mmhg: Option<f64>,

    // Flows
    pub co_lmin: Option<f64>,
    pub ci_lmin_m2: Option<f64>,
    pub co_method: Option<String>,

    // Derived outputs
    pub svr_wood: Option<f64>,
    pub svr_dyn: Option<f64>,
    pub svr_units: Option<String>,
    pub pvr_wood: Option<f64>,
    pub pvr_dyn: Option<f64>,
    pub pvr_units: Option<String>,
    pub papi: Option<f64>,
    pub cpo_w: Option<f64>,
    pub cpi_w_m2: Option<f64>,

    #[serde(default)]
    pub calc_types: Vec<CalcType>,
    #[serde(default)]
    pub workshop_complete: bool,
    /// Key vocabulary the row was written under
    #[serde(default = "first_vocabulary_version")]
    pub vocabulary_version: u32,
}

/// Rows saved before the version was recorded used the first vocabulary
fn first_vocabulary_version() -> u32 {
    1
}

impl ConsolidatedSnapshotRow {
    /// Empty row for a study saved for the first time at `now`
    pub fn new(study_id: impl Into<String>, now_millis: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            study_id: study_id.into(),
            patient_id: None,
            started_at_millis: now_millis,
            created_at_millis: now_millis,
            updated_at_millis: now_millis,
            height_cm: None,
            weight_kg: None,
            bsa_m2: None,
            hr_bpm: None,
            hgb_g_dl: None,
            sao2_pct: None,
            svo2_pct: None,
            vo2_ml_min: None,
            map_mmhg: None,
            cvp_mmhg: None,
            rap_mmhg: None,
            pasp_mmhg: None,
            padp_mmhg: None,
            mpap_mmhg: None,
            pawp_mmhg: None,
            co_lmin: None,
            ci_lmin_m2: None,
            co_method: None,
            svr_wood: None,
            svr_dyn: None,
            svr_units: None,
            pvr_wood: None,
            pvr_dyn: None,
            pvr_units: None,
            papi: None,
            cpo_w: None,
            cpi_w_m2: None,
            calc_types: Vec::new(),
            workshop_complete: false,
            vocabulary_version: VOCABULARY_VERSION,
        }
    }

    fn numeric_slot_mut(&mut self, key: CanonicalKey) -> Option<&mut Option<f64>> {
        use CanonicalKey as K;
        let slot = match key {
            K::HeightCm => &mut self.height_cm,
            K::WeightKg => &mut self.weight_kg,
            K::BsaM2 => &mut self.bsa_m2,
            K::HrBpm => &mut self.hr_bpm,
            K::HgbGDl => &mut self.hgb_g_dl,
            K::Sao2Pct => &mut self.sao2_pct,
            K::Svo2Pct => &mut self.svo2_pct,
            K::Vo2MlMin => &mut self.vo2_ml_min,
            K::MapMmhg => &mut self.map_mmhg,
            K::CvpMmhg => &mut self.cvp_mmhg,
            K::RapMmhg => &mut self.rap_mmhg,
            K::PaspMmhg => &mut self.pasp_mmhg,
            K::PadpMmhg => &mut self.padp_mmhg,
            K::MpapMmhg => &mut self.mpap_mmhg,
            K::PawpMmhg => &mut self.pawp_mmhg,
            K::CoLmin => &mut self.co_lmin,
            K::CiLminM2 => &mut self.ci_lmin_m2,
            K::SvrWood => &mut self.svr_wood,
            K::SvrDyn => &mut self.svr_dyn,
            K::PvrWood => &mut self.pvr_wood,
            K::PvrDyn => &mut self.pvr_dyn,
            K::Papi => &mut self.papi,
            K::CpoW => &mut self.cpo_w,
            K::CpiWM2 => &mut self.cpi_w_m2,
            K::CoMethod | K::SvrUnits | K::PvrUnits => return None,
        };
        Some(slot)
    }

    fn token_slot_mut(&mut self, key: CanonicalKey) -> Option<&mut Option<String>> {
        match key {
            CanonicalKey::CoMethod => Some(&mut self.co_method),
            CanonicalKey::SvrUnits => Some(&mut self.svr_units),
            CanonicalKey::PvrUnits => Some(&mut self.pvr_units),
            _ => None,
        }
    }

    /// Stored numeric value for a key (`None` for token keys)
    pub fn numeric(&self, key: CanonicalKey) -> Option<f64> {
        use CanonicalKey as K;
        match key {
            K::HeightCm => self.height_cm,
            K::WeightKg => self.weight_kg,
            K::BsaM2 => self.bsa_m2,
            K::HrBpm => self.hr_bpm,
            K::HgbGDl => self.hgb_g_dl,
            K::Sao2Pct => self.sao2_pct,
            K::Svo2Pct => self.svo2_pct,
            K::Vo2MlMin => self.vo2_ml_min,
            K::MapMmhg => self.map_mmhg,
            K::CvpMmhg => self.cvp_mmhg,
            K::RapMmhg => self.rap_mmhg,
            K::PaspMmhg => self.pasp_mmhg,
            K::PadpMmhg => self.padp_mmhg,
            K::MpapMmhg => self.mpap_mmhg,
            K::PawpMmhg => self.pawp_mmhg,
            K::CoLmin => self.co_lmin,
            K::CiLminM2 => self.ci_lmin_m2,
            K::SvrWood => self.svr_wood,
            K::SvrDyn => self.svr_dyn,
            K::PvrWood => self.pvr_wood,
            K::PvrDyn => self.pvr_dyn,
            K::Papi => self.papi,
            K::CpoW => self.cpo_w,
            K::CpiWM2 => self.cpi_w_m2,
            K::CoMethod | K::SvrUnits | K::PvrUnits => None,
        }
    }

    /// Stored token value for a key (`None` for numeric keys)
    pub fn token(&self, key: CanonicalKey) -> Option<&str> {
        match key {
            CanonicalKey::CoMethod => self.co_method.as_deref(),
            CanonicalKey::SvrUnits => self.svr_units.as_deref(),
            CanonicalKey::PvrUnits => self.pvr_units.as_deref(),
            _ => None,
        }
    }

    pub fn set_numeric(&mut self, key: CanonicalKey, value: Option<f64>) {
        if let Some(slot) = self.numeric_slot_mut(key) {
            *slot = value;
        }
    }

    pub fn set_token(&mut self, key: CanonicalKey, value: Option<String>) {
        if let Some(slot) = self.token_slot_mut(key) {
            *slot = value;
        }
    }

    /// Display value for any key, numeric or token
    pub fn display(&self, key: CanonicalKey) -> Option<String> {
        match key.kind() {
            KeyKind::Numeric => self.numeric(key).map(|v| format_value(v, 2)),
            KeyKind::Token => self.token(key).map(str::to_string),
        }
    }

    /// Storage unit label for a numeric key
    pub fn unit_label(key: CanonicalKey) -> &'static str {
        key.unit().map(Unit::label).unwrap_or("")
    }
}
