//! One-shot adoption of other calculators' results into a screen's fields.
//!
//! A screen describes the fields it can prefill; on activation the adopter
//! copies each canonical value from the ledger into the screen's editable
//! state, unless the user already typed something there. Rejections are
//! silent: the field simply stays blank.

use crate::keys::CanonicalKey;
use crate::ledger::ResultsLedger;
use crate::session::SessionGate;
use crate::units::{convert, format_value, Unit};
use crate::validation::{validate, FieldRule};
use std::collections::BTreeMap;

/// A field a screen wants filled from the ledger
#[derive(Clone, Debug)]
pub struct PrefillField {
    pub key: CanonicalKey,
    pub rule: FieldRule,
    /// Unit the screen currently displays this field in
    pub display_unit: Unit,
    pub decimals: usize,
}

impl PrefillField {
    /// Field shown in the key's storage unit with its default rule
    ///
    /// Returns `None` for token keys, which carry no numeric rule.
    pub fn for_key(key: CanonicalKey) -> Option<Self> {
        Some(Self {
            key,
            rule: FieldRule::for_key(key)?,
            display_unit: key.unit()?,
            decimals: 2,
        })
    }

    pub fn displayed_in(mut self, unit: Unit) -> Self {
        self.display_unit = unit;
        self
    }

    pub fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }
}

/// A screen's local editable text, keyed by the field's canonical key
pub type ScreenFields = BTreeMap<CanonicalKey, String>;

/// Why a field was left alone
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// The user already entered something
    UserFilled,
    /// No calculator has published the key
    Missing,
    /// The published value failed validation
    Rejected(String),
    /// The display unit cannot express the stored value
    Unconvertible,
}

/// What one prefill run did
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrefillReport {
    pub adopted: Vec<CanonicalKey>,
    pub skipped: Vec<(CanonicalKey, SkipReason)>,
}

/// Per-screen prefill guard
///
/// Runs at most once per session generation.
#[derive(Debug, Default)]
pub struct PrefillAdopter {
    attempted_generation: Option<u64>,
}

impl PrefillAdopter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `run` would do anything for the gate's current generation
    pub fn is_armed(&self, gate: &SessionGate) -> bool {
        self.attempted_generation != Some(gate.generation())
    }

    /// Adopt ledger values into `fields`
    ///
    /// Returns `None` if this screen already attempted prefill since the last
    /// session reset.
    pub fn run(
        &mut self,
        ledger: &ResultsLedger,
        gate: &SessionGate,
        specs: &[PrefillField],
        fields: &mut ScreenFields,
    ) -> Option<PrefillReport> {
        if !self.is_armed(gate) {
            return None;
        }
        self.attempted_generation = Some(gate.generation());
        Some(adopt(ledger, specs, fields))
    }
}

/// Single prefill pass without the one-shot guard
pub fn adopt(ledger: &ResultsLedger, specs: &[PrefillField], fields: &mut ScreenFields) -> PrefillReport {
    let snapshot = ledger.snapshot();
    let mut report = PrefillReport::default();

    for spec in specs {
        let outcome = adopt_one(spec, snapshot.latest_raw(spec.key), fields);
        match outcome {
            Ok(text) => {
                tracing::debug!(key = %spec.key, value = %text, "Prefilled field");
                fields.insert(spec.key, text);
                report.adopted.push(spec.key);
            }
            Err(reason) => {
                tracing::debug!(key = %spec.key, ?reason, "Skipped prefill");
                report.skipped.push((spec.key, reason));
            }
        }
    }

    report
}

fn adopt_one(
    spec: &PrefillField,
    raw: Option<&str>,
    fields: &ScreenFields,
) -> std::result::Result<String, SkipReason> {
    if fields.get(&spec.key).is_some_and(|v| !v.trim().is_empty()) {
        return Err(SkipReason::UserFilled);
    }

    let raw = raw.ok_or(SkipReason::Missing)?;

    let validation = validate(raw, &spec.rule);
    if validation.is_error() {
        return Err(SkipReason::Rejected(validation.message.unwrap_or_default()));
    }

    // validate() only passes finite numbers
    let value: f64 = raw.trim().parse().map_err(|_| SkipReason::Missing)?;
    let storage_unit = spec.key.unit().ok_or(SkipReason::Unconvertible)?;
    let shown = convert(value, storage_unit, spec.display_unit).ok_or(SkipReason::Unconvertible)?;

    Ok(format_value(shown, spec.decimals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ResetReason;
    use crate::types::{CalcEntry, CalcType, LineItem, WorkshopSessionContext};

    fn ledger_with_fick(co: &str) -> ResultsLedger {
        let ledger = ResultsLedger::new();
        ledger.upsert(
            CalcEntry::new(CalcType::Fick, 1000, "Fick")
                .input(LineItem::keyed(CanonicalKey::BsaM2, "1.8"))
                .output(LineItem::keyed(CanonicalKey::CoLmin, co)),
        );
        ledger
    }

    fn svr_specs() -> Vec<PrefillField> {
        vec![
            PrefillField::for_key(CanonicalKey::CoLmin).unwrap(),
            PrefillField::for_key(CanonicalKey::MapMmhg).unwrap(),
        ]
    }

    #[test]
    fn test_adopts_published_value() {
        let ledger = ledger_with_fick("5.2");
        let gate = SessionGate::new();
        let mut adopter = PrefillAdopter::new();
        let mut fields = ScreenFields::new();

        let report = adopter.run(&ledger, &gate, &svr_specs(), &mut fields).unwrap();

        assert_eq!(fields.get(&CanonicalKey::CoLmin).map(String::as_str), Some("5.2"));
        assert_eq!(report.adopted, vec![CanonicalKey::CoLmin]);
        assert_eq!(
            report.skipped,
            vec![(CanonicalKey::MapMmhg, SkipReason::Missing)]
        );
        assert!(!fields.contains_key(&CanonicalKey::MapMmhg));
    }

    #[test]
    fn test_never_overwrites_user_input() {
        let ledger = ledger_with_fick("5.2");
        let mut fields = ScreenFields::new();
        fields.insert(CanonicalKey::CoLmin, "4.4".into());

        let report = adopt(&ledger, &svr_specs(), &mut fields);

        assert_eq!(fields[&CanonicalKey::CoLmin], "4.4");
        assert!(report
            .skipped
            .contains(&(CanonicalKey::CoLmin, SkipReason::UserFilled)));
    }

    #[test]
    fn test_blank_user_field_is_filled() {
        let ledger = ledger_with_fick("5.2");
        let mut fields = ScreenFields::new();
        fields.insert(CanonicalKey::CoLmin, "  ".into());

        adopt(&ledger, &svr_specs(), &mut fields);
        assert_eq!(fields[&CanonicalKey::CoLmin], "5.2");
    }

    #[test]
    fn test_invalid_value_not_adopted() {
        let ledger = ledger_with_fick("45");
        let mut fields = ScreenFields::new();

        let report = adopt(&ledger, &svr_specs(), &mut fields);

        assert!(!fields.contains_key(&CanonicalKey::CoLmin));
        assert!(matches!(
            report.skipped[0],
            (CanonicalKey::CoLmin, SkipReason::Rejected(_))
        ));
    }

    #[test]
    fn test_warning_value_is_adopted() {
        let ledger = ledger_with_fick("2.5");
        let mut fields = ScreenFields::new();
        adopt(&ledger, &svr_specs(), &mut fields);
        assert_eq!(fields[&CanonicalKey::CoLmin], "2.5");
    }

    #[test]
    fn test_converts_to_display_unit() {
        let ledger = ResultsLedger::new();
        ledger.upsert(
            CalcEntry::new(CalcType::Svr, 1000, "SVR")
                .output(LineItem::keyed(CanonicalKey::SvrWood, "14.3")),
        );
        let specs = vec![PrefillField::for_key(CanonicalKey::SvrWood)
            .unwrap()
            .displayed_in(Unit::DynSecCm5)
            .decimals(0)];
        let mut fields = ScreenFields::new();

        adopt(&ledger, &specs, &mut fields);
        assert_eq!(fields[&CanonicalKey::SvrWood], "1144");
    }

    #[test]
    fn test_incompatible_display_unit_skipped() {
        let ledger = ledger_with_fick("5.2");
        let specs = vec![PrefillField::for_key(CanonicalKey::CoLmin)
            .unwrap()
            .displayed_in(Unit::MmHg)];
        let mut fields = ScreenFields::new();

        let report = adopt(&ledger, &specs, &mut fields);
        assert_eq!(
            report.skipped,
            vec![(CanonicalKey::CoLmin, SkipReason::Unconvertible)]
        );
    }

    #[test]
    fn test_runs_once_until_session_reset() {
        let ledger = ledger_with_fick("5.2");
        let gate = SessionGate::new();
        gate.set_context(WorkshopSessionContext::patient_study("p1", "s1"));
        let mut adopter = PrefillAdopter::new();
        let mut fields = ScreenFields::new();

        assert!(adopter.run(&ledger, &gate, &svr_specs(), &mut fields).is_some());

        // User clears the field; a second activation must not refill it
        fields.clear();
        assert!(adopter.run(&ledger, &gate, &svr_specs(), &mut fields).is_none());
        assert!(fields.is_empty());

        gate.reset(ResetReason::NewStudy);
        assert!(adopter.is_armed(&gate));
        assert!(adopter.run(&ledger, &gate, &svr_specs(), &mut fields).is_some());
        assert_eq!(fields[&CanonicalKey::CoLmin], "5.2");
    }

    #[test]
    fn test_prefill_never_writes_ledger() {
        let ledger = ledger_with_fick("5.2");
        let revision = ledger.snapshot().revision();
        let mut fields = ScreenFields::new();
        adopt(&ledger, &svr_specs(), &mut fields);
        assert_eq!(ledger.snapshot().revision(), revision);
    }
}
