//! Multi-fetus sexing outcomes: encoding, decoding and aggregation.
//!
//! A pregnant recipient may carry twins; each fetus is sexed independently.
//! The per-fetus list is persisted inside the event's free-text notes column
//! behind a marker token, so older readers keep seeing a plain notes field:
//!
//! ```text
//! SEXES:FEMALE,MALE|technician free text
//! ```
//!
//! `SEXES:` is a reserved token. Free-text notes must not contain it; decode
//! uses the first occurrence, so a note carrying the literal marker would be
//! split at that point.

use serde::{Deserialize, Serialize};

use crate::models::{CheckOutcome, ReproductiveStatus};

/// Marker token that introduces the encoded per-fetus payload.
pub const SEX_MARKER: &str = "SEXES:";
/// Delimiter between per-fetus values inside the payload.
pub const SEX_DELIMITER: char = ',';
/// Separator between the payload and the remaining free-text note.
pub const NOTE_SEPARATOR: char = '|';

/// Sex assigned to a single fetus. A fetus not yet sexed is represented as
/// `None` in the slot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetusSex {
    Female,
    Male,
    /// Examined but sex could not be determined
    Unsexed,
}

impl FetusSex {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetusSex::Female => "FEMALE",
            FetusSex::Male => "MALE",
            FetusSex::Unsexed => "UNSEXED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FEMALE" => Some(FetusSex::Female),
            "MALE" => Some(FetusSex::Male),
            "UNSEXED" => Some(FetusSex::Unsexed),
            _ => None,
        }
    }
}

/// Discriminated final outcome of a sexing act over all fetuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalOutcome {
    /// No viable fetus; overrides the earlier pregnancy diagnosis
    Empty,
    PregnantFemale,
    PregnantMale,
    PregnantUnsexed,
    PregnantMixedSex,
}

impl FinalOutcome {
    /// The recipient status this outcome resolves to.
    pub fn status(&self) -> ReproductiveStatus {
        match self {
            FinalOutcome::Empty => ReproductiveStatus::Empty,
            FinalOutcome::PregnantFemale => ReproductiveStatus::PregnantFemale,
            FinalOutcome::PregnantMale => ReproductiveStatus::PregnantMale,
            FinalOutcome::PregnantUnsexed => ReproductiveStatus::PregnantUnsexed,
            FinalOutcome::PregnantMixedSex => ReproductiveStatus::PregnantMixedSex,
        }
    }

    /// The event-level outcome persisted alongside the detail payload.
    pub fn check_outcome(&self) -> CheckOutcome {
        match self {
            FinalOutcome::Empty => CheckOutcome::Empty,
            _ => CheckOutcome::Pregnant,
        }
    }
}

/// Split a notes value into the encoded payload (if present) and the
/// remaining free text.
fn split_payload(text: &str) -> (Option<String>, String) {
    match text.find(SEX_MARKER) {
        None => (None, text.to_string()),
        Some(start) => {
            let after = &text[start + SEX_MARKER.len()..];
            let (payload, tail) = match after.find(NOTE_SEPARATOR) {
                Some(sep) => (&after[..sep], &after[sep + NOTE_SEPARATOR.len_utf8()..]),
                None => (after, ""),
            };
            let mut rest = String::with_capacity(start + tail.len());
            rest.push_str(&text[..start]);
            rest.push_str(tail);
            (Some(payload.to_string()), rest)
        }
    }
}

/// Encode an ordered per-fetus slot list plus a free-text note into a single
/// notes value.
///
/// Blank slots become empty segments, so the slot order survives the round
/// trip. When every slot is blank the note is returned untouched. A marker
/// already present in `note` (from a previous encode) is replaced, never
/// duplicated.
pub fn encode(slots: &[Option<FetusSex>], note: &str) -> String {
    let (_, clean) = split_payload(note);
    if slots.iter().all(Option::is_none) {
        return clean;
    }
    let payload = slots
        .iter()
        .map(|s| s.map(|v| v.as_str()).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(&SEX_DELIMITER.to_string());
    if clean.is_empty() {
        format!("{SEX_MARKER}{payload}")
    } else {
        format!("{SEX_MARKER}{payload}{NOTE_SEPARATOR}{clean}")
    }
}

/// Decode a notes value back into an ordered slot list sized to
/// `fetus_count` (padded with blanks, or truncated) and the free-text note.
/// Unknown tokens decode as blank slots.
pub fn decode(text: &str, fetus_count: usize) -> (Vec<Option<FetusSex>>, String) {
    let (payload, note) = split_payload(text);
    let mut slots: Vec<Option<FetusSex>> = match payload {
        Some(p) => p
            .split(SEX_DELIMITER)
            .map(|tok| FetusSex::parse(tok.trim()))
            .collect(),
        None => Vec::new(),
    };
    slots.resize(fetus_count, None);
    (slots, note)
}

/// Decode with the backward-compatibility path: when no marker is present
/// but the legacy scalar `sex` column holds a value, that value becomes
/// fetus #1 and the remaining slots stay blank.
pub fn decode_with_legacy(
    notes: Option<&str>,
    legacy: Option<FetusSex>,
    fetus_count: usize,
) -> (Vec<Option<FetusSex>>, String) {
    let text = notes.unwrap_or("");
    let had_marker = text.contains(SEX_MARKER);
    let (mut slots, note) = decode(text, fetus_count);
    if !had_marker && fetus_count > 0 {
        if let Some(sex) = legacy {
            slots[0] = Some(sex);
        }
    }
    (slots, note)
}

/// Aggregate per-fetus values into one final outcome.
pub fn aggregate(slots: &[Option<FetusSex>]) -> FinalOutcome {
    let viable: Vec<FetusSex> = slots.iter().flatten().copied().collect();
    if viable.is_empty() {
        return FinalOutcome::Empty;
    }
    let female = viable.contains(&FetusSex::Female);
    let male = viable.contains(&FetusSex::Male);
    let unsexed = viable.contains(&FetusSex::Unsexed);
    match (female, male, unsexed) {
        (true, true, _) => FinalOutcome::PregnantMixedSex,
        (true, false, false) => FinalOutcome::PregnantFemale,
        (false, true, false) => FinalOutcome::PregnantMale,
        _ => FinalOutcome::PregnantUnsexed,
    }
}

/// Number of non-blank slots; this is the fetus count persisted for any
/// pregnant aggregate (and 0 for an empty one).
pub fn viable_count(slots: &[Option<FetusSex>]) -> u32 {
    slots.iter().flatten().count() as u32
}

/// Value for the legacy single-sex column: FEMALE when every viable fetus is
/// female, MALE when every one is male, otherwise the first sexed fetus, or
/// none at all.
pub fn legacy_scalar(slots: &[Option<FetusSex>]) -> Option<FetusSex> {
    let viable: Vec<FetusSex> = slots.iter().flatten().copied().collect();
    if viable.is_empty() {
        return None;
    }
    if viable.iter().all(|s| *s == FetusSex::Female) {
        return Some(FetusSex::Female);
    }
    if viable.iter().all(|s| *s == FetusSex::Male) {
        return Some(FetusSex::Male);
    }
    viable
        .into_iter()
        .find(|s| matches!(s, FetusSex::Female | FetusSex::Male))
}

#[cfg(test)]
mod tests {
    use super::*;
    use FetusSex::*;

    #[test]
    fn test_encode_basic() {
        assert_eq!(
            encode(&[Some(Female), Some(Male)], "strong heartbeat"),
            "SEXES:FEMALE,MALE|strong heartbeat"
        );
        assert_eq!(encode(&[Some(Female)], ""), "SEXES:FEMALE");
        assert_eq!(encode(&[None, None], "just a note"), "just a note");
        assert_eq!(encode(&[Some(Unsexed), None], ""), "SEXES:UNSEXED,");
    }

    #[test]
    fn test_decode_pads_and_truncates_to_fetus_count() {
        let (slots, note) = decode("SEXES:FEMALE", 2);
        assert_eq!(slots, vec![Some(Female), None]);
        assert_eq!(note, "");

        let (slots, _) = decode("SEXES:FEMALE,MALE,UNSEXED", 2);
        assert_eq!(slots, vec![Some(Female), Some(Male)]);
    }

    #[test]
    fn test_round_trip() {
        let slots = vec![Some(Female), None, Some(Unsexed)];
        let note = "checked twice";
        let encoded = encode(&slots, note);
        let (back_slots, back_note) = decode(&encoded, slots.len());
        assert_eq!(back_slots, slots);
        assert_eq!(back_note, note);
    }

    #[test]
    fn test_reencode_replaces_existing_marker() {
        let first = encode(&[Some(Male)], "note");
        // simulate editing the stored notes value directly
        let second = encode(&[Some(Female), Some(Female)], &first);
        assert_eq!(second, "SEXES:FEMALE,FEMALE|note");
        assert_eq!(second.matches(SEX_MARKER).count(), 1);
    }

    #[test]
    fn test_decode_keeps_separators_inside_free_text() {
        let (slots, note) = decode("SEXES:MALE|left horn | right horn", 1);
        assert_eq!(slots, vec![Some(Male)]);
        assert_eq!(note, "left horn | right horn");
    }

    #[test]
    fn test_decode_without_marker_returns_note_unchanged() {
        let (slots, note) = decode("plain note", 2);
        assert_eq!(slots, vec![None, None]);
        assert_eq!(note, "plain note");
    }

    #[test]
    fn test_legacy_scalar_becomes_first_fetus() {
        let (slots, note) = decode_with_legacy(Some("old note"), Some(Male), 2);
        assert_eq!(slots, vec![Some(Male), None]);
        assert_eq!(note, "old note");

        // the marker takes precedence over the legacy column
        let (slots, _) = decode_with_legacy(Some("SEXES:FEMALE,"), Some(Male), 2);
        assert_eq!(slots, vec![Some(Female), None]);
    }

    #[test]
    fn test_aggregate_rule_table() {
        assert_eq!(aggregate(&[]), FinalOutcome::Empty);
        assert_eq!(aggregate(&[None, None]), FinalOutcome::Empty);
        assert_eq!(
            aggregate(&[Some(Female), Some(Female)]),
            FinalOutcome::PregnantFemale
        );
        assert_eq!(aggregate(&[Some(Male)]), FinalOutcome::PregnantMale);
        assert_eq!(
            aggregate(&[Some(Female), Some(Male)]),
            FinalOutcome::PregnantMixedSex
        );
        assert_eq!(aggregate(&[Some(Unsexed)]), FinalOutcome::PregnantUnsexed);
        assert_eq!(
            aggregate(&[Some(Female), Some(Unsexed)]),
            FinalOutcome::PregnantUnsexed
        );
        assert_eq!(
            aggregate(&[Some(Male), Some(Unsexed), Some(Female)]),
            FinalOutcome::PregnantMixedSex
        );
    }

    #[test]
    fn test_viable_count() {
        assert_eq!(viable_count(&[None, None]), 0);
        assert_eq!(viable_count(&[Some(Female), None, Some(Unsexed)]), 2);
    }

    #[test]
    fn test_legacy_scalar_value() {
        assert_eq!(legacy_scalar(&[]), None);
        assert_eq!(legacy_scalar(&[Some(Female), Some(Female)]), Some(Female));
        assert_eq!(legacy_scalar(&[Some(Male)]), Some(Male));
        assert_eq!(legacy_scalar(&[Some(Unsexed), Some(Male)]), Some(Male));
        assert_eq!(legacy_scalar(&[Some(Unsexed)]), None);
        assert_eq!(
            legacy_scalar(&[Some(Unsexed), Some(Female), Some(Male)]),
            Some(Female)
        );
    }
}
