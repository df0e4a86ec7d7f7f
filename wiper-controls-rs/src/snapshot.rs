//! Persisted wiper positions and their on-storage record format.
//!
//! # Document
//!
//! The snapshot is a flat JSON object with one integer per channel:
//!
//! ```text
//! {"position":50}                 single-channel panel
//! {"bass":42,"treble":61}         tone-stack panel
//! ```
//!
//! The two field sets are disjoint. A build that looks for a field the
//! record does not carry gets the center value, so records survive a
//! firmware change between layouts.
//!
//! # Record
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬──────────┐
//! │ len (u16 LE) │ JSON document (len bytes)    │ padding  │
//! └──────────────┴──────────────────────────────┴──────────┘
//! ```
//!
//! A length of `0xFFFF` (erased flash) or `0` means no record was ever
//! written.
//!
//! A body that does not parse as a whole is read again one field at a time,
//! so a damaged value only costs its own channel.

use serde::{Deserialize, Serialize};
use x9c_driver::{CENTER_POSITION, MAX_STEPS};

use crate::error::CodecError;

/// Size of the record area, header included.
pub const RECORD_CAPACITY: usize = 256;

const HEADER_LEN: usize = 2;
const ERASED_LEN: u16 = 0xFFFF;

/// Name of a channel's field in the snapshot document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SnapshotField {
    /// Single-channel panel.
    Position,
    /// Tone-stack low band.
    Bass,
    /// Tone-stack high band.
    Treble,
}

impl SnapshotField {
    /// JSON key for this field.
    pub fn key(self) -> &'static str {
        match self {
            SnapshotField::Position => "position",
            SnapshotField::Bass => "bass",
            SnapshotField::Treble => "treble",
        }
    }
}

/// Single-field views of the document for the per-field fallback.
#[derive(Deserialize)]
struct PositionField {
    position: Option<i32>,
}

#[derive(Deserialize)]
struct BassField {
    bass: Option<i32>,
}

#[derive(Deserialize)]
struct TrebleField {
    treble: Option<i32>,
}

/// Wiper positions as written to storage.
///
/// Values are kept as raw integers so that an out-of-range value in a
/// damaged record is detected rather than silently truncated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bass: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treble: Option<i32>,
}

impl PersistedSnapshot {
    /// Raw stored value of `field`, if present.
    pub fn get(&self, field: SnapshotField) -> Option<i32> {
        match field {
            SnapshotField::Position => self.position,
            SnapshotField::Bass => self.bass,
            SnapshotField::Treble => self.treble,
        }
    }

    pub fn set(&mut self, field: SnapshotField, value: u8) {
        let slot = match field {
            SnapshotField::Position => &mut self.position,
            SnapshotField::Bass => &mut self.bass,
            SnapshotField::Treble => &mut self.treble,
        };
        *slot = Some(value as i32);
    }

    /// Stored wiper step for `field`, or [`CENTER_POSITION`] when the field
    /// is missing or outside `[0, MAX_STEPS]`.
    pub fn position_or_default(&self, field: SnapshotField) -> u8 {
        match self.get(field) {
            Some(v) if (0..=MAX_STEPS as i32).contains(&v) => v as u8,
            Some(_v) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "snapshot field {} out of range ({}); using {}",
                    field.key(),
                    _v,
                    CENTER_POSITION
                );
                CENTER_POSITION
            }
            None => CENTER_POSITION,
        }
    }

    /// Write this snapshot as a record into `buf`.
    ///
    /// Returns the number of bytes used, header included. The rest of `buf`
    /// is left untouched.
    pub fn encode_record(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        if buf.len() <= HEADER_LEN {
            return Err(CodecError::Encode);
        }
        let body_len = serde_json_core::to_slice(self, &mut buf[HEADER_LEN..])
            .map_err(|_| CodecError::Encode)?;
        let header = u16::try_from(body_len).map_err(|_| CodecError::Encode)?;
        buf[..HEADER_LEN].copy_from_slice(&header.to_le_bytes());
        Ok(HEADER_LEN + body_len)
    }

    /// Parse a record area.
    ///
    /// Returns `Ok(None)` for an area that never held a record.
    pub fn decode_record(buf: &[u8]) -> Result<Option<Self>, CodecError> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::Length);
        }
        let len = u16::from_le_bytes([buf[0], buf[1]]);
        if len == ERASED_LEN || len == 0 {
            return Ok(None);
        }

        let end = HEADER_LEN + len as usize;
        let body = buf.get(HEADER_LEN..end).ok_or(CodecError::Length)?;
        match serde_json_core::from_slice::<Self>(body) {
            Ok((snapshot, _)) => Ok(Some(snapshot)),
            Err(_) => Self::decode_fields(body).map(Some),
        }
    }

    /// Read each field on its own. A field whose value is not an integer
    /// is absent; the body is rejected only if no field view parses.
    fn decode_fields(body: &[u8]) -> Result<Self, CodecError> {
        let position = serde_json_core::from_slice::<PositionField>(body).map(|(f, _)| f.position);
        let bass = serde_json_core::from_slice::<BassField>(body).map(|(f, _)| f.bass);
        let treble = serde_json_core::from_slice::<TrebleField>(body).map(|(f, _)| f.treble);

        if position.is_err() && bass.is_err() && treble.is_err() {
            return Err(CodecError::Decode);
        }

        #[cfg(feature = "defmt")]
        defmt::warn!("snapshot record partly malformed; keeping readable fields");

        Ok(Self {
            position: position.ok().flatten(),
            bass: bass.ok().flatten(),
            treble: treble.ok().flatten(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(buf: &[u8], used: usize) -> &str {
        core::str::from_utf8(&buf[HEADER_LEN..used]).unwrap()
    }

    fn record(json: &str) -> [u8; RECORD_CAPACITY] {
        let mut buf = [0xFF; RECORD_CAPACITY];
        buf[..2].copy_from_slice(&(json.len() as u16).to_le_bytes());
        buf[2..2 + json.len()].copy_from_slice(json.as_bytes());
        buf
    }

    #[test]
    fn single_channel_document() {
        let mut s = PersistedSnapshot::default();
        s.set(SnapshotField::Position, 50);

        let mut buf = [0xFF; RECORD_CAPACITY];
        let used = s.encode_record(&mut buf).unwrap();
        assert_eq!(body(&buf, used), r#"{"position":50}"#);
    }

    #[test]
    fn tone_stack_document() {
        let mut s = PersistedSnapshot::default();
        s.set(SnapshotField::Bass, 42);
        s.set(SnapshotField::Treble, 61);

        let mut buf = [0xFF; RECORD_CAPACITY];
        let used = s.encode_record(&mut buf).unwrap();
        assert_eq!(body(&buf, used), r#"{"bass":42,"treble":61}"#);
    }

    #[test]
    fn record_round_trip() {
        let mut s = PersistedSnapshot::default();
        s.set(SnapshotField::Bass, 0);
        s.set(SnapshotField::Treble, 99);

        let mut buf = [0xFF; RECORD_CAPACITY];
        s.encode_record(&mut buf).unwrap();
        assert_eq!(PersistedSnapshot::decode_record(&buf), Ok(Some(s)));
    }

    #[test]
    fn erased_area_has_no_record() {
        let buf = [0xFF; RECORD_CAPACITY];
        assert_eq!(PersistedSnapshot::decode_record(&buf), Ok(None));

        let zeroed = [0x00; RECORD_CAPACITY];
        assert_eq!(PersistedSnapshot::decode_record(&zeroed), Ok(None));
    }

    #[test]
    fn length_past_end_is_rejected() {
        let mut buf = [0xFF; 16];
        buf[..2].copy_from_slice(&100u16.to_le_bytes());
        assert_eq!(PersistedSnapshot::decode_record(&buf), Err(CodecError::Length));
        assert_eq!(PersistedSnapshot::decode_record(&[0x01]), Err(CodecError::Length));
    }

    #[test]
    fn garbage_body_is_rejected() {
        let buf = record("{\"bass\":4");
        assert_eq!(PersistedSnapshot::decode_record(&buf), Err(CodecError::Decode));

        let buf = record("not json at all");
        assert_eq!(PersistedSnapshot::decode_record(&buf), Err(CodecError::Decode));
    }

    #[test]
    fn missing_fields_are_absent() {
        let buf = record(r#"{"position":12}"#);
        let s = PersistedSnapshot::decode_record(&buf).unwrap().unwrap();
        assert_eq!(s.get(SnapshotField::Position), Some(12));
        assert_eq!(s.get(SnapshotField::Bass), None);
        assert_eq!(s.position_or_default(SnapshotField::Bass), CENTER_POSITION);
        assert_eq!(s.position_or_default(SnapshotField::Position), 12);
    }

    #[test]
    fn malformed_field_only_resets_its_channel() {
        let buf = record(r#"{"bass":"x","treble":20}"#);
        let s = PersistedSnapshot::decode_record(&buf).unwrap().unwrap();
        assert_eq!(s.get(SnapshotField::Bass), None);
        assert_eq!(s.get(SnapshotField::Treble), Some(20));
        assert_eq!(s.position_or_default(SnapshotField::Bass), CENTER_POSITION);
        assert_eq!(s.position_or_default(SnapshotField::Treble), 20);

        let buf = record(r#"{"position":[1,2],"bass":7}"#);
        let s = PersistedSnapshot::decode_record(&buf).unwrap().unwrap();
        assert_eq!(s.get(SnapshotField::Position), None);
        assert_eq!(s.get(SnapshotField::Bass), Some(7));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let buf = record(r#"{"bass":10,"treble":20,"mid":30}"#);
        let s = PersistedSnapshot::decode_record(&buf).unwrap().unwrap();
        assert_eq!(s.position_or_default(SnapshotField::Bass), 10);
        assert_eq!(s.position_or_default(SnapshotField::Treble), 20);
    }

    #[test]
    fn out_of_range_values_fall_back_to_center() {
        let buf = record(r#"{"bass":-3,"treble":150}"#);
        let s = PersistedSnapshot::decode_record(&buf).unwrap().unwrap();
        assert_eq!(s.position_or_default(SnapshotField::Bass), CENTER_POSITION);
        assert_eq!(s.position_or_default(SnapshotField::Treble), CENTER_POSITION);
    }

    #[test]
    fn encode_into_tiny_buffer_fails() {
        let mut s = PersistedSnapshot::default();
        s.set(SnapshotField::Position, 50);
        let mut buf = [0u8; 6];
        assert_eq!(s.encode_record(&mut buf), Err(CodecError::Encode));
        assert_eq!(s.encode_record(&mut [0u8; 2]), Err(CodecError::Encode));
    }

    #[test]
    fn field_keys() {
        assert_eq!(SnapshotField::Position.key(), "position");
        assert_eq!(SnapshotField::Bass.key(), "bass");
        assert_eq!(SnapshotField::Treble.key(), "treble");
    }
}
