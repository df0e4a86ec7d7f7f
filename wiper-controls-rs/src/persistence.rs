//! Snapshot persistence on top of a raw record store.

use crate::error::PersistError;
use crate::snapshot::{PersistedSnapshot, RECORD_CAPACITY};

/// Byte-level storage for one snapshot record.
///
/// Implementations own a fixed area of [`RECORD_CAPACITY`] bytes (a flash
/// sector, an EEPROM page, a RAM buffer). Never-written storage must read
/// back as `0xFF` or `0x00` bytes.
pub trait RecordStore {
    type Error;

    /// Fill `buf` with the contents of the record area.
    fn read(&mut self, buf: &mut [u8; RECORD_CAPACITY]) -> Result<(), Self::Error>;

    /// Replace the record area with `record` (at most [`RECORD_CAPACITY`]
    /// bytes; the remainder of the area is left erased).
    fn write(&mut self, record: &[u8]) -> Result<(), Self::Error>;
}

/// RAM-backed [`RecordStore`]. Contents are lost at power-off.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    area: [u8; RECORD_CAPACITY],
}

impl MemoryStore {
    /// Empty (erased) store.
    pub fn new() -> Self {
        Self {
            area: [0xFF; RECORD_CAPACITY],
        }
    }

    /// Store pre-loaded with raw bytes, truncated to [`RECORD_CAPACITY`].
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let mut store = Self::new();
        let len = bytes.len().min(RECORD_CAPACITY);
        store.area[..len].copy_from_slice(&bytes[..len]);
        store
    }

    /// Raw record area.
    pub fn bytes(&self) -> &[u8; RECORD_CAPACITY] {
        &self.area
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8; RECORD_CAPACITY]) -> Result<(), Self::Error> {
        buf.copy_from_slice(&self.area);
        Ok(())
    }

    fn write(&mut self, record: &[u8]) -> Result<(), Self::Error> {
        let len = record.len().min(RECORD_CAPACITY);
        self.area = [0xFF; RECORD_CAPACITY];
        self.area[..len].copy_from_slice(&record[..len]);
        Ok(())
    }
}

/// Loads and saves [`PersistedSnapshot`]s through a [`RecordStore`].
///
/// Loading never fails from the caller's point of view: absent, unreadable
/// and malformed records all come back as `None` and the caller carries on
/// with defaults.
pub struct Persistence<S> {
    store: S,
}

impl<S> Persistence<S>
where
    S: RecordStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load the stored snapshot.
    ///
    /// Returns `None` on first run and on any read or decode failure (the
    /// failure is logged).
    pub fn load(&mut self) -> Option<PersistedSnapshot> {
        match self.try_load() {
            Ok(Some(snapshot)) => Some(snapshot),
            Ok(None) => {
                #[cfg(feature = "defmt")]
                defmt::info!("no stored snapshot; using defaults");
                None
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("stored snapshot unusable ({}); using defaults", _e);
                None
            }
        }
    }

    /// Load the stored snapshot, reporting why it could not be read.
    pub fn try_load(&mut self) -> Result<Option<PersistedSnapshot>, PersistError<S::Error>> {
        let mut buf = [0u8; RECORD_CAPACITY];
        self.store.read(&mut buf).map_err(PersistError::Store)?;
        Ok(PersistedSnapshot::decode_record(&buf)?)
    }

    /// Encode and write `snapshot`, replacing any previous record.
    pub fn save(&mut self, snapshot: &PersistedSnapshot) -> Result<(), PersistError<S::Error>> {
        let mut buf = [0xFF; RECORD_CAPACITY];
        let used = snapshot.encode_record(&mut buf)?;
        self.store.write(&buf[..used]).map_err(PersistError::Store)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::snapshot::SnapshotField;

    /// Store whose reads and writes can be made to fail.
    struct FlakyStore {
        inner: MemoryStore,
        fail_read: bool,
        fail_write: bool,
    }

    #[derive(Debug, PartialEq)]
    struct Unmounted;

    impl RecordStore for FlakyStore {
        type Error = Unmounted;

        fn read(&mut self, buf: &mut [u8; RECORD_CAPACITY]) -> Result<(), Unmounted> {
            if self.fail_read {
                return Err(Unmounted);
            }
            let _ = self.inner.read(buf);
            Ok(())
        }

        fn write(&mut self, record: &[u8]) -> Result<(), Unmounted> {
            if self.fail_write {
                return Err(Unmounted);
            }
            let _ = self.inner.write(record);
            Ok(())
        }
    }

    fn snapshot(bass: u8, treble: u8) -> PersistedSnapshot {
        let mut s = PersistedSnapshot::default();
        s.set(SnapshotField::Bass, bass);
        s.set(SnapshotField::Treble, treble);
        s
    }

    #[test]
    fn save_then_load_round_trip() {
        let mut p = Persistence::new(MemoryStore::new());
        let s = snapshot(12, 87);

        p.save(&s).unwrap();
        assert_eq!(p.load(), Some(s));
    }

    #[test]
    fn save_replaces_previous_record() {
        let mut p = Persistence::new(MemoryStore::new());
        p.save(&snapshot(1, 2)).unwrap();
        p.save(&snapshot(3, 4)).unwrap();
        assert_eq!(p.load(), Some(snapshot(3, 4)));
    }

    #[test]
    fn first_run_loads_nothing() {
        let mut p = Persistence::new(MemoryStore::new());
        assert_eq!(p.load(), None);
        assert_eq!(p.try_load(), Ok(None));
    }

    #[test]
    fn corrupt_record_loads_nothing() {
        let mut bytes = [0xFF; 20];
        bytes[..2].copy_from_slice(&10u16.to_le_bytes());
        bytes[2..12].copy_from_slice(b"{\"bass\":!!");
        let mut p = Persistence::new(MemoryStore::with_bytes(&bytes));

        assert_eq!(p.load(), None);
        assert_eq!(p.try_load(), Err(PersistError::Codec(CodecError::Decode)));
    }

    #[test]
    fn unreadable_store_loads_nothing() {
        let mut p = Persistence::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_read: true,
            fail_write: false,
        });
        p.save(&snapshot(5, 6)).unwrap();

        assert_eq!(p.load(), None);
        assert_eq!(p.try_load(), Err(PersistError::Store(Unmounted)));
    }

    #[test]
    fn write_failure_is_reported() {
        let mut p = Persistence::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_read: false,
            fail_write: true,
        });
        assert_eq!(p.save(&snapshot(5, 6)), Err(PersistError::Store(Unmounted)));
        // Nothing was written.
        assert_eq!(p.load(), None);
    }

    #[test]
    fn memory_store_write_erases_tail() {
        let mut store = MemoryStore::with_bytes(&[0xAA; RECORD_CAPACITY]);
        store.write(&[1, 2, 3]).unwrap();
        assert_eq!(&store.bytes()[..3], &[1, 2, 3]);
        assert!(store.bytes()[3..].iter().all(|&b| b == 0xFF));
    }
}
