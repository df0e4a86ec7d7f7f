//! Position record in the last 4 KiB sector of the on-board flash.
//!
//! `memory.x` shortens the FLASH region by one sector so the image never
//! overlaps the record.

use embassy_rp::flash::{Blocking, Error, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use wiper_controls::{RecordStore, RECORD_CAPACITY};

/// Pico 2 on-board QSPI flash size.
pub const FLASH_SIZE: usize = 4 * 1024 * 1024;

/// Offset of the record sector from the start of flash.
pub const RECORD_OFFSET: u32 = (FLASH_SIZE - ERASE_SIZE) as u32;

/// [`RecordStore`] over one reserved flash sector.
///
/// A write erases the whole sector and programs one 256-byte page. Writes
/// that would not change the stored bytes are skipped to spare the sector.
pub struct FlashStore {
    flash: Flash<'static, FLASH, Blocking, FLASH_SIZE>,
}

impl FlashStore {
    pub fn new(flash: Peri<'static, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(flash),
        }
    }
}

impl RecordStore for FlashStore {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8; RECORD_CAPACITY]) -> Result<(), Error> {
        self.flash.blocking_read(RECORD_OFFSET, buf)
    }

    fn write(&mut self, record: &[u8]) -> Result<(), Error> {
        let mut page = [0xFF; RECORD_CAPACITY];
        let len = record.len().min(RECORD_CAPACITY);
        page[..len].copy_from_slice(&record[..len]);

        let mut current = [0u8; RECORD_CAPACITY];
        self.flash.blocking_read(RECORD_OFFSET, &mut current)?;
        if current == page {
            defmt::debug!("record unchanged; skipping flash write");
            return Ok(());
        }

        self.flash
            .blocking_erase(RECORD_OFFSET, RECORD_OFFSET + ERASE_SIZE as u32)?;
        self.flash.blocking_write(RECORD_OFFSET, &page)
    }
}
