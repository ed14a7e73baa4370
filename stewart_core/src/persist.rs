//! Persistent Calibration Store: the 30-byte calibration record.
//!
//! Layout (little-endian):
//!
//! | offset | size | field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 1    | format version                         |
//! | 1      | 1    | cycle count (restored boots)           |
//! | 2      | 24   | six `(min, max)` `u16` pairs           |
//! | 26     | 4    | CRC-32 of bytes `0..26`                |
//!
//! The checksum is written last, so an interrupted save leaves a record that
//! fails validation instead of one that restores half-written bounds.

use eyre::WrapErr;
use stewart_traits::{ActuatorIo, PersistentStore};

use crate::config::{NUM_ACTUATORS, PersistCfg};
use crate::error::{PlatformError, Result};
use crate::hw_error::map_store_error;
use crate::platform::Platform;

pub const VERSION_OFFSET: usize = 0;
pub const CYCLES_OFFSET: usize = 1;
pub const BOUNDS_OFFSET: usize = 2;
pub const CHECKSUM_OFFSET: usize = 26;
pub const RECORD_LEN: usize = 30;

/// CRC-32 (IEEE 802.3, reflected, as used by zlib) over `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    const TABLE: [u32; 16] = [
        0x0000_0000, 0x1db7_1064, 0x3b6e_20c8, 0x26d9_30ac, 0x76dc_4190, 0x6b6b_51f4,
        0x4db2_6158, 0x5005_713c, 0xedb8_8320, 0xf00f_9344, 0xd6d6_a3e8, 0xcb61_b38c,
        0x9b64_c2b0, 0x86d3_d2d4, 0xa00a_e278, 0xbdbd_f21c,
    ];
    let mut crc = !0u32;
    for &b in bytes {
        crc = TABLE[((crc ^ u32::from(b)) & 0x0f) as usize] ^ (crc >> 4);
        crc = TABLE[((crc ^ (u32::from(b) >> 4)) & 0x0f) as usize] ^ (crc >> 4);
    }
    !crc
}

/// Decoded calibration record. Says nothing about validity on its own; see
/// `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRecord {
    pub format_version: u8,
    pub cycle_count: u8,
    pub bounds: [[u16; 2]; NUM_ACTUATORS],
    /// Checksum as stored; equals `checksum()` only for an intact record.
    pub stored_checksum: u32,
}

/// Why a stored record was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    ChecksumMismatch { stored: u32, computed: u32 },
    VersionMismatch { found: u8, expected: u8 },
    CyclesExhausted { count: u8, max: u8 },
    InvalidBounds { actuator: usize },
    /// The store itself could not be read.
    Unreadable,
}

impl core::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ChecksumMismatch { stored, computed } => write!(
                f,
                "checksum mismatch (stored {stored:#010x}, computed {computed:#010x})"
            ),
            Self::VersionMismatch { found, expected } => {
                write!(f, "format version {found}, expected {expected}")
            }
            Self::CyclesExhausted { count, max } => {
                write!(f, "restored {count} times (limit {max}), recalibration due")
            }
            Self::InvalidBounds { actuator } => {
                write!(f, "bounds of actuator {actuator} are not min < max")
            }
            Self::Unreadable => f.write_str("store unreadable"),
        }
    }
}

/// Result of `load_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The platform now holds the stored bounds.
    Restored { cycle_count: u8 },
    /// The record was ignored; the platform is untouched.
    Stale(StaleReason),
}

impl CalibrationRecord {
    pub fn new(format_version: u8, cycle_count: u8, bounds: [[u16; 2]; NUM_ACTUATORS]) -> Self {
        let mut r = Self {
            format_version,
            cycle_count,
            bounds,
            stored_checksum: 0,
        };
        r.stored_checksum = r.checksum();
        r
    }

    /// Bytes covered by the checksum (offsets `0..26`).
    pub fn payload(&self) -> [u8; CHECKSUM_OFFSET] {
        let mut out = [0u8; CHECKSUM_OFFSET];
        out[VERSION_OFFSET] = self.format_version;
        out[CYCLES_OFFSET] = self.cycle_count;
        for (i, [min, max]) in self.bounds.iter().enumerate() {
            let at = BOUNDS_OFFSET + i * 4;
            out[at..at + 2].copy_from_slice(&min.to_le_bytes());
            out[at + 2..at + 4].copy_from_slice(&max.to_le_bytes());
        }
        out
    }

    pub fn checksum(&self) -> u32 {
        crc32(&self.payload())
    }

    /// Full 30-byte image.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..CHECKSUM_OFFSET].copy_from_slice(&self.payload());
        out[CHECKSUM_OFFSET..].copy_from_slice(&self.stored_checksum.to_le_bytes());
        out
    }

    /// Decode a raw image. Never fails; validity is checked separately.
    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut bounds = [[0u16; 2]; NUM_ACTUATORS];
        for (i, pair) in bounds.iter_mut().enumerate() {
            let at = BOUNDS_OFFSET + i * 4;
            pair[0] = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
            pair[1] = u16::from_le_bytes([bytes[at + 2], bytes[at + 3]]);
        }
        Self {
            format_version: bytes[VERSION_OFFSET],
            cycle_count: bytes[CYCLES_OFFSET],
            bounds,
            stored_checksum: u32::from_le_bytes([
                bytes[CHECKSUM_OFFSET],
                bytes[CHECKSUM_OFFSET + 1],
                bytes[CHECKSUM_OFFSET + 2],
                bytes[CHECKSUM_OFFSET + 3],
            ]),
        }
    }

    /// Check, in order: checksum, format version, bounds sanity, cycle
    /// budget.
    pub fn validate(&self, cfg: &PersistCfg) -> core::result::Result<(), StaleReason> {
        let computed = self.checksum();
        if computed != self.stored_checksum {
            return Err(StaleReason::ChecksumMismatch {
                stored: self.stored_checksum,
                computed,
            });
        }
        if self.format_version != cfg.format_version {
            return Err(StaleReason::VersionMismatch {
                found: self.format_version,
                expected: cfg.format_version,
            });
        }
        if let Some(actuator) = self.bounds.iter().position(|[min, max]| min >= max) {
            return Err(StaleReason::InvalidBounds { actuator });
        }
        if self.cycle_count >= cfg.max_cycles {
            return Err(StaleReason::CyclesExhausted {
                count: self.cycle_count,
                max: cfg.max_cycles,
            });
        }
        Ok(())
    }
}

/// Read the raw record from the store.
pub fn read_record<S: PersistentStore>(store: &mut S) -> Result<CalibrationRecord> {
    let mut bytes = [0u8; RECORD_LEN];
    for (offset, b) in bytes.iter_mut().enumerate().take(CHECKSUM_OFFSET) {
        *b = store
            .read_byte(offset)
            .map_err(|e| eyre::Report::new(map_store_error(&*e)))
            .wrap_err("reading calibration record")?;
    }
    let crc = store
        .read_word(CHECKSUM_OFFSET)
        .map_err(|e| eyre::Report::new(map_store_error(&*e)))
        .wrap_err("reading calibration checksum")?;
    bytes[CHECKSUM_OFFSET..].copy_from_slice(&crc.to_le_bytes());
    Ok(CalibrationRecord::from_bytes(&bytes))
}

/// Write a record: payload bytes first, checksum last, then commit.
pub fn write_record<S: PersistentStore>(store: &mut S, record: &CalibrationRecord) -> Result<()> {
    for (offset, b) in record.payload().iter().enumerate() {
        store
            .write_byte(offset, *b)
            .map_err(|e| eyre::Report::new(map_store_error(&*e)))
            .wrap_err("writing calibration record")?;
    }
    store
        .write_word(CHECKSUM_OFFSET, record.stored_checksum)
        .map_err(|e| eyre::Report::new(map_store_error(&*e)))
        .wrap_err("writing calibration checksum")?;
    store
        .commit()
        .map_err(|e| eyre::Report::new(map_store_error(&*e)))
        .wrap_err("committing calibration record")
}

/// Restore the platform from the stored record if it is valid. A stale or
/// corrupt record leaves the platform untouched and is reported, not raised;
/// only store I/O errors are returned as `Err`.
pub fn load_config<S, A>(store: &mut S, platform: &mut Platform<A>) -> Result<LoadOutcome>
where
    S: PersistentStore,
    A: ActuatorIo,
{
    let record = read_record(store)?;
    if let Err(reason) = record.validate(&platform.persist_cfg()) {
        tracing::info!(%reason, "stored calibration not used");
        return Ok(LoadOutcome::Stale(reason));
    }
    if let Err(e) = platform.calibrate_with(&record.bounds) {
        // validate() checks min < max; this only trips on max > adc_max
        tracing::warn!(error = %e, "stored bounds rejected by platform");
        let actuator = match e {
            crate::error::CommandError::InvalidBounds { index, .. } => index,
            _ => 0,
        };
        return Ok(LoadOutcome::Stale(StaleReason::InvalidBounds { actuator }));
    }
    tracing::info!(cycle_count = record.cycle_count, "calibration restored from store");
    Ok(LoadOutcome::Restored {
        cycle_count: record.cycle_count,
    })
}

/// Persist the platform's current bounds.
///
/// The cycle count restarts at 0 when any unit was physically calibrated in
/// this session. Otherwise it is the previous valid record's count plus one,
/// saturating at `max_cycles`; with no valid previous record it is 0.
pub fn save_config<S, A>(store: &mut S, platform: &Platform<A>) -> Result<CalibrationRecord>
where
    S: PersistentStore,
    A: ActuatorIo,
{
    let Some(bounds) = platform.bounds() else {
        return Err(eyre::Report::new(PlatformError::State(
            "cannot save calibration: platform not calibrated".into(),
        )));
    };
    let cfg = platform.persist_cfg();

    let cycle_count = if platform.any_physical() {
        0
    } else {
        match read_record(store) {
            Ok(prev) if prev.checksum() == prev.stored_checksum
                && prev.format_version == cfg.format_version =>
            {
                prev.cycle_count.saturating_add(1).min(cfg.max_cycles)
            }
            Ok(_) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "previous record unreadable; cycle count restarts");
                0
            }
        }
    };

    let record = CalibrationRecord::new(cfg.format_version, cycle_count, bounds);
    write_record(store, &record)?;
    tracing::info!(cycle_count, "calibration saved");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn record_layout_offsets() {
        let mut bounds = [[0u16; 2]; NUM_ACTUATORS];
        bounds[0] = [0x0102, 0x0304];
        bounds[5] = [0x0a0b, 0x0c0d];
        let r = CalibrationRecord::new(7, 3, bounds);
        let bytes = r.to_bytes();
        assert_eq!(bytes[0], 7);
        assert_eq!(bytes[1], 3);
        assert_eq!(&bytes[2..6], &[0x02, 0x01, 0x04, 0x03]);
        assert_eq!(&bytes[22..26], &[0x0b, 0x0a, 0x0d, 0x0c]);
        assert_eq!(
            u32::from_le_bytes([bytes[26], bytes[27], bytes[28], bytes[29]]),
            crc32(&bytes[..26])
        );
        assert_eq!(CalibrationRecord::from_bytes(&bytes), r);
    }

    fn sane() -> CalibrationRecord {
        CalibrationRecord::new(1, 2, [[50, 950]; NUM_ACTUATORS])
    }

    #[test]
    fn validate_accepts_sane_record() {
        assert_eq!(sane().validate(&PersistCfg::default()), Ok(()));
    }

    #[test]
    fn validate_checks_checksum_first() {
        let mut r = sane();
        r.format_version = 9;
        assert!(matches!(
            r.validate(&PersistCfg::default()),
            Err(StaleReason::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_version_bounds_and_cycles() {
        let cfg = PersistCfg::default();
        let r = CalibrationRecord::new(2, 0, [[50, 950]; NUM_ACTUATORS]);
        assert_eq!(
            r.validate(&cfg),
            Err(StaleReason::VersionMismatch {
                found: 2,
                expected: 1
            })
        );

        let mut bounds = [[50, 950]; NUM_ACTUATORS];
        bounds[4] = [700, 700];
        let r = CalibrationRecord::new(1, 0, bounds);
        assert_eq!(
            r.validate(&cfg),
            Err(StaleReason::InvalidBounds { actuator: 4 })
        );

        let r = CalibrationRecord::new(1, cfg.max_cycles, [[50, 950]; NUM_ACTUATORS]);
        assert_eq!(
            r.validate(&cfg),
            Err(StaleReason::CyclesExhausted {
                count: cfg.max_cycles,
                max: cfg.max_cycles
            })
        );
    }

    #[test]
    fn erased_store_is_a_checksum_mismatch() {
        let r = CalibrationRecord::from_bytes(&[0xFF; RECORD_LEN]);
        assert!(matches!(
            r.validate(&PersistCfg::default()),
            Err(StaleReason::ChecksumMismatch { .. })
        ));
    }
}
