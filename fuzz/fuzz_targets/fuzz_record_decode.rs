#![no_main]
use libfuzzer_sys::fuzz_target;
use stewart_core::{CalibrationRecord, PersistCfg, RECORD_LEN};
use stewart_core::persist;
use stewart_hardware::MemoryStore;
use stewart_traits::PersistentStore;

fuzz_target!(|data: &[u8]| {
    let Ok(bytes) = <[u8; RECORD_LEN]>::try_from(data.get(..RECORD_LEN).unwrap_or(&[])) else {
        return;
    };
    let record = CalibrationRecord::from_bytes(&bytes);
    // Only an intact record may validate.
    if record.validate(&PersistCfg::default()).is_ok() {
        assert_eq!(record.stored_checksum, record.checksum());
        assert!(record.bounds.iter().all(|[min, max]| min < max));
    }

    // Decoding through a store sees the same record.
    let mut store = MemoryStore::new(64);
    for (i, b) in bytes.iter().enumerate() {
        store.write_byte(i, *b).expect("in range");
    }
    let via_store = persist::read_record(&mut store).expect("readable");
    assert_eq!(via_store, record);
});
