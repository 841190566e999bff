#![no_main]
use libfuzzer_sys::fuzz_target;
use powershop_nz::report::{INTERVALS_PER_DAY, parse_report};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    // Header failures are fine; any parsed row must carry a full day
    if let Ok(rows) = parse_report(&text) {
        for row in rows {
            assert_eq!(row.values.len(), INTERVALS_PER_DAY);
        }
    }
});
