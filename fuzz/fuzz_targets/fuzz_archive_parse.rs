#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Read;
use wrap_rs::{Archive, HEADER_SIZE};

fuzz_target!(|data: &[u8]| {
    if data.len() < HEADER_SIZE {
        return;
    }

    // Opening checks the extension, so a named file is needed
    let dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(_) => return,
    };
    let path = dir.path().join("fuzz.wrap");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    // Should never panic, whatever the table claims
    let archive = match Archive::open(&path) {
        Ok(a) => a,
        Err(_) => return,
    };

    for path in archive.paths() {
        let _ = archive.read(&path);

        if let Ok(mut reader) = archive.stream(&path) {
            let mut sink = Vec::new();
            let _ = reader.read_to_end(&mut sink);
        }
    }

    let _ = archive.contains("test.txt");
    let _ = archive.contains("");
    let _ = archive.contains("/");
    let _ = archive.contains("../../../etc/passwd");
    let _ = archive.entry(usize::MAX);
});
