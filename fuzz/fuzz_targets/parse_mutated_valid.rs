#![no_main]
use libfuzzer_sys::fuzz_target;

use std::sync::OnceLock;

/// A small valid file to splice fuzz input into; mutated offsets and
/// lengths exercise deeper parser states than fully arbitrary bytes.
fn template() -> &'static [u8] {
    static FILE: OnceLock<Vec<u8>> = OnceLock::new();
    FILE.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hset");
        let mut b = hset::HashsetBuilder::open(
            "fuzz",
            "",
            &[hset::HashKind::Md5],
            &path,
            dir.path(),
            true,
            true,
        )
        .unwrap();
        for v in 0..16u8 {
            let h = [v; 16];
            b.add_record(&[Some(&h)]).unwrap();
        }
        b.finalize().unwrap();
        std::fs::read(&path).unwrap()
    })
}

fuzz_target!(|input: (usize, &[u8])| {
    let (at, patch) = input;
    let mut bytes = template().to_vec();
    if bytes.is_empty() || patch.is_empty() {
        return;
    }
    let at = at % bytes.len();
    let end = (at + patch.len()).min(bytes.len());
    bytes[at..end].copy_from_slice(&patch[..end - at]);

    if let Ok(holder) = hset::format::parse::parse(&bytes) {
        // A successful parse must yield internally consistent ranges.
        for col in &holder.columns {
            assert!(col.hdat.end <= bytes.len());
            if let Some(ridx) = &col.ridx {
                assert!(ridx.end <= bytes.len());
            }
        }
    }
});
