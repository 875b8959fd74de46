#![no_main]
use libfuzzer_sys::fuzz_target;

use std::io::Cursor;
use byteorder::{BigEndian, ReadBytesExt};
use statkeeper::{CompressedQuantiles, LowBiased};

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);

    // unbounded, the policy clamps it into (0, 1)
    let error: f64 = if let Ok(res) = cursor.read_f64::<BigEndian>() {
        res
    } else {
        return;
    };
    let batch: usize = if let Ok(res) = cursor.read_u8() {
        usize::from(res) + 1
    } else {
        return;
    };

    let mut values = Vec::new();
    while let Ok(v) = cursor.read_i32::<BigEndian>() {
        values.push(i64::from(v));
    }

    let mut sketch = CompressedQuantiles::new(LowBiased::new(error));
    for chunk in values.chunks(batch) {
        sketch.insert(&mut chunk.to_vec());
    }
    assert_eq!(sketch.count(), values.len() as u64);
    assert!(sketch.samples().windows(2).all(|w| w[0].value <= w[1].value));

    if let (Some(lo), Some(hi)) = (values.iter().min(), values.iter().max()) {
        assert_eq!(sketch.query(0.0).ok(), Some(*lo));
        assert_eq!(sketch.query(1.0).ok(), Some(*hi));
    }
});
