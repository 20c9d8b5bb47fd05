#![no_main]
use libfuzzer_sys::fuzz_target;
use zenraw::*;

const TYPES: [QuantumType; 12] = [
    QuantumType::Gray,
    QuantumType::GrayAlpha,
    QuantumType::Rgb,
    QuantumType::Rgba,
    QuantumType::Bgr,
    QuantumType::Bgra,
    QuantumType::Bgro,
    QuantumType::Alpha,
    QuantumType::Red,
    QuantumType::Cmyk,
    QuantumType::Cmyka,
    QuantumType::Black,
];

fuzz_target!(|data: &[u8]| {
    let Some((head, bytes)) = data.split_first_chunk::<4>() else {
        return;
    };
    let quantum_type = TYPES[head[0] as usize % TYPES.len()];
    let Ok(mut quantum) = QuantumInfo::default().with_depth(u32::from(head[1] % 32) + 1) else {
        return;
    };
    quantum = quantum
        .with_endian(if head[2] & 1 == 0 { Endian::Lsb } else { Endian::Msb })
        .with_pack(head[2] & 2 == 0)
        .with_pad(usize::from(head[2] >> 5));
    let columns = u32::from(head[3] % 32) + 1;

    let Ok(mut image) = Image::new(columns, 1) else {
        return;
    };
    if quantum_type.needs_cmyk() {
        image.set_colorspace(Colorspace::Cmyk);
    }

    // Short or long buffers must never panic.
    if let Some(mut target) = image.row_target(0) {
        let _ = quantum::import_quantum_pixels(&quantum, quantum_type, bytes, &mut target);
    }
    let mut out = vec![0u8; quantum.extent(columns as usize, quantum_type)];
    if let Some(source) = image.row_source(0) {
        let _ = quantum::export_quantum_pixels(&quantum, quantum_type, &source, &mut out);
    }
});
