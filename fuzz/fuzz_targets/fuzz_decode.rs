#![no_main]
use libfuzzer_sys::fuzz_target;
use zenraw::coders::raw::RawVariant;
use zenraw::*;

const INTERLACES: [Interlace; 3] = [Interlace::None, Interlace::Line, Interlace::Plane];

fuzz_target!(|data: &[u8]| {
    // First 8 bytes pick the read settings, the rest is the stream.
    let Some((head, stream)) = data.split_first_chunk::<8>() else {
        return;
    };
    let variant = RawVariant::ALL[head[0] as usize % RawVariant::ALL.len()];
    let width = u32::from(head[1] % 64) + 1;
    let height = u32::from(head[2] % 64) + 1;
    let depth = u32::from(head[3] % 32) + 1;
    let mut info = ImageInfo::new(variant.tag())
        .with_size(Geometry::with_offset(width, height, i64::from(head[4] % 8), 0))
        .with_depth(depth)
        .with_interlace(INTERLACES[head[5] as usize % 3])
        .with_endian(if head[6] & 1 == 0 { Endian::Lsb } else { Endian::Msb })
        .with_limits(Limits {
            max_pixels: Some(1 << 16),
            ..Limits::default()
        });
    if head[6] & 2 != 0 {
        info = info.with_option("quantum:format", "floating-point");
    }
    if head[7] != 0 {
        info = info.with_extract(Geometry::with_offset(
            u32::from(head[7] % 16) + 1,
            u32::from(head[7] / 16) + 1,
            i64::from(head[7] % 5) - 2,
            i64::from(head[7] % 3) - 1,
        ));
    }

    // Must never panic.
    let registry = CoderRegistry::with_defaults();
    let _ = registry.read_blob(&info, stream, &enough::Unstoppable);
    let _ = registry.read_blob(&ImageInfo::new("FARBFELD"), data, &enough::Unstoppable);
});
