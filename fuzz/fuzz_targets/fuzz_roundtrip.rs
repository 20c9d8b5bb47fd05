#![no_main]
use libfuzzer_sys::fuzz_target;
use zenraw::coders::raw::RawVariant;
use zenraw::*;

fuzz_target!(|data: &[u8]| {
    // 8-bit samples survive decode and re-encode byte for byte.
    let Some((head, stream)) = data.split_first_chunk::<3>() else {
        return;
    };
    let variant = RawVariant::ALL[head[0] as usize % RawVariant::ALL.len()];
    let width = u32::from(head[1] % 32) + 1;
    let height = u32::from(head[2] % 32) + 1;
    let info = ImageInfo::new(variant.tag()).with_size(Geometry::new(width, height));

    let registry = CoderRegistry::with_defaults();
    let Ok(images) = registry.read_blob(&info, stream, &enough::Unstoppable) else {
        return;
    };
    let encoded = registry
        .write_blob(&info, &images, &enough::Unstoppable)
        .expect("decoded frames must encode");
    assert_eq!(encoded, &stream[..encoded.len()], "roundtrip byte mismatch");
});
