use std::sync::{Arc, Mutex};

use enough::Unstoppable;
use zenraw::*;

/// xorshift noise, one byte per sample.
fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state: u32 = 0xDEAD_BEEF ^ seed;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xFF) as u8
        })
        .collect()
}

fn bgra_image(w: u32, h: u32) -> ImageList {
    let data = noise((w * h * 4) as usize, w * 31 + h);
    let info = ImageInfo::new("BGRA").with_size(Geometry::new(w, h));
    CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap()
}

fn progress_log(info: ImageInfo) -> (ImageInfo, Arc<Mutex<Vec<(String, u64, u64)>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let info = info.with_monitor(move |tag: &str, offset: u64, span: u64| {
        sink.lock().unwrap().push((tag.to_string(), offset, span));
        true
    });
    (info, log)
}

// ── Scheme equivalence ───────────────────────────────────────────────

#[test]
fn none_line_and_plane_decode_identically() {
    let registry = CoderRegistry::with_defaults();
    let images = bgra_image(9, 4);
    let source = images.first().unwrap();
    for tag in ["BGRA", "RGBA", "BGRO", "CMYKA"] {
        let mut decoded = Vec::new();
        for interlace in [Interlace::None, Interlace::Line, Interlace::Plane] {
            let info = ImageInfo::new(tag)
                .with_size(Geometry::new(9, 4))
                .with_interlace(interlace);
            let blob = registry.write_blob(&info, &images, &Unstoppable).unwrap();
            let back = registry.read_blob(&info, &blob, &Unstoppable).unwrap();
            decoded.push(back.into_vec().remove(0));
        }
        assert_eq!(decoded[0].pixels(), decoded[1].pixels(), "{tag} line");
        assert_eq!(decoded[0].pixels(), decoded[2].pixels(), "{tag} plane");
        assert_eq!(decoded[0].indexes(), decoded[2].indexes(), "{tag} black");
        if tag != "CMYKA" {
            assert_eq!(decoded[0].pixels(), source.pixels(), "{tag}");
        }
    }
}

#[test]
fn line_interlace_is_channel_rows() {
    let images = bgra_image(2, 1);
    let info = ImageInfo::new("BGR")
        .with_size(Geometry::new(2, 1))
        .with_interlace(Interlace::Line);
    let line = CoderRegistry::with_defaults()
        .write_blob(&info, &images, &Unstoppable)
        .unwrap();
    let interleaved = CoderRegistry::with_defaults()
        .write_blob(&ImageInfo::new("BGR"), &images, &Unstoppable)
        .unwrap();
    // b0 g0 r0 b1 g1 r1 -> b0 b1 g0 g1 r0 r1
    let expected = [
        interleaved[0],
        interleaved[3],
        interleaved[1],
        interleaved[4],
        interleaved[2],
        interleaved[5],
    ];
    assert_eq!(line, expected);
}

#[test]
fn plane_interlace_length_is_sum_of_planes() {
    let images = bgra_image(5, 3);
    let info = ImageInfo::new("CMYKA").with_interlace(Interlace::Plane);
    let blob = CoderRegistry::with_defaults()
        .write_blob(&info, &images, &Unstoppable)
        .unwrap();
    assert_eq!(blob.len(), 5 * 5 * 3);
}

#[test]
fn gray_ignores_line_and_plane() {
    let data = noise(12, 1);
    let registry = CoderRegistry::with_defaults();
    let plain = registry
        .read_blob(
            &ImageInfo::new("GRAY").with_size(Geometry::new(4, 3)),
            &data,
            &Unstoppable,
        )
        .unwrap();
    let plane = registry
        .read_blob(
            &ImageInfo::new("GRAY")
                .with_size(Geometry::new(4, 3))
                .with_interlace(Interlace::Plane),
            &data,
            &Unstoppable,
        )
        .unwrap();
    assert_eq!(plain.first().unwrap().pixels(), plane.first().unwrap().pixels());
}

// ── Partition ────────────────────────────────────────────────────────

#[test]
fn bgra_partition_writes_four_channel_blobs() {
    let (w, h) = (6u32, 5u32);
    let images = bgra_image(w, h);
    let interleaved = CoderRegistry::with_defaults()
        .write_blob(&ImageInfo::new("BGRA"), &images, &Unstoppable)
        .unwrap();

    let info = ImageInfo::new("BGRA")
        .with_filename("out.raw")
        .with_interlace(Interlace::Partition);
    let mut store = MemoryStore::new();
    CoderRegistry::with_defaults()
        .write_image(&info, &images, &mut store, &Unstoppable)
        .unwrap();

    let names: Vec<&str> = store.names().collect();
    assert_eq!(names, ["out.rawA", "out.rawB", "out.rawG", "out.rawR"]);
    for (channel, suffix) in ["B", "G", "R", "A"].into_iter().enumerate() {
        let blob = store.get(&format!("out.raw{suffix}")).unwrap();
        assert_eq!(blob.len(), (w * h) as usize, "{suffix}");
        let expected: Vec<u8> = interleaved.iter().skip(channel).step_by(4).copied().collect();
        assert_eq!(blob, &expected[..], "{suffix}");
    }
}

#[test]
fn partition_reads_back() {
    let images = bgra_image(4, 4);
    let info = ImageInfo::new("BGRA")
        .with_filename("p")
        .with_size(Geometry::new(4, 4))
        .with_interlace(Interlace::Partition);
    let registry = CoderRegistry::with_defaults();
    let mut store = MemoryStore::new();
    registry
        .write_image(&info, &images, &mut store, &Unstoppable)
        .unwrap();
    let back = registry.read_image(&info, &store, &Unstoppable).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back.first().unwrap().pixels(), images.first().unwrap().pixels());
}

#[test]
fn partition_sequence_selects_scene() {
    let registry = CoderRegistry::with_defaults();
    let mut frames = ImageList::new();
    for seed in 0..3 {
        let data = noise(2 * 2 * 3, seed);
        let info = ImageInfo::new("RGB").with_size(Geometry::new(2, 2));
        frames.push(registry.read_blob(&info, &data, &Unstoppable).unwrap().into_vec().remove(0));
    }
    let info = ImageInfo::new("RGB")
        .with_filename("seq")
        .with_size(Geometry::new(2, 2))
        .with_interlace(Interlace::Partition);
    let mut store = MemoryStore::new();
    registry
        .write_image(&info, &frames, &mut store, &Unstoppable)
        .unwrap();
    assert_eq!(store.get("seqR").unwrap().len(), 12);

    let all = registry.read_image(&info, &store, &Unstoppable).unwrap();
    assert_eq!(all.len(), 3);

    let second = registry
        .read_image(&info.clone().with_scene(1, 1), &store, &Unstoppable)
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second.first().unwrap().pixels(), frames.get(1).unwrap().pixels());
}

#[test]
fn missing_partition_blob_fails_to_open() {
    let info = ImageInfo::new("RGB")
        .with_filename("none")
        .with_size(Geometry::new(1, 1))
        .with_interlace(Interlace::Partition);
    let err = CoderRegistry::with_defaults()
        .read_image(&info, &MemoryStore::new(), &Unstoppable)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileOpen);
}

#[test]
fn blob_entry_points_refuse_partition() {
    let info = ImageInfo::new("RGB")
        .with_size(Geometry::new(1, 1))
        .with_interlace(Interlace::Partition);
    let registry = CoderRegistry::with_defaults();
    let err = registry.read_blob(&info, &[0; 3], &Unstoppable).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Option);
    let err = registry
        .write_blob(&info, &bgra_image(1, 1), &Unstoppable)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Option);
}

// ── Extract ──────────────────────────────────────────────────────────

#[test]
fn extract_matches_slicing_the_full_row() {
    let (w, h) = (10u32, 6u32);
    let data = noise((w * h * 3) as usize, 7);
    let registry = CoderRegistry::with_defaults();
    let full = registry
        .read_blob(
            &ImageInfo::new("BGR").with_size(Geometry::new(w, h)),
            &data,
            &Unstoppable,
        )
        .unwrap();
    let full = full.first().unwrap();

    for interlace in [Interlace::None, Interlace::Line, Interlace::Plane] {
        // Re-encode the source in this scheme, then crop while reading.
        let stream_info = ImageInfo::new("BGR")
            .with_size(Geometry::new(w, h))
            .with_interlace(interlace);
        let stream = registry
            .write_blob(&stream_info, &ImageList::from(full.clone()), &Unstoppable)
            .unwrap();
        let info = stream_info.with_extract(Geometry::with_offset(4, 3, 3, 2));
        let cropped = registry.read_blob(&info, &stream, &Unstoppable).unwrap();
        let cropped = cropped.first().unwrap();
        assert_eq!((cropped.columns(), cropped.rows()), (4, 3));
        for y in 0..3 {
            let expected = &full.row(y + 2).unwrap()[3..7];
            assert_eq!(cropped.row(y).unwrap(), expected, "{interlace:?} row {y}");
        }
    }
}

#[test]
fn extract_past_the_edge_is_black() {
    let data = vec![255u8; 2 * 2 * 3];
    let info = ImageInfo::new("RGB")
        .with_size(Geometry::new(2, 2))
        .with_extract(Geometry::with_offset(2, 2, 1, 0));
    let images = CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap();
    let image = images.first().unwrap();
    assert_eq!(image.pixel(0, 0), Some(PixelPacket::WHITE));
    assert_eq!(image.pixel(1, 0), Some(PixelPacket::BLACK));
}

#[test]
fn extreme_extract_offsets_read_black() {
    let data = vec![255u8; 2 * 2];
    for spec in [
        "gray:-[2x2+9223372036854775807+0]",
        "gray:-[2x2+0-9223372036854775807]",
        "gray:-[2x2-9223372036854775807+9223372036854775807]",
    ] {
        let info = ImageInfo::from_spec(spec)
            .unwrap()
            .with_size(Geometry::new(2, 2));
        let images = CoderRegistry::with_defaults()
            .read_blob(&info, &data, &Unstoppable)
            .unwrap();
        let image = images.first().unwrap();
        assert_eq!(image.columns(), 2, "{spec}");
        assert!(
            image.pixels().iter().all(|p| *p == PixelPacket::BLACK),
            "{spec}"
        );
    }
}

#[test]
fn extract_from_filename_syntax() {
    let data = noise(8 * 8, 3);
    let mut store = MemoryStore::new();
    store.insert("g.raw", data.clone());
    let info = ImageInfo::from_spec("gray:g.raw[2x2+6+6]")
        .unwrap()
        .with_size(Geometry::new(8, 8));
    let images = CoderRegistry::with_defaults()
        .read_image(&info, &store, &Unstoppable)
        .unwrap();
    let image = images.first().unwrap();
    assert_eq!(image.columns(), 2);
    assert_eq!(image.pixel(1, 1).unwrap().red, scale_char_to_quantum(data[63]));
}

#[test]
fn header_offset_comes_from_size() {
    let mut data = vec![0xAA; 5];
    data.extend_from_slice(&[1, 2, 3]);
    let info = ImageInfo::new("RGB").with_size(Geometry::with_offset(1, 1, 5, 0));
    let images = CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap();
    let p = images.first().unwrap().pixel(0, 0).unwrap();
    assert_eq!(p.red, scale_char_to_quantum(1));
}

// ── Scene selection ──────────────────────────────────────────────────

#[test]
fn scene_skips_whole_frames() {
    let frame_length = 3 * 2 * 4;
    let data = noise(frame_length * 4, 11);
    let registry = CoderRegistry::with_defaults();
    for j in 0..4u32 {
        let info = ImageInfo::new("RGBA")
            .with_size(Geometry::new(3, 2))
            .with_scene(j, 1);
        let images = registry.read_blob(&info, &data, &Unstoppable).unwrap();
        assert_eq!(images.len(), 1);
        let image = images.first().unwrap();
        assert_eq!(image.scene, j);
        let start = j as usize * frame_length;
        let only = registry
            .read_blob(
                &ImageInfo::new("RGBA").with_size(Geometry::new(3, 2)),
                &data[start..start + frame_length],
                &Unstoppable,
            )
            .unwrap();
        assert_eq!(image.pixels(), only.first().unwrap().pixels(), "scene {j}");
    }
}

#[test]
fn scene_range_reads_consecutive_frames() {
    let data = noise(4 * 4, 2);
    let info = ImageInfo::from_spec("gray:-[1-2]")
        .unwrap()
        .with_size(Geometry::new(2, 2));
    let images = CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap();
    let scenes: Vec<u32> = images.iter().map(|i| i.scene).collect();
    assert_eq!(scenes, [1, 2]);
}

#[test]
fn plane_scene_skip_uses_plane_frame_length() {
    let frame_length = 2 * 2 * 3;
    let data = noise(frame_length * 2, 4);
    let info = ImageInfo::new("BGR")
        .with_size(Geometry::new(2, 2))
        .with_interlace(Interlace::Plane);
    let registry = CoderRegistry::with_defaults();
    let second = registry
        .read_blob(&info.clone().with_scene(1, 1), &data, &Unstoppable)
        .unwrap();
    let alone = registry
        .read_blob(&info, &data[frame_length..], &Unstoppable)
        .unwrap();
    assert_eq!(second.first().unwrap().pixels(), alone.first().unwrap().pixels());
}

#[test]
fn ping_counts_frames_without_pixels() {
    let data = noise(2 * 2 * 3 * 3, 8);
    let info = ImageInfo::new("RGB")
        .with_size(Geometry::new(2, 2))
        .with_ping(true);
    let images = CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap();
    assert_eq!(images.len(), 3);
    assert!(images.iter().all(Image::is_pinged));
    assert_eq!(images.first().unwrap().columns(), 2);
}

// ── Progress ─────────────────────────────────────────────────────────

#[test]
fn plane_progress_is_six_steps_with_alpha() {
    let data = noise(3 * 2 * 4, 5);
    let (info, log) = progress_log(
        ImageInfo::new("BGRA")
            .with_size(Geometry::new(3, 2))
            .with_interlace(Interlace::Plane),
    );
    CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap();
    let steps: Vec<(u64, u64)> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(tag, _, _)| tag == LOAD_IMAGE_TAG)
        .map(|(_, offset, span)| (*offset, *span))
        .collect();
    assert_eq!(steps, [(1, 6), (2, 6), (3, 6), (4, 6), (5, 6), (6, 6)]);
}

#[test]
fn plane_progress_is_five_steps_without_alpha() {
    let images = bgra_image(3, 2);
    let (info, log) = progress_log(ImageInfo::new("RGB").with_interlace(Interlace::Plane));
    CoderRegistry::with_defaults()
        .write_blob(&info, &images, &Unstoppable)
        .unwrap();
    let steps: Vec<u64> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(tag, _, span)| tag == SAVE_IMAGE_TAG && *span == 5)
        .map(|(_, offset, _)| *offset)
        .collect();
    assert_eq!(steps, [1, 2, 3, 4, 5]);
}

#[test]
fn row_progress_covers_every_row() {
    let data = noise(4 * 3, 6);
    let (info, log) = progress_log(ImageInfo::new("GRAY").with_size(Geometry::new(4, 3)));
    CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap();
    let rows: Vec<u64> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(tag, _, _)| tag == LOAD_IMAGE_TAG)
        .map(|(_, offset, _)| *offset)
        .collect();
    assert_eq!(rows, [0, 1, 2]);
}

#[test]
fn cancelling_from_the_monitor_stops_the_read() {
    let data = noise(4 * 4, 9);
    let info = ImageInfo::new("GRAY")
        .with_size(Geometry::new(4, 4))
        .with_monitor(|_: &str, offset: u64, _: u64| offset < 1);
    let err = CoderRegistry::with_defaults()
        .read_blob(&info, &data, &Unstoppable)
        .unwrap_err();
    assert!(matches!(err.error, RawError::ProgressCancelled { .. }));
    assert_eq!(err.partial.len(), 1);
}
