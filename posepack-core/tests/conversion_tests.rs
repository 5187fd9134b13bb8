use posepack_core::archive::TarStream;
use posepack_core::*;

use flate2::write::GzEncoder;
use half::f16;
use ndarray::{ArrayD, Axis};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

// --- Test Helper Functions ---

fn tar_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, name, data.as_slice())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One person whose pose values are `offset + i` (x, y, confidence triplets).
fn one_person(offset: f32) -> Vec<u8> {
    let pose: Vec<f32> = (0..25 * 3).map(|i| offset + i as f32).collect();
    let hand: Vec<f32> = (0..21 * 3).map(|i| offset + 0.5 * i as f32).collect();
    json!({
        "version": 1.3,
        "people": [{
            "person_id": [-1],
            "pose_keypoints_2d": pose,
            "face_keypoints_2d": [],
            "hand_left_keypoints_2d": hand,
            "hand_right_keypoints_2d": hand,
        }]
    })
    .to_string()
    .into_bytes()
}

fn nobody() -> Vec<u8> {
    br#"{"version": 1.3, "people": []}"#.to_vec()
}

fn frame_entry(sample: &str, index: u64, data: Vec<u8>) -> (String, Vec<u8>) {
    (format!("keypoints/{sample}_{index:012}_keypoints.json"), data)
}

/// Reads every entry of a written chunk.
fn read_entries(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let bytes = fs::read(path).unwrap();
    let mut stream = TarStream::new(bytes.as_slice());
    let mut entries = BTreeMap::new();
    while let Some(header) = stream.next_member().unwrap() {
        let data = stream.read_payload().unwrap();
        entries.insert(header.name, data);
    }
    entries
}

fn decode_f16(data: &[u8]) -> ArrayD<f16> {
    NpyArray::decode(data).unwrap().to_array::<f16>().unwrap()
}

fn template_in(dir: &Path, pattern: &str) -> String {
    dir.join(pattern).display().to_string()
}

// --- Conversion ---

#[test]
fn test_two_samples_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.tar");
    fs::write(
        &input,
        tar_bytes(&[
            frame_entry("A", 0, one_person(0.0)),
            frame_entry("A", 1, nobody()),
            frame_entry("B", 0, one_person(100.0)),
        ]),
    )
    .unwrap();

    let config = CoreConfigBuilder::new()
        .body_regions([BodyRegion::Pose])
        .n_coords(2)
        .build();
    let summary = convert_archive(&config, &input, &template_in(dir.path(), "out-{}.tar")).unwrap();

    assert_eq!(summary.samples, 2);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.ok_frames, 2);
    assert_eq!(summary.missing_person_frames, 1);
    assert_eq!(summary.detection_files, 3);
    assert_eq!(summary.chunks.len(), 1);
    assert!(summary.chunks[0].path.ends_with("out-1.tar"));

    let entries = read_entries(&summary.chunks[0].path);
    let names: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["poses/pose/A.npy", "poses/pose/B.npy"]);

    let a = decode_f16(&entries["poses/pose/A.npy"]);
    assert_eq!(a.shape(), &[2, 25, 2]);
    // First landmark of the first frame is (0, 1); confidence dropped.
    assert_eq!(a[[0, 0, 0]].to_f32(), 0.0);
    assert_eq!(a[[0, 0, 1]].to_f32(), 1.0);
    assert_eq!(a[[0, 1, 0]].to_f32(), 3.0);
    assert!(a.index_axis(Axis(0), 1).iter().all(|v| v.is_nan()));

    let b = decode_f16(&entries["poses/pose/B.npy"]);
    assert_eq!(b.shape(), &[1, 25, 2]);
    assert_eq!(b[[0, 0, 0]].to_f32(), 100.0);
}

#[test]
fn test_default_regions_with_confidence() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.tar.gz");
    fs::write(
        &input,
        gzip(&tar_bytes(&[
            frame_entry("clip_01", 1, one_person(0.0)),
            frame_entry("clip_01", 0, one_person(10.0)),
        ])),
    )
    .unwrap();

    let summary = convert_archive(
        &CoreConfig::default(),
        &input,
        &template_in(dir.path(), "out-{:03}.tar"),
    )
    .unwrap();
    assert!(summary.chunks[0].path.ends_with("out-001.tar"));

    let entries = read_entries(&summary.chunks[0].path);
    assert_eq!(entries.len(), 3);
    let pose = decode_f16(&entries["poses/pose/clip_01.npy"]);
    assert_eq!(pose.shape(), &[2, 25, 3]);
    // Frames are ordered by index, not by archive order.
    assert_eq!(pose[[0, 0, 0]].to_f32(), 10.0);
    assert_eq!(pose[[1, 0, 0]].to_f32(), 0.0);
    assert_eq!(pose[[1, 0, 2]].to_f32(), 2.0);

    let hand = decode_f16(&entries["poses/left_hand/clip_01.npy"]);
    assert_eq!(hand.shape(), &[2, 21, 3]);
    assert!(entries.contains_key("poses/right_hand/clip_01.npy"));
}

#[test]
fn test_empty_archive_writes_one_empty_chunk() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.tar");
    fs::write(&input, tar_bytes(&[])).unwrap();

    let summary = convert_archive(
        &CoreConfig::default(),
        &input,
        &template_in(dir.path(), "out-{}.tar"),
    )
    .unwrap();

    assert_eq!(summary.samples, 0);
    assert_eq!(summary.chunks.len(), 1);
    assert!(summary.chunks[0].path.exists());
    assert!(read_entries(&summary.chunks[0].path).is_empty());
}

#[test]
fn test_nested_archives() {
    let dir = tempdir().unwrap();
    let first = gzip(&tar_bytes(&[
        frame_entry("A", 0, one_person(0.0)),
        frame_entry("A", 1, one_person(1.0)),
    ]));
    let second = gzip(&tar_bytes(&[frame_entry("B", 0, one_person(2.0))]));
    let input = dir.path().join("outer.tar");
    fs::write(
        &input,
        tar_bytes(&[
            ("shards/a.tar.gz".to_string(), first),
            ("shards/b.tar.gz".to_string(), second),
        ]),
    )
    .unwrap();

    let config = CoreConfigBuilder::new()
        .body_regions([BodyRegion::Pose])
        .sub_tars(true)
        .build();
    let summary = convert_archive(&config, &input, &template_in(dir.path(), "out-{}.tar")).unwrap();
    assert_eq!(summary.samples, 2);
    assert_eq!(summary.frames, 3);

    // Without nested traversal the sub-archives are not looked into.
    let flat = CoreConfigBuilder::new().body_regions([BodyRegion::Pose]).build();
    let summary = convert_archive(&flat, &input, &template_in(dir.path(), "flat-{}.tar")).unwrap();
    assert_eq!(summary.samples, 0);
}

#[test]
fn test_chunk_rollover_keeps_every_sample() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.tar");
    let entries: Vec<(String, Vec<u8>)> = (0..6)
        .flat_map(|s| (0..3).map(move |f| frame_entry(&format!("s{s}"), f, one_person(f as f32))))
        .collect();
    fs::write(&input, tar_bytes(&entries)).unwrap();

    let config = CoreConfigBuilder::new()
        .body_regions([BodyRegion::Pose])
        .max_chunk_size(1)
        .build();
    let summary = convert_archive(&config, &input, &template_in(dir.path(), "c-{}.tar")).unwrap();

    // A one-byte threshold flushes after every entry, plus the empty final chunk.
    assert_eq!(summary.chunks.len(), 7);
    let mut seen = Vec::new();
    for (i, chunk) in summary.chunks.iter().enumerate() {
        assert!(chunk.path.ends_with(format!("c-{}.tar", i + 1)));
        seen.extend(read_entries(&chunk.path).into_keys());
    }
    let expected: Vec<String> = (0..6).map(|s| format!("poses/pose/s{s}.npy")).collect();
    assert_eq!(seen, expected);
    assert_eq!(
        summary.bytes_written(),
        summary.chunks.iter().map(|c| fs::metadata(&c.path).unwrap().len()).sum::<u64>()
    );
}

#[test]
fn test_webdataset_layout_with_statuses() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.tar");
    let crowd = json!({ "people": [{}, {}] }).to_string().into_bytes();
    fs::write(
        &input,
        tar_bytes(&[
            frame_entry("v", 0, one_person(0.0)),
            frame_entry("v", 1, crowd),
            frame_entry("v", 2, nobody()),
        ]),
    )
    .unwrap();

    let config = CoreConfigBuilder::new()
        .body_regions([BodyRegion::Pose, BodyRegion::RightHand])
        .layout(OutputLayout::Webdataset)
        .write_frame_statuses(true)
        .build();
    let summary = convert_archive(&config, &input, &template_in(dir.path(), "wds-{}.tar")).unwrap();
    assert_eq!(summary.multiple_people_frames, 1);

    let entries = read_entries(&summary.chunks[0].path);
    assert!(entries.contains_key("v.pose.pose.npy"));
    assert!(entries.contains_key("v.pose.right_hand.npy"));
    let statuses: Vec<FrameStatus> = serde_json::from_slice(&entries["v.statuses.json"]).unwrap();
    assert_eq!(
        statuses,
        vec![FrameStatus::Ok, FrameStatus::MultiplePeople, FrameStatus::MissingPerson]
    );
}

#[test]
fn test_inspect_converted_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.tar");
    fs::write(&input, tar_bytes(&[frame_entry("A", 0, one_person(0.0))])).unwrap();

    let summary = convert_archive(
        &CoreConfig::default(),
        &input,
        &template_in(dir.path(), "out-{}.tar"),
    )
    .unwrap();
    let arrays = inspect_archive(&summary.chunks[0].path).unwrap();
    assert_eq!(arrays.len(), 3);
    assert!(arrays.iter().all(|a| a.dtype == Dtype::F16 && a.frames() == Some(1)));
    assert_eq!(arrays[0].shape, vec![1, 25, 3]);
}

#[test]
fn test_arrays_follow_requested_region_order() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.tar");
    fs::write(&input, tar_bytes(&[frame_entry("A", 0, one_person(0.0))])).unwrap();

    let config = CoreConfigBuilder::new()
        .body_regions([BodyRegion::Face, BodyRegion::RightHand, BodyRegion::Pose])
        .build();
    let summary = convert_archive(&config, &input, &template_in(dir.path(), "out-{}.tar")).unwrap();

    let names: Vec<String> = inspect_archive(&summary.chunks[0].path)
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(
        names,
        vec!["poses/face/A.npy", "poses/right_hand/A.npy", "poses/pose/A.npy"]
    );
}

#[test]
fn test_directory_batch() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("inputs");
    fs::create_dir(&inputs).unwrap();
    fs::write(inputs.join("b.tar"), tar_bytes(&[frame_entry("B", 0, one_person(0.0))])).unwrap();
    fs::write(
        inputs.join("a.tar.gz"),
        gzip(&tar_bytes(&[frame_entry("A", 0, one_person(0.0))])),
    )
    .unwrap();
    fs::write(inputs.join("notes.md"), b"ignored").unwrap();

    let archives: Vec<PathBuf> = find_keypoint_archives(&inputs).unwrap();
    assert_eq!(archives.len(), 2);

    let config = CoreConfigBuilder::new().body_regions([BodyRegion::Pose]).build();
    let summary = convert_archives(&config, &archives, &template_in(dir.path(), "all-{}.tar")).unwrap();
    assert_eq!(summary.archives, 2);
    assert_eq!(summary.samples, 2);
    let names: Vec<String> = read_entries(&summary.chunks[0].path).into_keys().collect();
    assert_eq!(names, vec!["poses/pose/A.npy", "poses/pose/B.npy"]);
}

// --- Failures ---

#[test]
fn test_unknown_region_is_rejected() {
    match parse_region_list("pose,tail") {
        Err(CoreError::UnknownRegion(name)) => assert_eq!(name, "tail"),
        other => panic!("expected unknown region, got {other:?}"),
    }
}

#[test]
fn test_invalid_config_fails_before_reading() {
    let dir = tempdir().unwrap();
    let config = CoreConfigBuilder::new().n_coords(4).build();
    let missing = dir.path().join("missing.tar");
    assert!(matches!(
        convert_archive(&config, &missing, &template_in(dir.path(), "out-{}.tar")),
        Err(CoreError::Config(_))
    ));
    assert!(matches!(
        convert_archive(&CoreConfig::default(), &missing, &template_in(dir.path(), "out.tar")),
        Err(CoreError::Config(_))
    ));
}

#[test]
fn test_missing_input_is_an_archive_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.tar");
    assert!(matches!(
        convert_archive(&CoreConfig::default(), &missing, &template_in(dir.path(), "out-{}.tar")),
        Err(CoreError::ArchiveRead { .. })
    ));
}

#[test]
fn test_flushed_chunks_survive_a_failure() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.tar");
    fs::write(
        &input,
        tar_bytes(&[
            frame_entry("A", 0, one_person(0.0)),
            frame_entry("B", 0, one_person(0.0)),
            ("keypoints/broken_keypoints.json".to_string(), nobody()),
        ]),
    )
    .unwrap();

    let config = CoreConfigBuilder::new()
        .body_regions([BodyRegion::Pose])
        .max_chunk_size(1)
        .build();
    let result = convert_archive(&config, &input, &template_in(dir.path(), "c-{}.tar"));
    assert!(matches!(result, Err(CoreError::MalformedMemberName(_))));
    assert!(dir.path().join("c-1.tar").exists());
}
