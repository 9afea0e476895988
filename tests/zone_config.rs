use std::path::Path;

use psms::detect::{ClassNames, Detection};
use psms::{classify, count_occupied, zones, FrameSize, PsmsError, UnmatchedLinePolicy};

fn write_zone_file(dir: &Path, text: &str) -> std::path::PathBuf {
    let path = dir.join("zones.txt");
    std::fs::write(&path, text).expect("write zone file");
    path
}

fn car_at(cx: f32, cy: f32) -> Detection {
    Detection::new(cx - 2.0, cy - 2.0, cx + 2.0, cy + 2.0, 0.9, 2)
}

#[test]
fn bundled_sample_zone_file_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/zones.txt");
    let config = zones::load(&path, UnmatchedLinePolicy::Reject).expect("load sample zones");
    assert_eq!(config.zone_count, 4);
    assert_eq!(config.zones.len(), 4);
    assert_eq!(config.frame_size(), FrameSize::new(1280, 720));
}

#[test]
fn square_zone_occupied_by_centered_car() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_zone_file(
        dir.path(),
        "0: [(0,0), (10,0), (10,10), (0,10)]\nnumber_of_zone: 1\nframe_width: 64\nframe_height: 48\n",
    );
    let config = zones::load(&path, UnmatchedLinePolicy::default()).expect("load zones");

    let inside = classify(&[car_at(5.0, 5.0)], &config.zones, config.zone_count, &ClassNames::coco());
    assert_eq!(inside.occupancy.lists(), &[vec!["car".to_string()]]);
    assert_eq!(count_occupied(config.zone_count, &inside.occupancy), 1);

    let outside = classify(&[car_at(50.0, 50.0)], &config.zones, config.zone_count, &ClassNames::coco());
    assert_eq!(outside.occupancy.lists(), &[Vec::<String>::new()]);
    assert!(outside.annotated.is_empty());
    assert_eq!(count_occupied(config.zone_count, &outside.occupancy), 0);

    let on_edge = classify(&[car_at(10.0, 4.0)], &config.zones, config.zone_count, &ClassNames::coco());
    assert_eq!(count_occupied(config.zone_count, &on_edge.occupancy), 1);
}

#[test]
fn declared_count_sizes_occupancy() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_zone_file(
        dir.path(),
        "0: [(0,0), (10,0), (10,10), (0,10)]\nnumber_of_zone: 3\nframe_width: 64\nframe_height: 48\n",
    );
    let config = zones::load(&path, UnmatchedLinePolicy::default()).expect("load zones");
    let result = classify(&[car_at(5.0, 5.0)], &config.zones, config.zone_count, &ClassNames::coco());
    assert_eq!(result.occupancy.len(), 3);
    assert_eq!(count_occupied(config.zone_count, &result.occupancy), 1);
}

#[test]
fn load_errors_are_typed() {
    let dir = tempfile::tempdir().expect("temp dir");

    let err = zones::load(dir.path().join("absent.txt"), UnmatchedLinePolicy::default())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PsmsError>(),
        Some(PsmsError::ConfigNotFound { .. })
    ));

    let path = write_zone_file(dir.path(), "0: [(0,0), (10,0), (10,10)]\nnumber_of_zone: 1\n");
    let err = zones::load(&path, UnmatchedLinePolicy::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PsmsError>(),
        Some(PsmsError::MissingFrameDimensions)
    ));

    let path = write_zone_file(
        dir.path(),
        "frame_width: 64\nframe_height: 48\nspaces: lots\n",
    );
    let err = zones::load(&path, UnmatchedLinePolicy::Reject).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PsmsError>(),
        Some(PsmsError::MalformedZoneLine { line: 3, .. })
    ));
}
