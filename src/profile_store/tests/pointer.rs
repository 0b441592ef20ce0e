use std::{fs, os::unix::fs::symlink, path::Path};

use super::{Fixture, U1};
use crate::profile_store::pointer::{
    decode_filename, is_masked, pointer_filename, read_pointer, write_pointer,
};

#[test]
fn pointer_filename_layout() {
    let dir = Path::new("/run/profiles");

    assert_eq!(
        pointer_filename(dir, U1, false),
        dir.join(format!(".loaded-{U1}.nmkeyfile"))
    );
    assert_eq!(
        pointer_filename(dir, U1, true),
        dir.join(format!(".loaded-{U1}.nmkeyfile~"))
    );
}

#[test]
fn decode_filename_extracts_uuid() {
    assert_eq!(
        decode_filename(&format!(".loaded-{U1}.nmkeyfile")).as_deref(),
        Some(U1)
    );
}

#[test]
fn decode_filename_requires_canonical_uuid() {
    assert_eq!(
        decode_filename(&format!(".loaded-{}.nmkeyfile", U1.to_uppercase())),
        None
    );
    assert_eq!(
        decode_filename(&format!(".loaded-{}.nmkeyfile", U1.replace('-', ""))),
        None
    );
}

#[test]
fn decode_filename_rejects_other_names() {
    assert_eq!(decode_filename(&format!("loaded-{U1}.nmkeyfile")), None);
    assert_eq!(decode_filename(&format!(".loaded-{U1}.nmkeyfile~")), None);
    assert_eq!(decode_filename(&format!(".loaded-{U1}")), None);
    assert_eq!(decode_filename(".loaded-not-a-uuid.nmkeyfile"), None);
    assert_eq!(decode_filename(".loaded-.nmkeyfile"), None);
}

#[test]
fn write_pointer_stores_relative_target_inside_dir() {
    let fixture = Fixture::new();
    let target = fixture.run.join("home");

    let path = write_pointer(&fixture.run, U1, Some(&target), true).unwrap();

    assert_eq!(fs::read_link(&path).unwrap(), Path::new("home"));
    assert!(!pointer_filename(&fixture.run, U1, true).exists());

    let name = path.file_name().unwrap().to_str().unwrap();
    let pointer = read_pointer(&fixture.run, name, false).unwrap();
    assert_eq!(pointer.uuid, U1);
    assert_eq!(pointer.target, target);
}

#[test]
fn write_pointer_keeps_absolute_target() {
    let fixture = Fixture::new();
    let inside = fixture.run.join("home");
    let outside = fixture.etc.join("home");

    let path = write_pointer(&fixture.run, U1, Some(&outside), true).unwrap();
    assert_eq!(fs::read_link(&path).unwrap(), outside);

    let path = write_pointer(&fixture.run, U1, Some(&inside), false).unwrap();
    assert_eq!(fs::read_link(&path).unwrap(), inside);
}

#[test]
fn write_pointer_without_target_removes_pointer() {
    let fixture = Fixture::new();
    let path = write_pointer(&fixture.etc, U1, Some(Path::new("/dev/null")), true).unwrap();
    assert!(fs::symlink_metadata(&path).is_ok());

    write_pointer(&fixture.etc, U1, None, true).unwrap();

    assert!(fs::symlink_metadata(&path).is_err());
    assert!(write_pointer(&fixture.etc, U1, None, true).is_ok());
}

#[test]
fn read_pointer_reports_masked_target() {
    let fixture = Fixture::new();
    write_pointer(&fixture.etc, U1, Some(Path::new("/dev/null")), true).unwrap();

    let name = format!(".loaded-{U1}.nmkeyfile");
    let pointer = read_pointer(&fixture.etc, &name, false).unwrap();

    assert!(is_masked(&pointer.target));
    assert!(!is_masked(Path::new("/dev/zero")));
}

#[test]
fn read_pointer_requires_symlink() {
    let fixture = Fixture::new();
    let name = format!(".loaded-{U1}.nmkeyfile");
    fs::write(fixture.etc.join(&name), "not a link").unwrap();

    assert_eq!(read_pointer(&fixture.etc, &name, false), None);
}

#[test]
fn read_pointer_accepts_dangling_link() {
    let fixture = Fixture::new();
    let name = format!(".loaded-{U1}.nmkeyfile");
    symlink("gone", fixture.run.join(&name)).unwrap();

    let pointer = read_pointer(&fixture.run, &name, false).unwrap();

    assert_eq!(pointer.target, fixture.run.join("gone"));
}
