//! Unit tests for the connection model and the keyfile format.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::{fs, os::unix::fs::PermissionsExt};

use tempfile::TempDir;

use crate::{
    KeyfileError,
    connection::{
        CompareFlags, Connection, KeyfileFormat, ProfileReader, ProfileWriter,
        keyfile::{parse, serialize},
        parse_uuid,
    },
};

const UUID: &str = "0d3e2e0a-3bd5-4c5e-8a57-4ef9c7f2b4a1";
const OTHER_UUID: &str = "5f6c7d8e-1a2b-4c3d-9e8f-001122334455";

fn wifi(psk_flags: &str) -> Connection {
    let mut connection = Connection::new("Home", UUID, "802-11-wireless").unwrap();
    connection.set("802-11-wireless-security", "psk", "secret");
    connection.set("802-11-wireless-security", "psk-flags", psk_flags);
    connection
}

#[test]
fn parse_reads_groups_and_skips_comments() {
    let content = "\
# a comment
[connection]
id = Office
uuid=0d3e2e0a-3bd5-4c5e-8a57-4ef9c7f2b4a1
type=802-3-ethernet

; another comment
[ipv4]
method=auto
";
    let connection = parse(content, None).unwrap();

    assert_eq!(connection.id(), Some("Office"));
    assert_eq!(connection.uuid(), Some(UUID));
    assert_eq!(connection.connection_type(), Some("802-3-ethernet"));
    assert_eq!(connection.get("ipv4", "method"), Some("auto"));
}

#[test]
fn parse_uses_fallback_id() {
    let content = "[connection]\nuuid=0d3e2e0a-3bd5-4c5e-8a57-4ef9c7f2b4a1\ntype=vpn\n";
    let connection = parse(content, Some("work-vpn")).unwrap();

    assert_eq!(connection.id(), Some("work-vpn"));
}

#[test]
fn parse_rejects_malformed_lines() {
    assert!(parse("[connection\nid=x\n", None).is_err());
    assert!(parse("id=x\n", None).is_err());
    assert!(parse("[connection]\njust-a-word\n", None).is_err());
    assert!(parse("[connection]\n=value\n", None).is_err());
}

#[test]
fn normalize_lowercases_uuid() {
    let connection = Connection::new("Home", &UUID.to_uppercase(), "802-11-wireless").unwrap();

    assert_eq!(connection.uuid(), Some(UUID));
}

#[test]
fn normalize_rejects_missing_identity() {
    assert!(matches!(
        Connection::new("Home", "not-a-uuid", "vpn"),
        Err(KeyfileError::Parse { .. })
    ));
    assert!(Connection::new("", UUID, "vpn").is_err());
    assert!(Connection::new("Home", UUID, "").is_err());
}

#[test]
fn parse_uuid_requires_hyphenated_form() {
    assert_eq!(parse_uuid(UUID).as_deref(), Some(UUID));
    assert_eq!(parse_uuid("0d3e2e0a3bd54c5e8a574ef9c7f2b4a1"), None);
    assert_eq!(parse_uuid("0d3e2e0a-3bd5-4c5e-8a57-4ef9c7f2b4aZ"), None);
}

#[test]
fn serialize_puts_connection_group_first() {
    let mut connection = wifi("0");
    connection.set("802-11-wireless", "ssid", "home-net");
    connection.set("ipv4", "method", "auto");

    let text = serialize(&connection);

    assert!(text.starts_with("[connection]\n"));
    assert_eq!(parse(&text, None).unwrap(), connection);
}

#[test]
fn compare_ignores_agent_owned_secrets() {
    let ours = wifi("1");
    let mut theirs = wifi("1");
    theirs.set("802-11-wireless-security", "psk", "different");

    assert!(!ours.compare(&theirs, CompareFlags::EXACT));
    assert!(ours.compare(&theirs, CompareFlags::IGNORE_AGENT_OWNED_SECRETS));
    assert!(ours.equivalent(&theirs));
}

#[test]
fn compare_ignores_not_saved_secrets() {
    let ours = wifi("2");
    let mut theirs = wifi("2");
    theirs.remove("802-11-wireless-security", "psk");

    assert!(!ours.compare(&theirs, CompareFlags::IGNORE_AGENT_OWNED_SECRETS));
    assert!(ours.compare(&theirs, CompareFlags::IGNORE_NOT_SAVED_SECRETS));
    assert!(ours.equivalent(&theirs));
}

#[test]
fn compare_keeps_system_owned_secrets() {
    let ours = wifi("0");
    let mut theirs = wifi("0");
    theirs.set("802-11-wireless-security", "psk", "different");

    assert!(!ours.equivalent(&theirs));
}

#[test]
fn compare_uses_shared_wep_key_flags() {
    let mut ours = wifi("0");
    ours.set("802-11-wireless-security", "wep-key0", "abc");
    ours.set("802-11-wireless-security", "wep-key-flags", "1");
    let mut theirs = ours.clone();
    theirs.set("802-11-wireless-security", "wep-key0", "xyz");

    assert!(ours.equivalent(&theirs));
}

#[test]
fn compare_treats_missing_group_as_empty() {
    let ours = wifi("0");
    let mut theirs = wifi("0");
    theirs.set("ipv6", "method", "auto");
    theirs.remove("ipv6", "method");

    assert!(ours.compare(&theirs, CompareFlags::EXACT));
}

#[test]
fn read_profile_resolves_certificate_paths() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corp");
    fs::write(
        &path,
        format!(
            "[connection]\nid=corp\nuuid={UUID}\ntype=802-3-ethernet\n\n\
             [802-1x]\nca-cert=certs/ca.pem\nclient-cert=/abs/client.pem\n"
        ),
    )
    .unwrap();

    let connection = KeyfileFormat.read_profile(&path, dir.path()).unwrap();

    let expected = dir.path().join("certs/ca.pem");
    assert_eq!(
        connection.get("802-1x", "ca-cert"),
        Some(expected.to_str().unwrap())
    );
    assert_eq!(connection.get("802-1x", "client-cert"), Some("/abs/client.pem"));
}

#[test]
fn read_profile_reports_parse_errors_with_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken");
    fs::write(&path, "[connection]\nid=broken\ntype=vpn\n").unwrap();

    let Err(KeyfileError::Parse { location, .. }) = KeyfileFormat.read_profile(&path, dir.path())
    else {
        panic!("expected a parse error");
    };
    assert_eq!(location, path.to_string_lossy());
}

#[test]
fn write_profile_escapes_name_and_sets_private_mode() {
    let dir = TempDir::new().unwrap();
    let connection = Connection::new("lab/eth0", UUID, "802-3-ethernet").unwrap();

    let path = KeyfileFormat
        .write_profile(&connection, dir.path(), None)
        .unwrap();

    assert_eq!(path, dir.path().join("lab*eth0"));
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert_eq!(KeyfileFormat.read_profile(&path, dir.path()).unwrap(), connection);
}

#[test]
fn write_profile_avoids_name_of_other_profile() {
    let dir = TempDir::new().unwrap();
    let first = Connection::new("Home", UUID, "802-11-wireless").unwrap();
    let second = Connection::new("Home", OTHER_UUID, "802-11-wireless").unwrap();

    let first_path = KeyfileFormat.write_profile(&first, dir.path(), None).unwrap();
    let second_path = KeyfileFormat.write_profile(&second, dir.path(), None).unwrap();

    assert_eq!(first_path, dir.path().join("Home"));
    assert_eq!(second_path, dir.path().join(format!("Home-{OTHER_UUID}")));
}

#[test]
fn write_profile_reuses_existing_path() {
    let dir = TempDir::new().unwrap();
    let existing = dir.path().join("old-name");
    let connection = Connection::new("New Name", UUID, "802-3-ethernet").unwrap();

    let path = KeyfileFormat
        .write_profile(&connection, dir.path(), Some(&existing))
        .unwrap();

    assert_eq!(path, existing);
    assert!(!dir.path().join(".old-name~").exists());
}

#[test]
fn delete_profile_ignores_missing_file() {
    let dir = TempDir::new().unwrap();

    assert!(KeyfileFormat.delete_profile(&dir.path().join("gone")).is_ok());
}
