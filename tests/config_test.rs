mod helpers;

use std::fs;

use camino::Utf8PathBuf;
use virtstage::config::{MethodConfig, load_profile};
use virtstage::guest::DiskRole;
use virtstage::installer::{InstallMethod, Location};

use helpers::utf8_path;

fn write_profile(contents: &str) -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = utf8_path(temp.path()).join("profile.yaml");
    fs::write(&path, contents).expect("write profile");
    (temp, path)
}

#[test]
fn test_load_pxe_profile() {
    let (_temp, path) = write_profile(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: web01
  devices:
    - path: /var/lib/images/web01.qcow2
      role: disk
install:
  method: pxe
  location: http://mirror.example.com/fedora/releases/40/Server/x86_64/os/
  kernel: /var/tmp/virtstage/vmlinuz
  initrd: /var/tmp/virtstage/initrd.img
  extra_args: console=ttyS0
  initrd_inject:
    - path: /etc/ks/web01.cfg
      name: ks.cfg
"#,
    );

    let profile = load_profile(&path).expect("profile should load");
    assert_eq!(profile.scratch_dir, Utf8PathBuf::from("/var/tmp/virtstage"));
    assert_eq!(profile.guest.name, "web01");
    assert_eq!(profile.guest.devices.len(), 1);
    assert_eq!(profile.guest.devices[0].role, DiskRole::Disk);
    assert_eq!(profile.guest.devices[0].boot_index, None);

    assert!(matches!(profile.install.method, MethodConfig::Pxe { .. }));
    assert!(!profile.install.cdrom);
    assert_eq!(profile.install.extra_args.as_deref(), Some("console=ttyS0"));
    assert_eq!(profile.install.initrd_inject.len(), 1);
    assert_eq!(profile.install.initrd_inject[0].name.as_deref(), Some("ks.cfg"));

    let installer = profile.install.to_installer().expect("installer should build");
    assert!(matches!(installer.method(), InstallMethod::Pxe { .. }));
    assert!(matches!(installer.location(), Some(Location::Url(_))));
    assert!(installer.has_install_phase());
}

#[test]
fn test_load_import_profile_with_defaults() {
    let (_temp, path) = write_profile(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: imported
  devices:
    - path: /var/lib/images/old-appliance.img
install:
  method: import
"#,
    );

    let profile = load_profile(&path).expect("profile should load");
    assert_eq!(profile.install.method, MethodConfig::Import);
    assert!(profile.install.initrd_inject.is_empty());
    assert_eq!(profile.install.extra_args, None);
    // Role defaults to plain disk.
    assert_eq!(profile.guest.devices[0].role, DiskRole::Disk);
    profile.validate().expect("import profile should validate");
}

#[test]
fn test_livecd_profile_validates_media_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let media = utf8_path(temp.path()).join("live.iso");
    fs::write(&media, b"iso").expect("write media");

    let (_profile_temp, path) = write_profile(&format!(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: kiosk
  devices: []
install:
  method: livecd
  location: {}
"#,
        media
    ));

    let profile = load_profile(&path).expect("profile should load");
    profile.validate().expect("livecd profile should validate");
    let installer = profile.install.to_installer().expect("installer should build");
    assert_eq!(installer.location().map(|l| l.to_string()), Some(media.to_string()));
}

#[test]
fn test_pxe_profile_requires_location() {
    let (_temp, path) = write_profile(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: web01
  devices: []
install:
  method: pxe
"#,
    );

    let profile = load_profile(&path).expect("profile should load");
    let result = profile.validate();
    assert!(result.is_err());
    let err_msg = result.unwrap_err().to_string();
    assert!(
        err_msg.contains("requires a location"),
        "Expected 'requires a location', got: {}",
        err_msg
    );
}

#[test]
fn test_import_profile_rejects_location() {
    let (_temp, path) = write_profile(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: imported
  devices: []
install:
  method: import
  location: /var/lib/images/old.img
"#,
    );

    let profile = load_profile(&path).expect("profile should load");
    let result = profile.validate();
    assert!(result.is_err());
    let err_msg = result.unwrap_err().to_string();
    assert!(
        err_msg.contains("does not take an install location"),
        "Expected 'does not take an install location', got: {}",
        err_msg
    );
}

#[test]
fn test_unknown_method_fails_to_parse() {
    let (_temp, path) = write_profile(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: web01
  devices: []
install:
  method: teleport
"#,
    );

    let result = load_profile(&path);
    assert!(result.is_err());
    let err_msg = format!("{:#}", result.unwrap_err());
    assert!(err_msg.contains("failed to parse yaml"), "Expected parse failure, got: {}", err_msg);
}

#[test]
fn test_empty_guest_name_fails_validation() {
    let (_temp, path) = write_profile(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: ""
  devices: []
install:
  method: container
"#,
    );

    let profile = load_profile(&path).expect("profile should load");
    let result = profile.validate();
    assert!(result.is_err());
    let err_msg = result.unwrap_err().to_string();
    assert!(
        err_msg.contains("guest name must not be empty"),
        "Expected 'guest name must not be empty', got: {}",
        err_msg
    );
}

#[test]
fn test_device_boot_index_parses() {
    let (_temp, path) = write_profile(
        r#"
scratch_dir: /var/tmp/virtstage
guest:
  name: web01
  devices:
    - path: /var/lib/images/a.qcow2
      role: disk
      boot_index: 2
    - path: /isos/tools.iso
      role: cdrom
install:
  method: import
"#,
    );

    let profile = load_profile(&path).expect("profile should load");
    assert_eq!(profile.guest.devices[0].boot_index, Some(2));
    assert_eq!(profile.guest.devices[1].role, DiskRole::Cdrom);
    assert_eq!(profile.guest.devices[1].boot_index, None);
}

#[test]
fn test_missing_profile_file_reports_path() {
    let result = load_profile(camino::Utf8Path::new("/nonexistent/profile.yaml"));
    assert!(result.is_err());
    let err_msg = format!("{:#}", result.unwrap_err());
    assert!(
        err_msg.contains("/nonexistent/profile.yaml"),
        "Expected path in error, got: {}",
        err_msg
    );
}
