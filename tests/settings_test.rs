//! Integration tests for the settings file

mod common;

use std::path::PathBuf;

use common::{TestProject, SAMPLE_LAYOUT};
use lithos::core::disk::DiskLayout;
use lithos::core::settings::{Settings, SettingsError};
use lithos::infra::dirs::LithosDirs;

#[test]
fn test_settings_load_from_path() {
    let project = TestProject::new();
    let path = project.create_file(
        "config.toml",
        r#"
[provision]
mount_root = "/run/lithos"
sector_size = 4096

[aliases]
system-disk = "/dev/nvme0n1"

[output]
quiet = true
"#,
    );

    let settings = Settings::load_from_path(&path).expect("Failed to load settings");

    assert_eq!(settings.provision.mount_root, Some(PathBuf::from("/run/lithos")));
    assert_eq!(settings.provision.sector_size, Some(4096));
    assert_eq!(settings.output.quiet, Some(true));
    assert_eq!(settings.output.json, None);
    assert_eq!(
        settings.aliases.get("system-disk").map(String::as_str),
        Some("/dev/nvme0n1")
    );
}

#[test]
fn test_configured_mount_root_wins() {
    let settings = Settings {
        provision: lithos::core::settings::ProvisionSettings {
            mount_root: Some(PathBuf::from("/srv/mnt")),
            sector_size: None,
        },
        ..Settings::default()
    };
    assert_eq!(settings.mount_root(&LithosDirs::new()), PathBuf::from("/srv/mnt"));

    let dirs = LithosDirs::new();
    assert_eq!(Settings::default().mount_root(&dirs), dirs.mount_root());
}

#[test]
fn test_settings_aliases_resolve_layout() {
    let project = TestProject::new();
    let path = project.create_file("config.toml", "[aliases]\nsystem-disk = \"/dev/sda\"\n");
    let settings = Settings::load_from_path(&path).unwrap();

    let mut layout = DiskLayout::from_yaml(SAMPLE_LAYOUT).unwrap();
    layout.apply_aliases(&settings.merged_aliases(&[]));
    assert!(layout.unresolved_aliases().is_empty());
    assert_eq!(layout.disks()[0].name, "/dev/sda");

    // Command-line mappings override the file
    let mut layout = DiskLayout::from_yaml(SAMPLE_LAYOUT).unwrap();
    layout.apply_aliases(
        &settings.merged_aliases(&[("system-disk".to_string(), "/dev/vdb".to_string())]),
    );
    assert_eq!(layout.disks()[0].name, "/dev/vdb");
}

#[test]
fn test_malformed_settings_name_the_file() {
    let project = TestProject::new();
    let path = project.create_file("config.toml", "[aliases\n");

    let err = Settings::load_from_path(&path).unwrap_err();
    assert!(matches!(err, SettingsError::ParseError { .. }));
    assert!(err.to_string().contains("config.toml"));
}
