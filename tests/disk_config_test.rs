//! Disk configuration resolution from files

mod common;

use common::{TestProject, SAMPLE_LAYOUT};
use lithos::core::disk::{DiskLayout, Filesystem, Scheme, SubvolumeKind};
use lithos::core::layout::default_layout;
use lithos::core::planner;
use lithos::error::{ConfigError, LayoutError, ValidationError};
use proptest::prelude::*;

#[test]
fn test_load_sample_layout() {
    let project = TestProject::new();
    let path = project.create_file("disks.yaml", SAMPLE_LAYOUT);

    let layout = DiskLayout::load(&path).unwrap();
    let disks = layout.disks();
    assert_eq!(disks.len(), 2);

    assert_eq!(disks[0].name, "system-disk");
    assert!(disks[0].is_alias);
    assert_eq!(disks[0].scheme, Scheme::Gpt);

    assert_eq!(disks[1].name, "/dev/sdb");
    assert!(!disks[1].is_alias);
    assert_eq!(disks[1].scheme, Scheme::Mbr);

    let data = &disks[1].partitions[0];
    assert_eq!(data.spec().filesystem, Filesystem::Btrfs);
    assert_eq!(data.subvolumes().len(), 1);
    assert_eq!(data.subvolumes()[0].kind, SubvolumeKind::Default);

    layout.validate_for_system().unwrap();
    assert_eq!(layout.partitions_with_filesystem("btrfs").len(), 2);
    assert_eq!(layout.unresolved_aliases(), vec!["system-disk"]);
}

#[test]
fn test_load_missing_file() {
    let project = TestProject::new();
    let err = DiskLayout::load(&project.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, LayoutError::Config(ConfigError::Parse(_))));
}

#[test]
fn test_missing_root_node() {
    let err = DiskLayout::from_yaml("drives: []\n").unwrap_err();
    assert_eq!(err, LayoutError::Config(ConfigError::MissingDisksRoot));
}

#[test]
fn test_data_only_layout_is_not_a_system_layout() {
    let layout = DiskLayout::from_yaml(
        "disks:\n  - path: /dev/sdc\n    partitioning:\n      partitions:\n        data: {}\n",
    )
    .unwrap();
    assert_eq!(
        layout.validate_for_system(),
        Err(ValidationError::MissingRequiredPartition {
            name: "boot".to_string()
        })
    );
}

#[test]
fn test_default_layout_plans_three_partitions() {
    let layout = default_layout("/dev/vda", "30GiB", Some("100GiB")).unwrap();
    layout.validate_for_system().unwrap();

    let plan = planner::plan(&layout.disks()[0], 512).unwrap();
    let names: Vec<&str> = plan.partitions.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["boot", "root", "home"]);
    assert_eq!(plan.partitions[1].size_sectors, Some(30 * 1024 * 1024 * 2));
    assert_eq!(plan.partitions[2].size_sectors, Some(100 * 1024 * 1024 * 2));
}

fn layout_with_orders(orders: &[u8]) -> String {
    let mut yaml = String::from("disks:\n  - path: /dev/sda\n    partitioning:\n      partitions:\n");
    for (index, order) in orders.iter().enumerate() {
        yaml.push_str(&format!("        p{index}:\n          order: {order}\n"));
        if Some(order) != orders.iter().max() {
            yaml.push_str("          size: 1GiB\n");
        }
    }
    yaml
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Partitions are planned in ascending order no matter how they are declared
    #[test]
    fn prop_plan_follows_order(orders in Just((1u8..=8).collect::<Vec<_>>()).prop_shuffle()) {
        let layout = DiskLayout::from_yaml(&layout_with_orders(&orders)).unwrap();
        let plan = planner::plan(&layout.disks()[0], 512).unwrap();

        let planned: Vec<u8> = plan.partitions.iter().map(|p| p.order).collect();
        prop_assert_eq!(planned, (1u8..=8).collect::<Vec<_>>());
        prop_assert_eq!(plan.partitions.last().unwrap().size_sectors, None);
    }

    /// Only the highest-ordered partition may omit its size
    #[test]
    fn prop_unsized_middle_partition_fails(orders in Just((1u8..=5).collect::<Vec<_>>()).prop_shuffle(), missing in 1u8..5) {
        let mut yaml = String::from("disks:\n  - path: /dev/sda\n    partitioning:\n      partitions:\n");
        for order in &orders {
            yaml.push_str(&format!("        p{order}:\n          order: {order}\n"));
            if *order != 5 && *order != missing {
                yaml.push_str("          size: 1GiB\n");
            }
        }
        let err = DiskLayout::from_yaml(&yaml).unwrap_err();
        let is_missing_size = matches!(err, LayoutError::Validation(ValidationError::MissingSize { .. }));
        prop_assert!(is_missing_size);
    }
}
