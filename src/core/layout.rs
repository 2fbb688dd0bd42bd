//! Built-in disk layout
//!
//! The layout used when provisioning a single device without a disk
//! configuration file: an EFI system partition, the btrfs root, and a home
//! partition that fills whatever space is left unless sized.

use serde_yaml::{Mapping, Value};

use super::disk::DiskLayout;
use super::node::Node;
use crate::config::defaults::{DEFAULT_BOOT_SIZE, EFI_SYSTEM_GUID, LINUX_HOME_GUID};
use crate::error::LayoutError;

fn mapping<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Mapping(
        entries
            .into_iter()
            .map(|(key, value)| (Value::from(key), value))
            .collect::<Mapping>(),
    )
}

/// Default GPT layout for `device`.
///
/// `root_size` is required; without `home_size` the home partition takes the
/// rest of the disk.
pub fn default_layout(
    device: &str,
    root_size: &str,
    home_size: Option<&str>,
) -> Result<DiskLayout, LayoutError> {
    let boot = mapping([
        ("label", "BOOT".into()),
        ("filesystem", "vfat".into()),
        ("guid", EFI_SYSTEM_GUID.into()),
        ("size", DEFAULT_BOOT_SIZE.into()),
        ("mountpoint", "/boot/efi".into()),
        ("order", 1.into()),
    ]);
    let root = mapping([("size", root_size.into()), ("order", 2.into())]);
    let mut home = mapping([
        ("label", "HOME".into()),
        ("guid", LINUX_HOME_GUID.into()),
        ("mountpoint", "/home".into()),
        ("order", 3.into()),
    ]);
    if let (Some(size), Value::Mapping(props)) = (home_size, &mut home) {
        props.insert("size".into(), size.into());
    }

    let document = mapping([(
        "disks",
        Value::Sequence(vec![mapping([
            ("path", device.into()),
            (
                "partitioning",
                mapping([
                    ("scheme", "gpt".into()),
                    (
                        "partitions",
                        mapping([("boot", boot), ("root", root), ("home", home)]),
                    ),
                ]),
            ),
        ])]),
    )]);

    DiskLayout::resolve(Node::new(&document))
}
