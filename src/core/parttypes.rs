//! Partition type registries
//!
//! Known GPT partition type GUIDs and MBR partition type codes. The planner
//! resolves every partition's requested type against the registry of its
//! disk's scheme.

/// Known GPT partition type GUIDs
pub const GPT_TYPES: &[(&str, &str)] = &[
    ("C12A7328-F81F-11D2-BA4B-00A0C93EC93B", "EFI System"),
    ("21686148-6449-6E6F-744E-656564454649", "BIOS boot"),
    ("0FC63DAF-8483-4772-8E79-3D69D8477DE4", "Linux filesystem"),
    ("0657FD6D-A4AB-43C4-84E5-0933C84B4F4F", "Linux swap"),
    ("44479540-F297-41B2-9AF7-D131D5F0458A", "Linux root (x86)"),
    ("4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709", "Linux root (x86-64)"),
    ("69DAD710-2CE4-4E3C-B16C-21A1D49ABED3", "Linux root (ARM)"),
    ("B921B045-1DF0-41C3-AF44-4C6F280D3FAE", "Linux root (ARM-64)"),
    ("8484680C-9521-48C6-9C11-B0720656F69E", "Linux /usr (x86-64)"),
    ("4D21B016-B534-45C2-A9FB-5C16E091FD2D", "Linux /var"),
    ("7EC6F557-3BC5-4ACA-B293-16EF5DF639D1", "Linux /var/tmp"),
    ("933AC7E1-2EB4-4F13-B844-0E14E2AEF915", "Linux /home"),
    ("3B8F8425-20E0-4F3B-907F-1A25A76F98E8", "Linux /srv"),
    ("BC13C2FF-59E6-4262-A352-B275FD6F7172", "Linux extended boot"),
    ("A19D880F-05FC-4D3B-A006-743F0F84911E", "Linux RAID"),
    ("E6D6D379-F507-44C2-A23C-238F2A3DF928", "Linux LVM"),
    ("CA7D7CCB-63ED-4C53-861C-1742536059CC", "Linux LUKS"),
    ("EBD0A0A2-B9E5-4433-87C0-68B6B72699C7", "Microsoft basic data"),
    ("E3C9E316-0B5C-4DB8-817D-F92DF00215AE", "Microsoft reserved"),
];

/// Known MBR partition type codes
pub const MBR_TYPES: &[(u32, &str)] = &[
    (0x01, "FAT12"),
    (0x04, "FAT16 <32M"),
    (0x05, "Extended"),
    (0x06, "FAT16"),
    (0x07, "HPFS/NTFS/exFAT"),
    (0x0b, "W95 FAT32"),
    (0x0c, "W95 FAT32 (LBA)"),
    (0x0e, "W95 FAT16 (LBA)"),
    (0x0f, "W95 extended (LBA)"),
    (0x82, "Linux swap"),
    (0x83, "Linux"),
    (0x85, "Linux extended"),
    (0x8e, "Linux LVM"),
    (0xee, "GPT protective"),
    (0xef, "EFI (FAT-12/16/32)"),
    (0xfd, "Linux raid autodetect"),
];

/// Look up a GPT type GUID, case-insensitively, returning its canonical
/// upper-case spelling
pub fn lookup_gpt(guid: &str) -> Option<&'static str> {
    GPT_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(guid.trim()))
        .map(|(known, _)| *known)
}

/// Look up an MBR partition type code
pub fn lookup_mbr(code: u32) -> Option<u32> {
    MBR_TYPES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(known, _)| *known)
}

/// Human-readable name of a type code, for display
pub fn describe(type_code: &str) -> Option<&'static str> {
    if let Some((_, name)) = GPT_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(type_code))
    {
        return Some(name);
    }
    let code = u32::from_str_radix(type_code, 16).ok()?;
    MBR_TYPES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt_lookup_is_case_insensitive() {
        assert_eq!(
            lookup_gpt("c12a7328-f81f-11d2-ba4b-00a0c93ec93b"),
            Some("C12A7328-F81F-11D2-BA4B-00A0C93EC93B")
        );
        assert_eq!(lookup_gpt("00000000-0000-0000-0000-000000000000"), None);
    }

    #[test]
    fn test_mbr_lookup() {
        assert_eq!(lookup_mbr(0x83), Some(0x83));
        assert_eq!(lookup_mbr(0x99), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe("933AC7E1-2EB4-4F13-B844-0E14E2AEF915"),
            Some("Linux /home")
        );
        assert_eq!(describe("83"), Some("Linux"));
        assert_eq!(describe("zz"), None);
    }

    #[test]
    fn test_registries_have_no_duplicates() {
        let mut guids: Vec<_> = GPT_TYPES.iter().map(|(g, _)| *g).collect();
        guids.sort_unstable();
        guids.dedup();
        assert_eq!(guids.len(), GPT_TYPES.len());

        let mut codes: Vec<_> = MBR_TYPES.iter().map(|(c, _)| *c).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), MBR_TYPES.len());
    }
}
