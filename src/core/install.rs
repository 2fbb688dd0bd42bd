//! Package manager collaborator
//!
//! The package backend is external. Lithos only needs to search the sync
//! databases, mark packages, and apply the resulting transaction once.

use serde::Serialize;

use super::formula::{Formula, Package};
use crate::error::PackageError;

/// A package as known to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRef {
    /// Package name
    pub name: String,
    /// Version string
    pub version: String,
    /// Database the package comes from
    pub database: String,
}

/// Operations lithos needs from a package backend
pub trait PackageManager {
    /// Search every database; results may include partial name matches
    fn search_packages(&self, query: &str) -> Result<Vec<PackageRef>, PackageError>;

    /// Add a package to the pending transaction for installation
    fn mark_install(&mut self, package: &PackageRef) -> Result<(), PackageError>;

    /// Add a package to the pending transaction for removal
    fn mark_uninstall(&mut self, package: &PackageRef) -> Result<(), PackageError>;

    /// Commit the pending transaction
    fn apply_transaction(&mut self) -> Result<(), PackageError>;
}

/// Find the package whose name matches exactly
fn find_exact(
    manager: &dyn PackageManager,
    package: &Package,
) -> Result<PackageRef, PackageError> {
    manager
        .search_packages(&package.name)?
        .into_iter()
        .find(|candidate| candidate.name == package.name)
        .ok_or_else(|| PackageError::NotFound {
            name: package.name.clone(),
            category: package.category.clone(),
        })
}

/// Mark every package of a formula (and its parents) and apply once.
///
/// Nothing is applied if any package is missing.
pub fn install_formula_packages(
    manager: &mut dyn PackageManager,
    formula: &Formula,
) -> Result<Vec<PackageRef>, PackageError> {
    let packages = formula.packages();
    let resolved = packages
        .iter()
        .map(|package| find_exact(manager, package))
        .collect::<Result<Vec<_>, _>>()?;

    for package in &resolved {
        tracing::debug!("Marking {} {} for install", package.name, package.version);
        manager.mark_install(package)?;
    }
    manager.apply_transaction()?;
    tracing::info!("Installed {} package(s)", resolved.len());
    Ok(resolved)
}

/// Mark packages for removal and apply once
pub fn uninstall_packages(
    manager: &mut dyn PackageManager,
    packages: &[Package],
) -> Result<Vec<PackageRef>, PackageError> {
    let resolved = packages
        .iter()
        .map(|package| find_exact(manager, package))
        .collect::<Result<Vec<_>, _>>()?;

    for package in &resolved {
        manager.mark_uninstall(package)?;
    }
    manager.apply_transaction()?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[derive(Default)]
    struct FakeManager {
        available: Vec<&'static str>,
        installs: Vec<String>,
        removals: Vec<String>,
        transactions: usize,
    }

    impl PackageManager for FakeManager {
        fn search_packages(&self, query: &str) -> Result<Vec<PackageRef>, PackageError> {
            Ok(self
                .available
                .iter()
                .filter(|name| name.contains(query))
                .map(|name| PackageRef {
                    name: (*name).to_string(),
                    version: "1.0".to_string(),
                    database: "core".to_string(),
                })
                .collect())
        }

        fn mark_install(&mut self, package: &PackageRef) -> Result<(), PackageError> {
            self.installs.push(package.name.clone());
            Ok(())
        }

        fn mark_uninstall(&mut self, package: &PackageRef) -> Result<(), PackageError> {
            self.removals.push(package.name.clone());
            Ok(())
        }

        fn apply_transaction(&mut self) -> Result<(), PackageError> {
            self.transactions += 1;
            Ok(())
        }
    }

    fn formula(yaml: &str) -> Formula {
        Formula::from_yaml(yaml, Path::new("/nonexistent")).unwrap()
    }

    #[test]
    fn test_installs_exact_matches_in_one_transaction() {
        let mut manager = FakeManager {
            available: vec!["vim", "vim-runtime", "git"],
            ..FakeManager::default()
        };
        let resolved = install_formula_packages(
            &mut manager,
            &formula("config:\n  packages:\n    tools: [vim, git]\n"),
        )
        .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(manager.installs, vec!["vim", "git"]);
        assert_eq!(manager.transactions, 1);
    }

    #[test]
    fn test_missing_package_applies_nothing() {
        let mut manager = FakeManager {
            available: vec!["vim-runtime"],
            ..FakeManager::default()
        };
        let err = install_formula_packages(
            &mut manager,
            &formula("config:\n  packages:\n    tools: [vim]\n"),
        )
        .unwrap_err();

        assert!(matches!(err, PackageError::NotFound { ref name, ref category } if name == "vim" && category == "tools"));
        assert!(manager.installs.is_empty());
        assert_eq!(manager.transactions, 0);
    }

    #[test]
    fn test_uninstall() {
        let mut manager = FakeManager {
            available: vec!["nano"],
            ..FakeManager::default()
        };
        uninstall_packages(
            &mut manager,
            &[Package {
                name: "nano".to_string(),
                category: "editors".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(manager.removals, vec!["nano"]);
        assert_eq!(manager.transactions, 1);
    }
}
