//! Formula resolution
//!
//! A formula is an inheritable, declarative description of what to install
//! on a system: packages, services, managed files and an optional `system`
//! block (hostname, locale, users...). Formulas name their parents in
//! `inherits`; parents are loaded recursively relative to the inheriting
//! file's directory.
//!
//! ```yaml
//! inherits:
//!   - base
//! config:
//!   packages:
//!     desktop: [sway, foot]
//!   services:
//!     network: [iwd]
//! ```
//!
//! Accessors merge local entries first, then each parent's (recursively).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::Value;

use super::node::Node;
use crate::config::defaults::{
    DEFAULT_HOSTNAME, DEFAULT_KEYMAP, DEFAULT_LOCALE, DEFAULT_SHELL, DEFAULT_TIMEZONE,
};
use crate::error::FormulaError;

/// A package to install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Package name
    pub name: String,
    /// Category the package was listed under
    pub category: String,
}

/// A service to enable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    /// Unit name
    pub name: String,
    /// Category the service was listed under
    pub category: String,
}

/// Where inserted contents go relative to an anchor line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertAnchor {
    /// Insert after the anchor
    After(String),
    /// Insert before the anchor
    Before(String),
}

/// How a managed file is written, with its mode-specific options
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FileMode {
    /// Replace occurrences of `what` with the contents
    Replace { what: String },
    /// Create the file
    Create {
        replace_existing: bool,
        permissions: String,
    },
    /// Insert the contents next to an anchor
    Insert { anchor: InsertAnchor },
}

/// A file managed by a formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Target path on the installed system
    pub path: PathBuf,
    /// Contents to write
    pub contents: String,
    /// Write mode and options
    #[serde(flatten)]
    pub mode: FileMode,
}

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
    pub fullname: String,
    pub groups: Vec<String>,
    pub shell: String,
}

/// System-wide settings; at most one per inheritance closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct System {
    pub hostname: String,
    pub timezone: String,
    pub locale: String,
    pub keymap: String,
    pub users: Vec<User>,
}

/// A resolved formula and its resolved parents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    source: Option<PathBuf>,
    inherits: Vec<Formula>,
    packages: Option<Vec<Package>>,
    services: Option<Vec<Service>>,
    files: Option<Vec<FileEntry>>,
    system: Option<System>,
}

impl Formula {
    /// Load a formula file, resolving inheritance relative to its directory
    pub fn load(path: &Path) -> Result<Self, FormulaError> {
        let mut stack = Vec::new();
        load_file(path, &mut stack)
    }

    /// Resolve a formula from a YAML document.
    ///
    /// Inherited formulas are looked up under `base_path`, or the current
    /// directory when `base_path` is empty.
    pub fn from_yaml(content: &str, base_path: &Path) -> Result<Self, FormulaError> {
        let document: Value = serde_yaml::from_str(content).map_err(|e| FormulaError::Parse {
            origin: "<inline>".to_string(),
            error: e.to_string(),
        })?;
        Self::resolve(Node::new(&document), base_path)
    }

    /// Resolve a formula from a configuration tree
    pub fn resolve(root: Node<'_>, base_path: &Path) -> Result<Self, FormulaError> {
        let mut stack = Vec::new();
        resolve_node(root, "<inline>", None, base_path, &mut stack)
    }

    /// File the formula was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Directly inherited formulas
    pub fn inherits(&self) -> &[Formula] {
        &self.inherits
    }

    /// Packages of this formula followed by those of every parent
    pub fn packages(&self) -> Vec<Package> {
        self.collect(|f| f.packages.as_deref())
    }

    /// Services of this formula followed by those of every parent
    pub fn services(&self) -> Vec<Service> {
        self.collect(|f| f.services.as_deref())
    }

    /// Files of this formula followed by those of every parent
    pub fn files(&self) -> Vec<FileEntry> {
        self.collect(|f| f.files.as_deref())
    }

    /// The single `system` block visible across the inheritance closure.
    ///
    /// A formula reached through several inheritance paths is counted once.
    pub fn system_config(&self) -> Result<Option<System>, FormulaError> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        self.collect_systems(&mut seen, &mut found);

        match found.as_slice() {
            [] => Ok(None),
            [system] => Ok(Some((*system).clone())),
            many => Err(FormulaError::AmbiguousSystemConfig { count: many.len() }),
        }
    }

    fn collect<T: Clone>(&self, local: impl Fn(&Formula) -> Option<&[T]> + Copy) -> Vec<T> {
        let mut items: Vec<T> = local(self).map(<[T]>::to_vec).unwrap_or_default();
        for parent in &self.inherits {
            items.extend(parent.collect(local));
        }
        items
    }

    fn collect_systems<'a>(&'a self, seen: &mut HashSet<&'a Path>, found: &mut Vec<&'a System>) {
        if let Some(source) = self.source.as_deref() {
            if !seen.insert(source) {
                return;
            }
        }
        if let Some(system) = &self.system {
            found.push(system);
        }
        for parent in &self.inherits {
            parent.collect_systems(seen, found);
        }
    }
}

fn load_file(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Formula, FormulaError> {
    let canonical = path.canonicalize().map_err(|e| FormulaError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    if let Some(position) = stack.iter().position(|p| *p == canonical) {
        let mut cycle = stack[position..].to_vec();
        cycle.push(canonical);
        return Err(FormulaError::CyclicInheritance { cycle });
    }

    let content = std::fs::read_to_string(&canonical).map_err(|e| FormulaError::Io {
        path: canonical.clone(),
        error: e.to_string(),
    })?;
    let origin = canonical.display().to_string();
    let document: Value = serde_yaml::from_str(&content).map_err(|e| FormulaError::Parse {
        origin: origin.clone(),
        error: e.to_string(),
    })?;

    tracing::debug!("Loading formula {}", origin);

    let base = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    stack.push(canonical.clone());
    let result = resolve_node(
        Node::new(&document),
        &origin,
        Some(canonical),
        &base,
        stack,
    );
    stack.pop();
    result
}

fn resolve_node(
    root: Node<'_>,
    origin: &str,
    source: Option<PathBuf>,
    base_path: &Path,
    stack: &mut Vec<PathBuf>,
) -> Result<Formula, FormulaError> {
    let format_error = |message: String| FormulaError::Format {
        origin: origin.to_string(),
        message,
    };

    let mut inherits = Vec::new();
    if let Some(list) = root.get("inherits") {
        let names = list
            .as_string_list()
            .ok_or_else(|| format_error("\"inherits\" must be a list of formula names".into()))?;
        for name in names {
            let path = locate_formula(&name, base_path)?;
            inherits.push(load_file(&path, stack)?);
        }
    }

    let config = root
        .get("config")
        .ok_or_else(|| format_error("no \"config\" section".into()))?;

    let system = config
        .get("system")
        .map(|node| resolve_system(node, &format_error))
        .transpose()?;

    let packages = config
        .get("packages")
        .map(|node| {
            resolve_categorised(node, "packages", &format_error).map(|entries| {
                entries
                    .into_iter()
                    .map(|(category, name)| Package { name, category })
                    .collect()
            })
        })
        .transpose()?;

    let services = config
        .get("services")
        .map(|node| {
            resolve_categorised(node, "services", &format_error).map(|entries| {
                entries
                    .into_iter()
                    .map(|(category, name)| Service { name, category })
                    .collect()
            })
        })
        .transpose()?;

    let files = config
        .get("files")
        .map(|node| resolve_files(node, &format_error))
        .transpose()?;

    Ok(Formula {
        source,
        inherits,
        packages,
        services,
        files,
        system,
    })
}

/// Find the file an `inherits` entry refers to
fn locate_formula(name: &str, base_path: &Path) -> Result<PathBuf, FormulaError> {
    let base = if base_path.as_os_str().is_empty() {
        std::env::current_dir().map_err(|e| FormulaError::Io {
            path: PathBuf::from("."),
            error: e.to_string(),
        })?
    } else {
        base_path.to_path_buf()
    };

    let candidates = if name.ends_with(".yaml") || name.ends_with(".yml") {
        vec![base.join(name)]
    } else {
        vec![base.join(format!("{name}.yaml")), base.join(format!("{name}.yml"))]
    };

    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .cloned()
        .ok_or_else(|| FormulaError::NotFound {
            name: name.to_string(),
            candidates,
        })
}

fn string_or(node: Node<'_>, key: &str, default: &str) -> String {
    node.get(key)
        .and_then(|n| n.as_string())
        .unwrap_or_else(|| default.to_string())
}

fn resolve_system(
    node: Node<'_>,
    format_error: &impl Fn(String) -> FormulaError,
) -> Result<System, FormulaError> {
    let mut users = Vec::new();
    if let Some(users_node) = node.get("users") {
        if !users_node.is_mapping() {
            return Err(format_error(
                "\"system.users\" must map usernames to user settings".into(),
            ));
        }
        for (username, props) in users_node.entries() {
            let groups = match props.get("groups") {
                Some(groups) => groups.as_string_list().ok_or_else(|| {
                    format_error(format!("groups of user '{username}' must be a list"))
                })?,
                None => Vec::new(),
            };
            users.push(User {
                fullname: string_or(props, "fullname", ""),
                shell: string_or(props, "shell", DEFAULT_SHELL),
                groups,
                username,
            });
        }
    }

    Ok(System {
        hostname: string_or(node, "hostname", DEFAULT_HOSTNAME),
        timezone: string_or(node, "timezone", DEFAULT_TIMEZONE),
        locale: string_or(node, "locale", DEFAULT_LOCALE),
        keymap: string_or(node, "keymap", DEFAULT_KEYMAP),
        users,
    })
}

/// `category: [name, ...]` mappings, flattened to `(category, name)` pairs
fn resolve_categorised(
    node: Node<'_>,
    section: &str,
    format_error: &impl Fn(String) -> FormulaError,
) -> Result<Vec<(String, String)>, FormulaError> {
    if !node.is_mapping() {
        return Err(format_error(format!(
            "\"{section}\" must map categories to lists"
        )));
    }

    let mut entries = Vec::new();
    for (category, list) in node.entries() {
        let names = list.as_string_list().ok_or_else(|| {
            format_error(format!("{section} category '{category}' must be a list of names"))
        })?;
        entries.extend(names.into_iter().map(|name| (category.clone(), name)));
    }
    Ok(entries)
}

fn resolve_files(
    node: Node<'_>,
    format_error: &impl Fn(String) -> FormulaError,
) -> Result<Vec<FileEntry>, FormulaError> {
    if !node.is_mapping() {
        return Err(format_error(
            "\"files\" must map paths to file settings".into(),
        ));
    }

    let mut files = Vec::new();
    for (path, props) in node.entries() {
        let field = |key: &str| props.get(key).and_then(|n| n.as_string());
        let require = |key: &str| {
            field(key).ok_or_else(|| format_error(format!("file '{path}' requires \"{key}\"")))
        };

        let contents = require("contents")?;
        let mode_name = require("mode")?;

        let mode = match mode_name.to_ascii_lowercase().as_str() {
            "replace" => FileMode::Replace {
                what: require("replace")?,
            },
            "insert" => match (field("after"), field("before")) {
                (Some(after), None) => FileMode::Insert {
                    anchor: InsertAnchor::After(after),
                },
                (None, Some(before)) => FileMode::Insert {
                    anchor: InsertAnchor::Before(before),
                },
                _ => {
                    return Err(format_error(format!(
                        "file '{path}' in insert mode requires either \"after\" or \"before\", not both"
                    )))
                }
            },
            "create" => FileMode::Create {
                replace_existing: match props.get("replace") {
                    Some(flag) => flag.as_bool().ok_or_else(|| {
                        format_error(format!("\"replace\" of file '{path}' must be true or false"))
                    })?,
                    None => false,
                },
                permissions: require("permissions")?,
            },
            other => {
                return Err(format_error(format!(
                    "file '{path}' has no such mode '{other}'"
                )))
            }
        };

        files.push(FileEntry {
            path: PathBuf::from(path),
            contents,
            mode,
        });
    }
    Ok(files)
}
