//! Generic configuration tree
//!
//! A thin, read-only view over a parsed YAML document that offers child
//! lookup, key presence checks and scalar coercion. Resolvers work against
//! this view rather than against the YAML crate directly.

use serde_yaml::Value;

/// Borrowed node in a configuration tree
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    value: &'a Value,
}

impl<'a> Node<'a> {
    /// Wrap a YAML value
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Look up a child of a mapping by key
    pub fn get(&self, key: &str) -> Option<Node<'a>> {
        self.value
            .as_mapping()
            .and_then(|m| m.get(key))
            .filter(|v| !v.is_null())
            .map(Node::new)
    }

    /// Whether a mapping key is present with a non-null value
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries in a mapping or sequence; scalars count as zero
    pub fn len(&self) -> usize {
        match self.value {
            Value::Mapping(m) => m.len(),
            Value::Sequence(s) => s.len(),
            _ => 0,
        }
    }

    /// Whether the node holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the node is a mapping
    pub fn is_mapping(&self) -> bool {
        self.value.is_mapping()
    }

    /// Whether the node is a sequence
    pub fn is_sequence(&self) -> bool {
        self.value.is_sequence()
    }

    /// Items of a sequence, in document order
    pub fn items(&self) -> Vec<Node<'a>> {
        self.value
            .as_sequence()
            .map(|s| s.iter().map(Node::new).collect())
            .unwrap_or_default()
    }

    /// Entries of a mapping with scalar keys, in document order
    pub fn entries(&self) -> Vec<(String, Node<'a>)> {
        self.value
            .as_mapping()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| scalar_to_string(k).map(|key| (key, Node::new(v))))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Coerce a scalar to a string; numbers and booleans are rendered
    pub fn as_string(&self) -> Option<String> {
        scalar_to_string(self.value)
    }

    /// Coerce a scalar to an unsigned integer.
    ///
    /// Strings holding decimal or `0x`-prefixed hexadecimal digits are accepted.
    pub fn as_u64(&self) -> Option<u64> {
        match self.value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => parse_u64(s),
            _ => None,
        }
    }

    /// Coerce a scalar to a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Sequence items coerced to strings; a lone scalar becomes a one-item list
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self.value {
            Value::Sequence(s) => s.iter().map(scalar_to_string).collect(),
            other => scalar_to_string(other).map(|s| vec![s]),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_u64(text: &str) -> Option<u64> {
    let text = text.trim();
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_child_lookup_and_presence() {
        let doc = parse("a:\n  b: 1\nc: ~\n");
        let root = Node::new(&doc);
        assert!(root.has("a"));
        assert!(!root.has("c"), "null values count as absent");
        assert!(!root.has("missing"));
        assert_eq!(root.get("a").and_then(|a| a.get("b")).and_then(|b| b.as_u64()), Some(1));
    }

    #[test]
    fn test_entries_preserve_document_order() {
        let doc = parse("zeta: 1\nalpha: 2\nmid: 3\n");
        let keys: Vec<String> = Node::new(&doc).entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_scalar_coercion() {
        let doc = parse("n: 42\ns: \"0x83\"\nh: 0x83\nb: yes\nf: 1.5\n");
        let root = Node::new(&doc);
        assert_eq!(root.get("n").unwrap().as_string().as_deref(), Some("42"));
        assert_eq!(root.get("s").unwrap().as_u64(), Some(0x83));
        assert_eq!(root.get("h").unwrap().as_u64(), Some(0x83));
        assert_eq!(root.get("b").unwrap().as_bool(), Some(true));
        assert_eq!(root.get("f").unwrap().as_string().as_deref(), Some("1.5"));
        assert_eq!(root.get("f").unwrap().as_u64(), None);
    }

    #[test]
    fn test_string_list() {
        let doc = parse("list: [a, b]\nsingle: c\n");
        let root = Node::new(&doc);
        assert_eq!(
            root.get("list").unwrap().as_string_list(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            root.get("single").unwrap().as_string_list(),
            Some(vec!["c".to_string()])
        );
    }
}
