//! Nested analyzer output and safe path lookup.
//!
//! Analyzers emit loosely shaped trees: a metric may be absent, explicitly
//! undefined, or NaN (e.g. a ratio over zero trades). [`AnalysisNode`] models
//! that shape with an explicit `Missing` variant, and [`safe_get`] resolves a
//! key path through it, falling back to a caller-supplied default instead of
//! failing on absent keys, unexpected leaves or NaN.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum AnalysisNode {
    #[default]
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Map(BTreeMap<String, AnalysisNode>),
}

impl AnalysisNode {
    pub fn map() -> Self {
        AnalysisNode::Map(BTreeMap::new())
    }

    /// Builder-style insert. Has no effect on a non-map node.
    pub fn with(mut self, key: &str, value: impl Into<AnalysisNode>) -> Self {
        if let AnalysisNode::Map(ref mut map) = self {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&AnalysisNode> {
        match self {
            AnalysisNode::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<f64> for AnalysisNode {
    fn from(v: f64) -> Self {
        AnalysisNode::Float(v)
    }
}

impl From<i64> for AnalysisNode {
    fn from(v: i64) -> Self {
        AnalysisNode::Int(v)
    }
}

impl From<usize> for AnalysisNode {
    fn from(v: usize) -> Self {
        AnalysisNode::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<bool> for AnalysisNode {
    fn from(v: bool) -> Self {
        AnalysisNode::Bool(v)
    }
}

impl From<&str> for AnalysisNode {
    fn from(v: &str) -> Self {
        AnalysisNode::Text(v.to_string())
    }
}

impl From<String> for AnalysisNode {
    fn from(v: String) -> Self {
        AnalysisNode::Text(v)
    }
}

impl<T: Into<AnalysisNode>> From<Option<T>> for AnalysisNode {
    fn from(v: Option<T>) -> Self {
        v.map_or(AnalysisNode::Missing, Into::into)
    }
}

impl From<BTreeMap<String, AnalysisNode>> for AnalysisNode {
    fn from(v: BTreeMap<String, AnalysisNode>) -> Self {
        AnalysisNode::Map(v)
    }
}

/// Analyzer outputs keyed by analyzer name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Analyses(BTreeMap<String, AnalysisNode>);

impl Analyses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, node: AnalysisNode) {
        self.0.insert(name.to_string(), node);
    }

    /// `None` when no analyzer of that name ran.
    pub fn get(&self, name: &str) -> Option<&AnalysisNode> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single key or an ordered sequence of keys.
pub trait KeyPath {
    fn steps(&self) -> &[&str];
}

impl KeyPath for &str {
    fn steps(&self) -> &[&str] {
        std::slice::from_ref(self)
    }
}

impl<const N: usize> KeyPath for [&str; N] {
    fn steps(&self) -> &[&str] {
        self
    }
}

impl KeyPath for &[&str] {
    fn steps(&self) -> &[&str] {
        self
    }
}

impl KeyPath for Vec<&str> {
    fn steps(&self) -> &[&str] {
        self
    }
}

/// Conversion from a resolved node into the caller's type. `None` means the
/// node does not hold that kind of value.
pub trait Extract: Sized {
    fn extract(node: &AnalysisNode) -> Option<Self>;
}

impl Extract for f64 {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        match *node {
            AnalysisNode::Float(v) if !v.is_nan() => Some(v),
            AnalysisNode::Int(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl Extract for i64 {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        match *node {
            AnalysisNode::Int(v) => Some(v),
            AnalysisNode::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }
}

impl Extract for u64 {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        i64::extract(node).and_then(|v| u64::try_from(v).ok())
    }
}

impl Extract for bool {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        match *node {
            AnalysisNode::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl Extract for String {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        match node {
            AnalysisNode::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl Extract for AnalysisNode {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        Some(node.clone())
    }
}

/// Numeric entries of a map node; entries without a usable number are
/// skipped.
impl Extract for BTreeMap<String, f64> {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        match node {
            AnalysisNode::Map(map) => Some(
                map.iter()
                    .filter_map(|(k, v)| f64::extract(v).map(|v| (k.clone(), v)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl<T: Extract> Extract for Option<T> {
    fn extract(node: &AnalysisNode) -> Option<Self> {
        T::extract(node).map(Some)
    }
}

/// Resolve `path` in `report`, returning `default` when the report is absent,
/// any step is missing or lands on a non-map value, the leaf is `Missing` or
/// NaN, or the leaf does not convert to `T`.
pub fn safe_get<T: Extract, P: KeyPath>(report: Option<&AnalysisNode>, path: P, default: T) -> T {
    let Some(mut current) = report else {
        return default;
    };
    for key in path.steps() {
        current = match current {
            AnalysisNode::Map(map) => match map.get(*key) {
                Some(next) => next,
                None => return default,
            },
            _ => return default,
        };
    }
    match current {
        AnalysisNode::Missing => default,
        AnalysisNode::Float(v) if v.is_nan() => default,
        node => T::extract(node).unwrap_or(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trades() -> AnalysisNode {
        AnalysisNode::map()
            .with(
                "total",
                AnalysisNode::map().with("total", 3i64).with("closed", 2i64),
            )
            .with(
                "pnl",
                AnalysisNode::map().with("net", AnalysisNode::map().with("total", 125.5)),
            )
            .with("sqn", f64::NAN)
            .with("note", "ok")
            .with("undefined", AnalysisNode::Missing)
    }

    #[test]
    fn none_report_returns_default() {
        assert_eq!(safe_get(None, ["a", "b"], 7i64), 7);
        assert_eq!(safe_get(None, "a", None::<f64>), None);
    }

    #[test]
    fn single_key_and_nested_path() {
        let report = trades();
        assert_eq!(safe_get(Some(&report), "note", String::new()), "ok");
        assert_eq!(safe_get(Some(&report), ["total", "closed"], 0i64), 2);
        assert_eq!(safe_get(Some(&report), ["pnl", "net", "total"], 0.0), 125.5);
    }

    #[test]
    fn missing_intermediate_key_returns_default() {
        let report = trades();
        assert_eq!(safe_get(Some(&report), ["won", "pnl", "total"], 0.0), 0.0);
        assert_eq!(safe_get(Some(&report), ["total", "open"], -1i64), -1);
    }

    #[test]
    fn nan_leaf_returns_default() {
        let report = trades();
        assert_eq!(safe_get(Some(&report), "sqn", 0.0), 0.0);
        assert_eq!(safe_get(Some(&report), "sqn", None::<f64>), None);

        let nested = AnalysisNode::map().with("a", AnalysisNode::map().with("b", f64::NAN));
        assert_eq!(safe_get(Some(&nested), ["a", "b"], 0i64), 0);
    }

    #[test]
    fn missing_leaf_returns_default() {
        let report = trades();
        assert_eq!(safe_get(Some(&report), "undefined", 4.0), 4.0);
    }

    #[test]
    fn stepping_through_a_leaf_returns_default() {
        let report = trades();
        assert_eq!(safe_get(Some(&report), ["note", "deeper"], 1.5), 1.5);
        assert_eq!(safe_get(Some(&report), ["total", "total", "x"], 0i64), 0);
    }

    #[test]
    fn wrong_leaf_type_returns_default() {
        let report = trades();
        assert_eq!(safe_get(Some(&report), "note", 9.0), 9.0);
        assert!(!safe_get(Some(&report), ["total", "total"], false));
    }

    #[test]
    fn empty_path_resolves_report_itself() {
        let report = AnalysisNode::Float(2.5);
        let empty: &[&str] = &[];
        assert_eq!(safe_get(Some(&report), empty, 0.0), 2.5);
    }

    #[test]
    fn optional_default_wraps_value() {
        let report = trades();
        assert_eq!(
            safe_get(Some(&report), ["pnl", "net", "total"], None::<f64>),
            Some(125.5)
        );
    }

    #[test]
    fn int_and_float_convert() {
        let node = AnalysisNode::map().with("i", 4i64).with("f", 3.0).with("g", 3.5);
        assert_eq!(safe_get(Some(&node), "i", 0.0), 4.0);
        assert_eq!(safe_get(Some(&node), "f", 0i64), 3);
        assert_eq!(safe_get(Some(&node), "g", 0i64), 0);
        assert_eq!(safe_get(Some(&node), "i", 0u64), 4);
    }

    #[test]
    fn map_of_numbers() {
        let node = AnalysisNode::map().with(
            "years",
            AnalysisNode::map()
                .with("2023", 0.12)
                .with("2024", -0.05)
                .with("2025", f64::NAN),
        );
        let years: BTreeMap<String, f64> = safe_get(Some(&node), "years", BTreeMap::new());
        assert_eq!(years.len(), 2);
        assert_eq!(years["2023"], 0.12);
    }

    #[test]
    fn vec_path() {
        let report = trades();
        let path = vec!["total", "total"];
        assert_eq!(safe_get(Some(&report), path, 0u64), 3);
    }

    #[test]
    fn analyses_lookup() {
        let mut analyses = Analyses::new();
        analyses.insert("trades", trades());
        assert_eq!(analyses.len(), 1);
        assert!(analyses.get("sharpe").is_none());
        assert_eq!(
            safe_get(analyses.get("trades"), ["total", "closed"], 0i64),
            2
        );
        assert_eq!(analyses.names().collect::<Vec<_>>(), vec!["trades"]);
    }

    #[test]
    fn serializes_missing_and_nan_as_null() {
        let node = AnalysisNode::map()
            .with("a", AnalysisNode::Missing)
            .with("b", f64::NAN)
            .with("c", 1i64);
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"a":null,"b":null,"c":1}"#);
    }

    #[test]
    fn with_on_leaf_is_noop() {
        let node = AnalysisNode::Int(1).with("a", 2i64);
        assert_eq!(node, AnalysisNode::Int(1));
        assert!(node.get("a").is_none());
        assert!(AnalysisNode::Missing.get("a").is_none());
    }
}
