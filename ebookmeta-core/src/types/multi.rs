//! Per-type values across a batch of resources

use super::canonical::CanonicalType;
use serde::{Deserialize, Serialize};

/// One canonical type with one value per resource, index-aligned to the
/// resource list of the batch it was read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMetadataProperty {
    canonical_type: CanonicalType,
    values: Vec<String>,
}

impl MultiMetadataProperty {
    pub fn new(canonical_type: CanonicalType, values: Vec<String>) -> Self {
        Self {
            canonical_type,
            values,
        }
    }

    /// A proposal applying the same value to every resource
    pub fn broadcast(canonical_type: CanonicalType, value: impl Into<String>) -> Self {
        Self::new(canonical_type, vec![value.into()])
    }

    pub fn canonical_type(&self) -> CanonicalType {
        self.canonical_type
    }

    pub fn name(&self) -> &'static str {
        self.canonical_type.name()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Vec<String> {
        &mut self.values
    }

    /// True when every resource carries the same value
    pub fn is_uniform(&self) -> bool {
        self.values.windows(2).all(|w| w[0] == w[1])
    }

    /// Replace every value with `value`
    pub fn set_all(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.values.iter_mut().for_each(|v| *v = value.clone());
    }

    /// Value proposed for the resource at `index`.
    ///
    /// A single value applies to every resource. Blank proposals yield `None`.
    pub fn proposed_value(&self, index: usize) -> Option<&str> {
        let value = if self.values.len() == 1 {
            self.values.first()
        } else {
            self.values.get(index)
        };
        value.map(String::as_str).filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_applies_to_all_indices() {
        let prop = MultiMetadataProperty::broadcast(CanonicalType::Title, "T");
        assert_eq!(prop.proposed_value(0), Some("T"));
        assert_eq!(prop.proposed_value(7), Some("T"));
    }

    #[test]
    fn test_indexed_proposals_skip_blank() {
        let prop = MultiMetadataProperty::new(
            CanonicalType::Title,
            vec!["A".into(), "".into(), "C".into()],
        );
        assert_eq!(prop.proposed_value(0), Some("A"));
        assert_eq!(prop.proposed_value(1), None);
        assert_eq!(prop.proposed_value(3), None);
        assert!(!prop.is_uniform());
    }

    #[test]
    fn test_set_all_makes_uniform() {
        let mut prop = MultiMetadataProperty::new(CanonicalType::Genre, vec!["a".into(), "b".into()]);
        prop.set_all("c");
        assert!(prop.is_uniform());
        assert_eq!(prop.values(), ["c", "c"]);
    }

    #[test]
    fn test_json_uses_canonical_names() {
        let prop = MultiMetadataProperty::new(CanonicalType::SeriesName, vec!["Dune".into(), "".into()]);
        let json = serde_json::to_value(&prop).unwrap();
        assert_eq!(json["canonical_type"], "seriesName");
        assert_eq!(json["values"], serde_json::json!(["Dune", ""]));
    }
}
