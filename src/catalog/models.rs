// Catalog API payloads the proxy decodes

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// Response of `GET /api/catalog/entity-facets`
///
/// `null` anywhere in the payload reads as the empty or zero value.
#[derive(Debug, Deserialize, Default)]
pub struct Facets {
    #[serde(default, deserialize_with = "null_as_default")]
    pub facets: HashMap<String, Option<Vec<FacetValue>>>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FacetValue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Facets {
    /// Values of one facet in upstream order; empty when the facet is unknown
    pub fn values(&self, facet: &str) -> Vec<&str> {
        self.facets
            .get(facet)
            .and_then(Option::as_ref)
            .map(|values| values.iter().map(|v| v.value.as_str()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_preserve_order_and_ignore_count() {
        let facets: Facets = serde_json::from_str(
            r#"{"facets":{"kind":[{"value":"Component","count":5},{"value":"API","count":2},{"value":"System","count":9}]}}"#,
        )
        .unwrap();
        assert_eq!(facets.values("kind"), vec!["Component", "API", "System"]);
    }

    #[test]
    fn test_unknown_facet_is_empty() {
        let facets: Facets =
            serde_json::from_str(r#"{"facets":{"kind":[{"value":"API","count":1}]}}"#).unwrap();
        assert!(facets.values("spec.owner").is_empty());
        assert!(facets.values("").is_empty());
    }

    #[test]
    fn test_missing_facets_key() {
        let facets: Facets = serde_json::from_str("{}").unwrap();
        assert!(facets.values("kind").is_empty());
    }

    #[test]
    fn test_null_fields_read_as_empty() {
        let facets: Facets = serde_json::from_str(r#"{"facets":null}"#).unwrap();
        assert!(facets.values("kind").is_empty());

        let facets: Facets = serde_json::from_str(r#"{"facets":{"kind":null}}"#).unwrap();
        assert!(facets.values("kind").is_empty());

        let facets: Facets = serde_json::from_str(
            r#"{"facets":{"kind":[{"value":null,"count":null},{"value":"API","count":3}]}}"#,
        )
        .unwrap();
        assert_eq!(facets.values("kind"), vec!["", "API"]);
        let kinds = facets.facets["kind"].as_ref().unwrap();
        assert_eq!(kinds[0].count, 0);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(serde_json::from_str::<Facets>(r#"{"facets":["kind"]}"#).is_err());
        assert!(serde_json::from_str::<Facets>("not json").is_err());
    }
}
