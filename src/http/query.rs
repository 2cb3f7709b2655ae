// Inbound query string parsing

use url::form_urlencoded;

/// Decoded query parameters of an inbound request, in order of appearance
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse the raw query component (without leading `?`)
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    /// First value of `name`, or the empty string when absent
    pub fn get(&self, name: &str) -> &str {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map_or("", |(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_empty() {
        let params = QueryParams::parse(None);
        assert_eq!(params.get("filter"), "");

        let params = QueryParams::parse(Some("facet=kind"));
        assert_eq!(params.get("facet"), "kind");
        assert_eq!(params.get("filter"), "");
    }

    #[test]
    fn test_decodes_values() {
        let params = QueryParams::parse(Some("filter=kind%3Dcomponent%2Cspec.type%3Dservice&cursor=a+b"));
        assert_eq!(params.get("filter"), "kind=component,spec.type=service");
        assert_eq!(params.get("cursor"), "a b");
    }

    #[test]
    fn test_first_value_wins() {
        let params = QueryParams::parse(Some("facet=kind&facet=spec.owner&filter="));
        assert_eq!(params.get("facet"), "kind");
        assert_eq!(params.get("filter"), "");
    }
}
