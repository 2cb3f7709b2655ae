// Upstream URL construction
// Every catalog call is one fixed path plus a handful of query parameters

use url::Url;

pub const ENTITY_FACETS_PATH: &str = "/api/catalog/entity-facets";
pub const ENTITIES_BY_QUERY_PATH: &str = "/api/catalog/entities/by-query";
pub const ENTITIES_BY_REFS_PATH: &str = "/api/catalog/entities/by-refs";

/// Listing order and page size are fixed for every entities query
const ORDER_FIELD: &str = "metadata.name,asc";
const PAGE_LIMIT: &str = "100";

/// `GET {api_url}/api/catalog/entity-facets?facet=..[&filter=..]`
pub fn entity_facets_url(api_url: &str, facet: &str, filter: &str) -> Result<Url, url::ParseError> {
    let mut url = endpoint(api_url, ENTITY_FACETS_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("facet", facet);
        if !filter.is_empty() {
            query.append_pair("filter", filter);
        }
    }
    Ok(url)
}

/// `GET {api_url}/api/catalog/entities/by-query?orderField=..&limit=100[&filter=..][&cursor=..]`
pub fn entities_by_query_url(
    api_url: &str,
    filter: &str,
    cursor: &str,
) -> Result<Url, url::ParseError> {
    let mut url = endpoint(api_url, ENTITIES_BY_QUERY_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("orderField", ORDER_FIELD)
            .append_pair("limit", PAGE_LIMIT);
        if !filter.is_empty() {
            query.append_pair("filter", filter);
        }
        if !cursor.is_empty() {
            query.append_pair("cursor", cursor);
        }
    }
    Ok(url)
}

/// `POST {api_url}/api/catalog/entities/by-refs`
pub fn entities_by_refs_url(api_url: &str) -> Result<Url, url::ParseError> {
    endpoint(api_url, ENTITIES_BY_REFS_PATH)
}

fn endpoint(api_url: &str, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{api_url}{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: &str = "http://catalog.local:7007";

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_facets_without_filter() {
        let url = entity_facets_url(API, "kind", "").unwrap();
        assert_eq!(
            url.as_str(),
            "http://catalog.local:7007/api/catalog/entity-facets?facet=kind"
        );
        assert!(!url.as_str().contains("filter="));
    }

    #[test]
    fn test_facets_with_filter() {
        let url = entity_facets_url(API, "spec.owner", "kind=component,spec.type=service").unwrap();
        assert_eq!(url.path(), "/api/catalog/entity-facets");
        assert_eq!(
            pairs(&url),
            vec![
                ("facet".to_string(), "spec.owner".to_string()),
                ("filter".to_string(), "kind=component,spec.type=service".to_string()),
            ]
        );
        // no dangling separator after the last parameter
        assert!(!url.as_str().ends_with('&'));
    }

    #[test]
    fn test_facets_empty_facet_still_sent() {
        let url = entity_facets_url(API, "", "").unwrap();
        assert_eq!(url.query(), Some("facet="));
    }

    #[test]
    fn test_by_query_fixed_params() {
        let url = entities_by_query_url(API, "", "").unwrap();
        assert_eq!(url.path(), "/api/catalog/entities/by-query");
        assert_eq!(
            pairs(&url),
            vec![
                ("orderField".to_string(), "metadata.name,asc".to_string()),
                ("limit".to_string(), "100".to_string()),
            ]
        );
        assert!(!url.as_str().contains("filter="));
        assert!(!url.as_str().contains("cursor="));
    }

    #[test]
    fn test_by_query_filter_and_cursor() {
        let url = entities_by_query_url(API, "kind=api", "eyJmaXJzdCI6dHJ1ZX0=").unwrap();
        let pairs = pairs(&url);
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[2], ("filter".to_string(), "kind=api".to_string()));
        // the token reaches the catalog unchanged once decoded
        assert_eq!(pairs[3], ("cursor".to_string(), "eyJmaXJzdCI6dHJ1ZX0=".to_string()));
    }

    #[test]
    fn test_by_query_cursor_only() {
        let url = entities_by_query_url(API, "", "abc123").unwrap();
        assert!(!url.as_str().contains("filter="));
        assert!(url.as_str().ends_with("&cursor=abc123"));
    }

    #[test]
    fn test_by_query_cursor_is_percent_encoded() {
        let url = entities_by_query_url(API, "", "ab/c+d=").unwrap();
        assert!(url.as_str().ends_with("&cursor=ab%2Fc%2Bd%3D"), "{url}");
        assert_eq!(pairs(&url)[2], ("cursor".to_string(), "ab/c+d=".to_string()));
    }

    #[test]
    fn test_base_path_is_kept() {
        let url = entities_by_refs_url("https://gateway.local/backstage").unwrap();
        assert_eq!(
            url.as_str(),
            "https://gateway.local/backstage/api/catalog/entities/by-refs"
        );
    }
}
