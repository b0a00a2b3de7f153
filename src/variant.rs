//! [`VariantResolver`]: selects the matching variant under `Vary`, or
//! signals a miss (spec §4.7).

use http::HeaderMap;

use crate::keyer::CacheKeyer;

/// Parse a `Vary` header into the lowercase-sorted, deduplicated list of
/// header names it names. `Vary: *` is reported separately since it never
/// matches any request (spec §9: "pins lowercase-sorted tokens").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaryFields {
    /// Ordinary field list.
    Named(Vec<String>),
    /// `Vary: *`.
    Wildcard,
}

/// Parse the `Vary` header on a stored response.
pub fn parse_vary(response_headers: &HeaderMap) -> Option<VaryFields> {
    let mut fields = Vec::new();
    let mut any = false;
    for value in response_headers.get_all(http::header::VARY) {
        any = true;
        let Ok(value) = value.to_str() else { continue };
        for tok in value.split(',') {
            let tok = tok.trim();
            if tok == "*" {
                return Some(VaryFields::Wildcard);
            }
            if !tok.is_empty() {
                fields.push(tok.to_ascii_lowercase());
            }
        }
    }
    if !any {
        return None;
    }
    fields.sort();
    fields.dedup();
    Some(VaryFields::Named(fields))
}

/// Computes and matches variant keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantResolver {
    keyer: CacheKeyer,
}

impl VariantResolver {
    /// Build the variant key for `request_headers` against the given
    /// (already lowercase-sorted) field list. A header absent from the
    /// request folds to an empty string for that field.
    pub fn variant_key_for(&self, fields: &[String], request_headers: &HeaderMap) -> String {
        fields
            .iter()
            .map(|name| {
                let values: Vec<&str> = request_headers
                    .get_all(name.as_str())
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .collect();
                format!("{name}={}", values.join(",").to_ascii_lowercase())
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// The composite storage key for the variant matching `request_headers`
    /// under `root_key`, given the root entry's `Vary` fields.
    pub fn composite_key(
        &self,
        root_key: &str,
        fields: &[String],
        request_headers: &HeaderMap,
    ) -> String {
        let variant = self.variant_key_for(fields, request_headers);
        self.keyer.variant_key(root_key, &variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_vary_detected() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::VARY, "*".parse().unwrap());
        assert_eq!(parse_vary(&headers), Some(VaryFields::Wildcard));
    }

    #[test]
    fn named_vary_is_lowercase_sorted_and_deduped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::VARY,
            "Accept-Encoding, Accept, accept-encoding".parse().unwrap(),
        );
        assert_eq!(
            parse_vary(&headers),
            Some(VaryFields::Named(vec![
                "accept".to_string(),
                "accept-encoding".to_string()
            ]))
        );
    }

    #[test]
    fn distinct_accept_encoding_values_yield_distinct_variant_keys() {
        let resolver = VariantResolver::default();
        let fields = vec!["accept-encoding".to_string()];

        let mut gzip = HeaderMap::new();
        gzip.insert(http::header::ACCEPT_ENCODING, "gzip".parse().unwrap());
        let mut identity = HeaderMap::new();
        identity.insert(http::header::ACCEPT_ENCODING, "identity".parse().unwrap());

        let key_gzip = resolver.composite_key("http://example.com/a", &fields, &gzip);
        let key_identity =
            resolver.composite_key("http://example.com/a", &fields, &identity);
        assert_ne!(key_gzip, key_identity);
    }

    #[test]
    fn missing_header_folds_to_empty_string() {
        let resolver = VariantResolver::default();
        let fields = vec!["accept-encoding".to_string()];
        let key = resolver.variant_key_for(&fields, &HeaderMap::new());
        assert_eq!(key, "accept-encoding=");
    }
}
