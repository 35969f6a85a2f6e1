//! Ordered, multi-valued field containers with array-suffix semantics.
//!
//! A [`FieldSet`] maps a base name to one or more indexed values. A name may
//! be declared three ways when adding:
//!
//! - scalar: `name`
//! - forced-array: `name[]` (auto-incrementing integer index)
//! - explicitly indexed: `name[idx]` (`idx` alphanumeric)
//!
//! Enumeration order is insertion order of distinct base names, then index
//! insertion order within a bucket. A bucket that holds a single value and
//! was never declared with brackets renders as a bare `name`; everything
//! else renders one `name[idx]` pair per entry.

use crate::base::Error;
use percent_encoding::percent_decode_str;
use url::Url;

/// One named bucket: indexed values in insertion order.
#[derive(Debug, Clone)]
struct Bucket<V> {
    base: String,
    /// Declared with bracket syntax; renders indexed even when single-valued.
    forced: bool,
    entries: Vec<(String, V)>,
}

impl<V> Bucket<V> {
    fn next_integer_index(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(idx, _)| idx.parse::<u64>().ok())
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
            .to_string()
    }

    /// Write at an index, overwriting in place if the index already exists.
    fn write(&mut self, index: String, value: V) {
        if let Some((_, v)) = self.entries.iter_mut().find(|(idx, _)| *idx == index) {
            *v = value;
        } else {
            self.entries.push((index, value));
        }
    }
}

/// Ordered mapping from field name to one or more values.
#[derive(Debug, Clone, Default)]
pub struct FieldSet<V> {
    buckets: Vec<Bucket<V>>,
}

impl<V> FieldSet<V> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }

    /// Add a value under `name`.
    ///
    /// Resolution order: an existing bucket for the base name absorbs the
    /// value (at the explicit index, or appended at the next integer index),
    /// converting a previously scalar bucket to array form while preserving
    /// the prior value at its inferred index. Otherwise a new bucket is
    /// created: scalar-style when the name had no brackets, forced-array
    /// otherwise.
    pub fn add(&mut self, name: &str, value: V) -> Result<(), Error> {
        let (base, index) = parse_name(name)?;

        if let Some(bucket) = self.buckets.iter_mut().find(|b| b.base == base) {
            let index = match index {
                Some(idx) if !idx.is_empty() => idx.to_string(),
                _ => bucket.next_integer_index(),
            };
            bucket.write(index, value);
        } else {
            let forced = index.is_some();
            let index = match index {
                Some(idx) if !idx.is_empty() => idx.to_string(),
                _ => "0".to_string(),
            };
            self.buckets.push(Bucket {
                base: base.to_string(),
                forced,
                entries: vec![(index, value)],
            });
        }
        Ok(())
    }

    /// Rendered `(key, value)` pairs in bucket-insertion then
    /// index-insertion order. The iterator borrows the set and can be
    /// restarted by calling `pairs()` again.
    pub fn pairs(&self) -> impl Iterator<Item = (String, &V)> + '_ {
        self.buckets.iter().flat_map(|bucket| {
            let indexed = bucket.forced || bucket.entries.len() != 1;
            bucket.entries.iter().map(move |(idx, value)| {
                let key = if indexed {
                    format!("{}[{}]", bucket.base, idx)
                } else {
                    bucket.base.clone()
                };
                (key, value)
            })
        })
    }

    /// Distinct base names in insertion order.
    pub fn bases(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.base.as_str())
    }

    pub fn contains_base(&self, base: &str) -> bool {
        self.buckets.iter().any(|b| b.base == base)
    }

    /// Total number of rendered pairs.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl FieldSet<String> {
    /// Extract any query string from `url` into this set, returning the URL
    /// without its query.
    ///
    /// Lets a caller supply a URL with inline parameters; they merge with
    /// explicitly added fields and are re-encoded on finalization.
    pub fn parse_url(&mut self, url: &str) -> Result<Url, Error> {
        let mut parsed = Url::parse(url).map_err(|_| Error::InvalidUrl {
            url: url.to_string(),
        })?;
        if let Some(query) = parsed.query().map(str::to_owned) {
            if !query.is_empty() {
                self.import_query(&query)?;
            }
            parsed.set_query(None);
        }
        Ok(parsed)
    }

    /// Parse a raw query string, adding every `name=value` pair.
    pub fn import_query(&mut self, query: &str) -> Result<(), Error> {
        for part in query.split('&') {
            // minimal validation - each pair must carry at least one '='
            let equals = part.find('=').ok_or(Error::MalformedQuery)?;
            let name = decode_component(&part[..equals]);
            let value = decode_component(&part[equals + 1..]);
            self.add(&name, value)?;
        }
        Ok(())
    }
}

/// Form-decode one query-string component.
fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

/// Split `name` into its base and optional bracketed index.
///
/// Returns `(base, None)` for a bare name, `(base, Some(""))` for `base[]`
/// and `(base, Some(idx))` for `base[idx]`. The index must be empty or
/// ASCII alphanumeric.
fn parse_name(name: &str) -> Result<(&str, Option<&str>), Error> {
    let invalid = || Error::InvalidFieldName {
        name: name.to_string(),
    };

    match name.find('[') {
        None => {
            if name.is_empty() || name.contains(']') {
                return Err(invalid());
            }
            Ok((name, None))
        }
        Some(open) => {
            let base = &name[..open];
            let rest = &name[open..];
            if base.is_empty() || base.contains(']') || !rest.ends_with(']') {
                return Err(invalid());
            }
            let index = &rest[1..rest.len() - 1];
            if index.contains('[') || index.contains(']') {
                return Err(invalid());
            }
            if !index.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid());
            }
            Ok((base, Some(index)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(set: &FieldSet<String>) -> Vec<(String, String)> {
        set.pairs().map(|(k, v)| (k, v.clone())).collect()
    }

    #[test]
    fn scalar_single_value_renders_bare() {
        let mut set = FieldSet::new();
        set.add("a", "1".to_string()).unwrap();
        assert_eq!(keys(&set), vec![("a".into(), "1".into())]);
    }

    #[test]
    fn second_value_converts_to_array() {
        let mut set = FieldSet::new();
        set.add("n", "v1".to_string()).unwrap();
        set.add("n", "v2".to_string()).unwrap();
        assert_eq!(
            keys(&set),
            vec![("n[0]".into(), "v1".into()), ("n[1]".into(), "v2".into())]
        );
    }

    #[test]
    fn forced_array_single_value_renders_indexed() {
        let mut set = FieldSet::new();
        set.add("a[]", "1".to_string()).unwrap();
        assert_eq!(keys(&set), vec![("a[0]".into(), "1".into())]);
    }

    #[test]
    fn scalar_then_forced_appends() {
        let mut set = FieldSet::new();
        set.add("a", "1".to_string()).unwrap();
        set.add("a[]", "2".to_string()).unwrap();
        set.add("a[]", "3".to_string()).unwrap();
        assert_eq!(
            keys(&set),
            vec![
                ("a[0]".into(), "1".into()),
                ("a[1]".into(), "2".into()),
                ("a[2]".into(), "3".into()),
            ]
        );
    }

    #[test]
    fn explicit_index_rekeys_scalar() {
        let mut set = FieldSet::new();
        set.add("a", "1".to_string()).unwrap();
        set.add("a[5]", "2".to_string()).unwrap();
        assert_eq!(
            keys(&set),
            vec![("a[0]".into(), "1".into()), ("a[5]".into(), "2".into())]
        );
    }

    #[test]
    fn string_index_then_scalar_appends_at_zero() {
        let mut set = FieldSet::new();
        set.add("a[x]", "1".to_string()).unwrap();
        set.add("a", "2".to_string()).unwrap();
        assert_eq!(
            keys(&set),
            vec![("a[x]".into(), "1".into()), ("a[0]".into(), "2".into())]
        );
    }

    #[test]
    fn explicit_index_overwrites_in_place() {
        let mut set = FieldSet::new();
        set.add("a[1]", "old".to_string()).unwrap();
        set.add("a[2]", "keep".to_string()).unwrap();
        set.add("a[1]", "new".to_string()).unwrap();
        assert_eq!(
            keys(&set),
            vec![("a[1]".into(), "new".into()), ("a[2]".into(), "keep".into())]
        );
    }

    #[test]
    fn integer_index_continues_after_explicit() {
        let mut set = FieldSet::new();
        set.add("a[7]", "1".to_string()).unwrap();
        set.add("a[]", "2".to_string()).unwrap();
        assert_eq!(
            keys(&set),
            vec![("a[7]".into(), "1".into()), ("a[8]".into(), "2".into())]
        );
    }

    #[test]
    fn bucket_order_is_insertion_order() {
        let mut set = FieldSet::new();
        set.add("z", "1".to_string()).unwrap();
        set.add("a", "2".to_string()).unwrap();
        set.add("z", "3".to_string()).unwrap();
        let rendered: Vec<String> = set.pairs().map(|(k, _)| k).collect();
        assert_eq!(rendered, vec!["z[0]", "z[1]", "a"]);
    }

    #[test]
    fn malformed_names_rejected() {
        let mut set: FieldSet<String> = FieldSet::new();
        for bad in ["", "a[b]c", "[x]", "a]b", "a[b[c]]", "a[!]", "a["] {
            let err = set.add(bad, "v".to_string()).unwrap_err();
            assert!(
                matches!(err, Error::InvalidFieldName { .. }),
                "expected InvalidFieldName for {bad:?}"
            );
        }
    }

    #[test]
    fn pairs_is_restartable() {
        let mut set = FieldSet::new();
        set.add("a", "1".to_string()).unwrap();
        assert_eq!(set.pairs().count(), 1);
        assert_eq!(set.pairs().count(), 1);
    }

    #[test]
    fn parse_url_extracts_query() {
        let mut set = FieldSet::new();
        let url = set.parse_url("http://example.com/path?a=1&a=2&b=x%20y").unwrap();
        assert_eq!(url.as_str(), "http://example.com/path");
        assert_eq!(
            keys(&set),
            vec![
                ("a[0]".into(), "1".into()),
                ("a[1]".into(), "2".into()),
                ("b".into(), "x y".into()),
            ]
        );
    }

    #[test]
    fn import_rejects_pairs_without_equals() {
        let mut set: FieldSet<String> = FieldSet::new();
        assert!(matches!(
            set.import_query("a=1&flag"),
            Err(Error::MalformedQuery)
        ));
    }

    #[test]
    fn plus_decodes_to_space() {
        let mut set: FieldSet<String> = FieldSet::new();
        set.import_query("q=hello+world").unwrap();
        assert_eq!(keys(&set), vec![("q".into(), "hello world".into())]);
    }
}
