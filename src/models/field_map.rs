use thiserror::Error;

use super::TableSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldMapError {
    #[error("malformed pair '{token}'")]
    Malformed { token: String },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },
}

/// Ordered field name to string value mapping parsed from `key:value,key:value`.
///
/// Used both as an equality filter (query) and as an insert/update payload.
/// Keys are unique; inserting an existing key keeps its position and replaces
/// the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list of `key:value` tokens, validating every key
    /// against the table's fields. Tokens are split on their first colon.
    pub fn parse(input: &str, schema: &TableSchema) -> Result<Self, FieldMapError> {
        let mut map = FieldMap::new();

        for token in input.split(',') {
            let (key, value) = token.split_once(':').ok_or_else(|| FieldMapError::Malformed {
                token: token.to_string(),
            })?;

            if !schema.has_field(key) {
                return Err(FieldMapError::UnknownField {
                    field: key.to_string(),
                });
            }

            map.insert(key, value);
        }

        Ok(map)
    }

    /// Insert a pair, returning the previous value if the key was present
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_table() -> TableSchema {
        TableSchema::new("user", ["id", "name", "age", "url"])
    }

    #[test]
    fn parses_pairs_in_order() {
        let map = FieldMap::parse("name:koishi,age:18", &user_table()).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["name", "age"]);
        assert_eq!(map.get("name"), Some("koishi"));
        assert_eq!(map.get("age"), Some("18"));
    }

    #[test]
    fn splits_on_first_colon_only() {
        let map = FieldMap::parse("url:https://koishi.chat", &user_table()).unwrap();
        assert_eq!(map.get("url"), Some("https://koishi.chat"));
    }

    #[test]
    fn empty_value_is_kept() {
        let map = FieldMap::parse("name:", &user_table()).unwrap();
        assert_eq!(map.get("name"), Some(""));
    }

    #[test]
    fn last_duplicate_wins_and_keeps_position() {
        let map = FieldMap::parse("name:a,age:1,name:b", &user_table()).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("name", "b"), ("age", "1")]);
    }

    #[test]
    fn token_without_colon_is_malformed() {
        let err = FieldMap::parse("name:koishi,age", &user_table()).unwrap_err();
        assert_eq!(
            err,
            FieldMapError::Malformed {
                token: "age".to_string()
            }
        );
    }

    #[test]
    fn empty_input_and_trailing_comma_are_malformed() {
        assert!(matches!(
            FieldMap::parse("", &user_table()),
            Err(FieldMapError::Malformed { .. })
        ));
        assert!(matches!(
            FieldMap::parse("name:koishi,", &user_table()),
            Err(FieldMapError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_field_is_named_in_any_position() {
        for input in ["level:3,name:koishi", "name:koishi,level:3", "name:a,age:1,level:3"] {
            let err = FieldMap::parse(input, &user_table()).unwrap_err();
            assert_eq!(
                err,
                FieldMapError::UnknownField {
                    field: "level".to_string()
                },
                "input {input}"
            );
        }
    }

    #[test]
    fn keys_are_case_sensitive() {
        let err = FieldMap::parse("Name:koishi", &user_table()).unwrap_err();
        assert!(matches!(err, FieldMapError::UnknownField { field } if field == "Name"));
    }

    #[test]
    fn collects_from_pairs() {
        let map: FieldMap = [("a", "1"), ("b", "2"), ("a", "3")].into_iter().collect();
        assert_eq!(map.get("a"), Some("3"));
        assert!(map.contains_key("b"));
        assert!(!map.contains_key("c"));
    }
}
