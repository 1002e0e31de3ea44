use std::borrow::Cow;
use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result, SyntaxError};
use crate::parser::{NumberPolicy, ParseOptions};
use crate::sexp::Sexp;

/// What to do when two top-level lists share a tag.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeys {
    /// The later list replaces the earlier one's value; the tag keeps the
    /// position where it first appeared.
    #[default]
    LastWins,
    /// Later lists with a tag already seen are dropped.
    FirstWins,
    /// Fail with `Error::DuplicateKey`.
    Reject,
}

/// The top level of a parsed document: each top-level list's tag mapped to
/// the rest of that list.
///
/// Tags are kept in the order they first appeared. Lookup is linear, which is
/// faster than hashing for the handful of tags a document usually has.
#[derive(Clone, Default, PartialEq)]
pub struct Mapping<'a> {
    entries: Vec<(Cow<'a, str>, Vec<Sexp<'a>>)>,
}

impl<'a> Mapping<'a> {
    pub fn new() -> Mapping<'a> {
        Mapping { entries: vec![] }
    }

    /// Inserts `values` under `key`, returning the values it replaced.
    pub fn insert(&mut self, key: impl Into<Cow<'a, str>>, values: Vec<Sexp<'a>>) -> Option<Vec<Sexp<'a>>> {
        let key = key.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, values)),
            None => {
                self.entries.push((key, values));
                None
            }
        }
    }

    /// Adds a complete top-level expression, which must be a list whose first
    /// element is an atom. `offset` is where the expression started.
    pub(crate) fn insert_top_level(
        &mut self,
        offset: usize,
        sexp: Sexp<'a>,
        options: &ParseOptions,
    ) -> Result<()> {
        let mut items = match sexp {
            Sexp::List(items) => items.into_iter(),
            _ => return Err(Error::syntax(SyntaxError::AtomAtTopLevel, offset)),
        };

        let key = match items.next() {
            None => return Err(Error::syntax(SyntaxError::MissingTag, offset)),
            Some(Sexp::Symbol(s) | Sexp::String(s) | Sexp::Quote(s)) => s,
            Some(Sexp::Number(n)) => Cow::Owned(n.to_string()),
            Some(Sexp::List(_)) => return Err(Error::syntax(SyntaxError::TagNotAtom, offset)),
        };

        let mut values: Vec<Sexp<'a>> = items.collect();
        if options.numbers == NumberPolicy::Infer {
            values.iter_mut().for_each(Sexp::infer_numbers);
        }

        let Some(i) = self.position(&key) else {
            self.entries.push((key, values));
            return Ok(());
        };

        match options.duplicate_keys {
            DuplicateKeys::LastWins => {
                debug!(key = %key, offset, "replacing value of duplicate top-level tag");
                self.entries[i].1 = values;
            }
            DuplicateKeys::FirstWins => {
                debug!(key = %key, offset, "ignoring duplicate top-level tag");
            }
            DuplicateKeys::Reject => {
                return Err(Error::DuplicateKey {
                    key: key.into_owned(),
                })
            }
        }

        Ok(())
    }

    pub(crate) fn entries(&self) -> &[(Cow<'a, str>, Vec<Sexp<'a>>)] {
        &self.entries
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&[Sexp<'a>]> {
        self.position(key).map(|i| self.entries[i].1.as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Sexp<'a>])> + '_ {
        self.entries
            .iter()
            .map(|(key, values)| (&**key, values.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(key, _)| &**key)
    }

    pub fn into_owned(self) -> Mapping<'static> {
        let entries = self
            .entries
            .into_iter()
            .map(|(key, values)| {
                let key = Cow::Owned(key.into_owned());
                let values = values.into_iter().map(Sexp::into_owned).collect();
                (key, values)
            })
            .collect();

        Mapping { entries }
    }

    /// Turns the mapping back into its top-level lists, `(key values...)`.
    pub fn to_sexps(&self) -> Vec<Sexp<'a>> {
        self.entries
            .iter()
            .map(|(key, values)| {
                let mut list = Vec::with_capacity(values.len() + 1);
                list.push(Sexp::Symbol(key.clone()));
                list.extend(values.iter().cloned());
                Sexp::List(list)
            })
            .collect()
    }
}

impl<'a> Index<&str> for Mapping<'a> {
    type Output = [Sexp<'a>];

    fn index(&self, key: &str) -> &[Sexp<'a>] {
        match self.get(key) {
            Some(values) => values,
            None => panic!("no top-level tag named {:?}", key),
        }
    }
}

impl<'a> IntoIterator for Mapping<'a> {
    type Item = (Cow<'a, str>, Vec<Sexp<'a>>);
    type IntoIter = std::vec::IntoIter<(Cow<'a, str>, Vec<Sexp<'a>>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Debug for Mapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for Mapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&crate::writer::mapping_to_string(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(duplicate_keys: DuplicateKeys) -> ParseOptions {
        ParseOptions::default().with_duplicate_keys(duplicate_keys)
    }

    fn list(items: &[&'static str]) -> Sexp<'static> {
        Sexp::List(items.iter().map(|s| Sexp::symbol(*s)).collect())
    }

    fn build(duplicate_keys: DuplicateKeys, lists: &[&[&'static str]]) -> Result<Mapping<'static>> {
        let options = options(duplicate_keys);
        let mut mapping = Mapping::new();
        for items in lists {
            mapping.insert_top_level(0, list(items), &options)?;
        }
        Ok(mapping)
    }

    #[test]
    fn test_keys_keep_first_position() {
        let lists: &[&[&str]] = &[&["a", "1"], &["b", "2"], &["a", "3"]];

        let mapping = build(DuplicateKeys::LastWins, lists).unwrap();
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(mapping["a"], [Sexp::from(3i64)]);

        let mapping = build(DuplicateKeys::FirstWins, lists).unwrap();
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(mapping["a"], [Sexp::from(1i64)]);

        let err = build(DuplicateKeys::Reject, lists).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { key } if key == "a"));
    }

    #[test]
    fn test_top_level_shape_errors() {
        let options = ParseOptions::default();
        let mut mapping = Mapping::new();

        let err = mapping
            .insert_top_level(4, Sexp::symbol("a"), &options)
            .unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxError::AtomAtTopLevel));

        let err = mapping
            .insert_top_level(4, Sexp::List(vec![]), &options)
            .unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxError::MissingTag));

        let err = mapping
            .insert_top_level(4, Sexp::List(vec![list(&["a"])]), &options)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxError::TagNotAtom,
                offset: 4
            }
        ));

        assert!(mapping.is_empty());
    }

    #[test]
    fn test_numbers_only_in_values() {
        let mut mapping = Mapping::new();
        mapping
            .insert_top_level(0, list(&["10", "20", "x"]), &ParseOptions::default())
            .unwrap();

        assert!(mapping.contains_key("10"));
        assert_eq!(mapping["10"], [Sexp::from(20i64), Sexp::symbol("x")]);

        let text = ParseOptions::default().with_numbers(NumberPolicy::Text);
        let mut mapping = Mapping::new();
        mapping.insert_top_level(0, list(&["k", "20"]), &text).unwrap();
        assert_eq!(mapping["k"], [Sexp::symbol("20")]);
    }

    #[test]
    fn test_accessors() {
        let mut mapping = Mapping::new();
        assert_eq!(mapping.insert("a", vec![Sexp::symbol("x")]), None);
        assert_eq!(
            mapping.insert("a", vec![]),
            Some(vec![Sexp::symbol("x")])
        );
        mapping.insert(String::from("b"), vec![Sexp::from(1i64)]);

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("a"), Some(&[][..]));
        assert_eq!(mapping.get("c"), None);
        assert!(!mapping.contains_key("c"));

        let pairs: Vec<_> = mapping.iter().map(|(k, v)| (k, v.len())).collect();
        assert_eq!(pairs, vec![("a", 0), ("b", 1)]);

        assert_eq!(
            mapping.to_sexps(),
            vec![list(&["a"]), Sexp::List(vec![Sexp::symbol("b"), Sexp::from(1i64)])]
        );

        let owned: Mapping<'static> = mapping.clone().into_owned();
        assert_eq!(owned, mapping);
    }

    #[test]
    #[should_panic(expected = "no top-level tag named \"missing\"")]
    fn test_index_missing_key() {
        let _ = &Mapping::new()["missing"];
    }

    #[test]
    fn test_debug() {
        let mut mapping = Mapping::new();
        mapping.insert("avenrun", vec![Sexp::List(vec![Sexp::from(1i64)])]);
        insta::assert_debug_snapshot!(mapping, @r#"
        {
            "avenrun": [
                List(
                    [
                        Number(
                            Int(
                                1,
                            ),
                        ),
                    ],
                ),
            ],
        }
        "#);
    }
}
