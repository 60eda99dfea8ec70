use crate::protocol::param_value::{Errata, ParamValue};

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    pub name: String,
    pub value: ParamValue,
    pub errata: Option<Errata>,
    pub max_length: Option<i64>,
}

/// Ordered bind name to value mapping with per-name errata and max-length.
///
/// Names are stored without the leading `:` placeholder marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterContainer {
    entries: Vec<ParameterEntry>,
}

fn normalize(name: &str) -> &str {
    name.strip_prefix(':').unwrap_or(name)
}

impl ParameterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = normalize(name);
        self.entries.iter().position(|e| e.name == name)
    }

    fn entry_mut(&mut self, name: &str) -> &mut ParameterEntry {
        let idx = match self.position(name) {
            Some(idx) => idx,
            None => {
                self.entries.push(ParameterEntry {
                    name: normalize(name).to_string(),
                    value: ParamValue::Null,
                    errata: None,
                    max_length: None,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    /// Sets a value, keeping any errata or max-length already declared.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.entry_mut(name).value = value.into();
        self
    }

    pub fn set_with_errata(
        &mut self,
        name: &str,
        value: impl Into<ParamValue>,
        errata: Errata,
    ) -> &mut Self {
        let entry = self.entry_mut(name);
        entry.value = value.into();
        entry.errata = Some(errata);
        self
    }

    pub fn set_errata(&mut self, name: &str, errata: Errata) -> &mut Self {
        self.entry_mut(name).errata = Some(errata);
        self
    }

    pub fn set_errata_tag(&mut self, name: &str, tag: &str) -> &mut Self {
        self.set_errata(name, Errata::from_tag(tag))
    }

    pub fn set_max_length(&mut self, name: &str, max_length: i64) -> &mut Self {
        self.entry_mut(name).max_length = Some(max_length);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.position(name).map(|idx| &self.entries[idx].value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn errata(&self, name: &str) -> Option<&Errata> {
        self.position(name)
            .and_then(|idx| self.entries[idx].errata.as_ref())
    }

    pub fn max_length(&self, name: &str) -> Option<i64> {
        self.position(name)
            .and_then(|idx| self.entries[idx].max_length)
    }

    /// Removes the value together with its errata and max-length.
    pub fn remove(&mut self, name: &str) -> Option<ParameterEntry> {
        self.position(name).map(|idx| self.entries.remove(idx))
    }

    /// Merges raw values: existing names are updated in place, new names are
    /// appended. Declared errata and max-lengths survive the merge.
    pub fn merge_values<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        for (name, value) in values {
            self.set(name.as_ref(), value);
        }
        self
    }

    pub fn named_values(&self) -> Vec<(String, ParamValue)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<ParamValue>> From<Vec<(K, V)>> for ParameterContainer {
    fn from(values: Vec<(K, V)>) -> Self {
        let mut container = ParameterContainer::new();
        container.merge_values(values);
        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_strip_placeholder_marker() {
        let mut c = ParameterContainer::new();
        c.set(":x", "hello");
        assert_eq!(c.get("x"), Some(&ParamValue::from("hello")));
        assert_eq!(c.get(":x"), Some(&ParamValue::from("hello")));
        assert_eq!(c.iter().next().map(|e| e.name.as_str()), Some("x"));
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut c = ParameterContainer::new();
        c.set("b", 1).set("a", 2).set("c", 3);
        let names: Vec<String> = c.named_values().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_merge_keeps_errata_and_max_length() {
        let mut c = ParameterContainer::new();
        c.set_with_errata("id", "7", Errata::Integer);
        c.set_max_length("id", 10);
        c.merge_values(vec![("id", ParamValue::from("8")), ("name", ParamValue::from("n"))]);

        assert_eq!(c.len(), 2);
        assert_eq!(c.get("id"), Some(&ParamValue::from("8")));
        assert_eq!(c.errata("id"), Some(&Errata::Integer));
        assert_eq!(c.max_length("id"), Some(10));
        assert_eq!(c.errata("name"), None);
    }

    #[test]
    fn test_remove_drops_all_metadata() {
        let mut c = ParameterContainer::new();
        c.set_with_errata("cur", ParamValue::Null, Errata::Cursor);
        let removed = c.remove("cur").expect("entry present");
        assert_eq!(removed.errata, Some(Errata::Cursor));
        assert!(c.is_empty());
        assert!(c.errata("cur").is_none());
    }

    #[test]
    fn test_set_errata_tag_unknown() {
        let mut c = ParameterContainer::new();
        c.set("g", "x").set_errata_tag("g", "geometry");
        assert_eq!(c.errata("g"), Some(&Errata::Other("geometry".to_string())));
    }

    #[test]
    fn test_from_vec() {
        let c = ParameterContainer::from(vec![("a", 1i64), ("b", 2i64)]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("b"), Some(&ParamValue::Integer(2)));
    }
}
