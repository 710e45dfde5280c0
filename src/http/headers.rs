//! Response header store
//!
//! Header names are lower-cased on insertion and kept unique: a repeated
//! field is merged into the existing one as a comma-separated list, which
//! RFC 2616 §4.2 defines as equivalent. Lookups go through a hash index;
//! iteration follows arrival order.

use super::MAX_HEADER_LEN;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
struct Field {
    name: String,
    value: String,
    merged: bool,
}

/// HTTP response headers
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl Headers {
    /// Create a new empty header store
    pub fn new() -> Self {
        Headers::default()
    }

    /// Insert a field, merging it into an existing field of the same name
    ///
    /// A merge that would make the value reach `MAX_HEADER_LEN` bytes is
    /// dropped.
    pub fn insert(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();

        if let Some(&pos) = self.index.get(&name) {
            let field = &mut self.fields[pos];
            if field.value.len() + value.len() < MAX_HEADER_LEN {
                field.value.push_str(", ");
                field.value.push_str(value);
                field.merged = true;
            }
            return;
        }

        self.index.insert(name.clone(), self.fields.len());
        self.fields.push(Field {
            name,
            value: value.to_string(),
            merged: false,
        });
    }

    fn position(&self, name: &str) -> Option<usize> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.index.get(&name.to_ascii_lowercase()).copied()
        } else {
            self.index.get(name).copied()
        }
    }

    /// Get the value of a field (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|pos| self.fields[pos].value.as_str())
    }

    /// Check if a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Whether the field's value was merged from several header lines
    pub fn is_merged(&self, name: &str) -> bool {
        self.position(name).map_or(false, |pos| self.fields[pos].merged)
    }

    /// Remove a field (case-insensitive)
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(pos) = self.position(name) else {
            return false;
        };

        let field = self.fields.remove(pos);
        self.index.remove(&field.name);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        true
    }

    /// Get the number of distinct fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove all fields
    pub fn clear(&mut self) {
        self.fields.clear();
        self.index.clear();
    }

    /// Iterate over all fields in arrival order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
    }

    /// Split an unfolded header line into lower-cased name and value
    ///
    /// Returns `None` for lines without a colon, which are ignored.
    pub fn parse_header_line(line: &str) -> Option<(String, String)> {
        let line = line.trim_end_matches([' ', '\t']);

        let name_end = line
            .find([':', ' ', '\t'])
            .unwrap_or(line.len());
        let rest = line[name_end..].trim_start_matches([' ', '\t']);
        let value = rest.strip_prefix(':')?;

        Some((
            line[..name_end].to_ascii_lowercase(),
            value.trim_start_matches([' ', '\t']).to_string(),
        ))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");
        headers.insert("Content-Length", "42");

        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("Content-Length"), Some("42"));
        assert_eq!(headers.get("Missing"), None);
    }

    #[test]
    fn test_names_are_lowercased() {
        let mut headers = Headers::new();
        headers.insert("CoNtEnT-TyPe", "text/html");

        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["content-type"]);
    }

    #[test]
    fn test_duplicate_fields_merge() {
        let mut headers = Headers::new();
        headers.insert("X-Foo", "a");
        headers.insert("x-foo", "b");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-Foo"), Some("a, b"));
        assert!(headers.is_merged("x-foo"));
    }

    #[test]
    fn test_merge_cap_drops_value() {
        let mut headers = Headers::new();
        let long = "v".repeat(MAX_HEADER_LEN - 10);
        headers.insert("X-Big", &long);
        headers.insert("X-Big", "0123456789");

        assert_eq!(headers.get("x-big").unwrap().len(), long.len());
        assert!(!headers.is_merged("x-big"));

        headers.insert("X-Big", "short");
        assert!(headers.get("x-big").unwrap().ends_with(", short"));
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut headers = Headers::new();
        headers.insert("A", "1");
        headers.insert("B", "2");
        headers.insert("C", "3");

        assert!(headers.remove("a"));
        assert!(!headers.remove("a"));
        assert_eq!(headers.get("b"), Some("2"));
        assert_eq!(headers.get("c"), Some("3"));

        headers.insert("c", "4");
        assert_eq!(headers.get("c"), Some("3, 4"));
    }

    #[test]
    fn test_iter_restarts_in_arrival_order() {
        let mut headers = Headers::new();
        headers.insert("Server", "x");
        headers.insert("Date", "y");

        let first: Vec<_> = headers.iter().collect();
        let second: Vec<_> = headers.iter().collect();
        assert_eq!(first, vec![("server", "x"), ("date", "y")]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_clear() {
        let mut headers = Headers::new();
        headers.insert("A", "1");
        headers.clear();

        assert!(headers.is_empty());
        assert!(!headers.contains("a"));
    }

    #[test]
    fn test_parse_header_line() {
        assert_eq!(
            Headers::parse_header_line("Content-Type: text/html"),
            Some(("content-type".to_string(), "text/html".to_string()))
        );
        assert_eq!(
            Headers::parse_header_line("X-Custom \t:  value \t"),
            Some(("x-custom".to_string(), "value".to_string()))
        );
        assert_eq!(
            Headers::parse_header_line("X-Empty:"),
            Some(("x-empty".to_string(), String::new()))
        );
        assert_eq!(Headers::parse_header_line("NoColonHere"), None);
        assert_eq!(Headers::parse_header_line("Bad Name: v"), None);
    }
}
