use std::collections::HashMap;

/// Normalizes a free-form place or region name for lookups.
///
/// Trims, drops a leading BOM, collapses inner whitespace and uppercases,
/// so "  côte d'ivoire" and "Côte  D'Ivoire" share one key.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .trim_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Title-cases a name word by word ("latin america and the caribbean" ->
/// "Latin America And The Caribbean").
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive map from a normalized key to a value.
#[derive(Debug, Clone)]
pub struct CaseInsensitiveMap<V> {
    map: HashMap<String, V>,
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<V> CaseInsensitiveMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts unless the key is already taken; the first writer wins.
    pub fn insert_first(&mut self, key: &str, value: V) {
        let key = normalize_key(key);
        if key.is_empty() {
            return;
        }
        self.map.entry(key).or_insert(value);
    }

    pub fn insert(&mut self, key: &str, value: V) {
        let key = normalize_key(key);
        if !key.is_empty() {
            self.map.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(&normalize_key(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_case_and_spacing() {
        let mut map = CaseInsensitiveMap::new();
        map.insert_first("Korea, South", 1);
        map.insert_first("KOREA,  SOUTH", 2);
        assert_eq!(map.get(" korea, south "), Some(&1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn title_case_lowers_tail() {
        assert_eq!(title_case("EUROPEAN union"), "European Union");
        assert_eq!(title_case("  g7 "), "G7");
    }
}
