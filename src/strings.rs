use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

/// Interning table mapping strings to dense ids.
///
/// Ids are contiguous and stable for the lifetime of the table. Rule
/// insertion interns new strings while event construction only looks existing
/// ones up, so reads take a shared lock and [`StringTable::intern`] re-checks
/// under the exclusive lock before assigning a new id.
#[derive(Debug, Default)]
pub struct StringTable {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_values: HashMap<String, StringId>,
    by_ids: Vec<String>,
}

impl StringTable {
    const SENTINEL_ID: usize = 0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Look a string up without interning it.
    ///
    /// Unknown strings map to a sentinel id that no interned string ever
    /// receives: a value that appears in no rule cannot match one either.
    pub fn get(&self, value: &str) -> StringId {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .by_values
            .get(value)
            .copied()
            .unwrap_or(StringId(Self::SENTINEL_ID))
    }

    /// Intern a string, assigning the next id on first sight.
    pub fn intern(&self, value: &str) -> StringId {
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(id) = inner.by_values.get(value) {
                return *id;
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have interned the value between the two locks.
        if let Some(id) = inner.by_values.get(value) {
            return *id;
        }
        let id = StringId(inner.by_ids.len() + 1);
        inner.by_ids.push(value.to_string());
        inner.by_values.insert(value.to_string(), id);
        id
    }

    /// Resolve an id back to its string. The sentinel id resolves to nothing.
    pub fn lookup(&self, id: StringId) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        id.0.checked_sub(1)
            .and_then(|index| inner.by_ids.get(index).cloned())
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_ids.len()
    }
}

#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Debug, Hash)]
pub struct StringId(pub(crate) usize);

#[cfg(test)]
mod tests {
    use super::*;

    const A_KEY: &str = "test";
    const ANOTHER_KEY: &str = "test_2";

    #[test]
    fn non_existing_strings_share_the_sentinel_id() {
        let table = StringTable::new();

        let id = table.get(A_KEY);

        assert_eq!(id, table.get(ANOTHER_KEY));
    }

    #[test]
    fn interning_makes_a_string_visible_to_lookups() {
        let table = StringTable::new();

        let id = table.intern(A_KEY);

        assert_eq!(id, table.get(A_KEY));
    }

    #[test]
    fn interning_the_same_string_twice_returns_the_same_id() {
        let table = StringTable::new();

        let id = table.intern(A_KEY);

        assert_eq!(id, table.intern(A_KEY));
    }

    #[test]
    fn interned_strings_get_distinct_ids() {
        let table = StringTable::new();

        let id = table.intern(A_KEY);
        let another_id = table.intern(ANOTHER_KEY);

        assert_ne!(id, another_id);
    }

    #[test]
    fn interned_ids_never_collide_with_the_sentinel() {
        let table = StringTable::new();

        let id = table.intern(A_KEY);

        assert_ne!(id, table.get("never interned"));
    }

    #[test]
    fn can_resolve_an_interned_id_back_to_its_string() {
        let table = StringTable::new();

        let id = table.intern(A_KEY);

        assert_eq!(Some(A_KEY.to_string()), table.lookup(id));
    }

    #[test]
    fn the_sentinel_id_resolves_to_nothing() {
        let table = StringTable::new();

        assert_eq!(None, table.lookup(table.get(A_KEY)));
    }

    #[test]
    fn can_intern_concurrently() {
        let table = std::sync::Arc::new(StringTable::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || table.intern(A_KEY))
            })
            .collect();

        let ids: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
