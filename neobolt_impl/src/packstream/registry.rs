use super::decode::PackStreamError;
use super::value::{Structure, Value};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A tag-to-expected-field-counts table the decoder consults to validate incoming structures.
///
/// This is the "factory" spec.md §4.1 describes: rather than dynamic dispatch through an
/// inheritance hierarchy, registering a tag is just recording which field counts are legal for
/// it, and decoding a structure validates against that table before handing callers a
/// [`Structure`] to convert further (see `crate::graph`'s `TryFrom<Structure>` impls).
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<u8, Vec<usize>>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The process-wide registry, populated with the built-in Bolt structures at first access.
    ///
    /// Per spec.md §5, registrations are expected to complete before the first connection opens;
    /// callers that need custom structures should register them before constructing a [`Pool`](crate::Pool).
    pub fn global() -> &'static Registry {
        static GLOBAL: Lazy<Registry> = Lazy::new(|| {
            let registry = Registry::new();
            crate::graph::register_builtin(&registry);
            crate::message::register_builtin(&registry);
            registry
        });
        &GLOBAL
    }

    /// Registers `tag` as legal with any of the field counts in `expected_field_counts`.
    ///
    /// # Errors
    /// Returns an error message if `tag` is outside `0..=127`.
    pub fn register(&self, tag: u8, expected_field_counts: Vec<usize>) -> Result<(), String> {
        if tag > 0x7F {
            return Err(format!("structure tag 0x{tag:02X} is outside 0..=127"));
        }
        self.inner
            .write()
            .expect("registry lock poisoned")
            .insert(tag, expected_field_counts);
        Ok(())
    }

    pub fn unregister(&self, tag: u8) {
        self.inner.write().expect("registry lock poisoned").remove(&tag);
    }

    #[must_use]
    pub fn is_registered(&self, tag: u8) -> bool {
        self.inner.read().expect("registry lock poisoned").contains_key(&tag)
    }

    pub fn clear(&self) {
        self.inner.write().expect("registry lock poisoned").clear();
    }

    /// Validates `fields` against the registered shape for `tag` and returns the [`Structure`].
    ///
    /// # Errors
    /// [`PackStreamError::UnregisteredTag`] if `tag` has no factory; [`PackStreamError::FieldCountMismatch`]
    /// if the field count on the wire doesn't match any of the registered counts.
    pub(crate) fn construct(
        &self,
        tag: u8,
        fields: Vec<Value>,
    ) -> Result<Structure, PackStreamError> {
        let table = self.inner.read().expect("registry lock poisoned");
        let expected = table
            .get(&tag)
            .ok_or(PackStreamError::UnregisteredTag(tag))?;
        if !expected.contains(&fields.len()) {
            return Err(PackStreamError::FieldCountMismatch {
                tag,
                expected: expected.clone(),
                actual: fields.len(),
            });
        }
        Ok(Structure::new(tag, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_tags_above_127() {
        let r = Registry::new();
        assert!(r.register(0x80, vec![1]).is_err());
        assert!(r.register(0x7F, vec![1]).is_ok());
    }

    #[test]
    fn clear_removes_all_registrations() {
        let r = Registry::new();
        r.register(0x01, vec![0]).unwrap();
        assert!(r.is_registered(0x01));
        r.clear();
        assert!(!r.is_registered(0x01));
    }

    #[test]
    fn unregister_removes_one_tag() {
        let r = Registry::new();
        r.register(0x01, vec![0]).unwrap();
        r.register(0x02, vec![0]).unwrap();
        r.unregister(0x01);
        assert!(!r.is_registered(0x01));
        assert!(r.is_registered(0x02));
    }
}
