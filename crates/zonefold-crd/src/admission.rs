//! Admission: defaulting followed by validation
//!
//! Every create or update passes through [`admit`] before it reaches the
//! store. Deletes are always accepted and never come through here.

use crate::validation::FieldErrors;
use crate::{CrdError, ObjectMeta, RecordSet, Result, Zone};
use tracing::debug;

/// Resources that can be admitted into the configuration store
pub trait Admission: Clone {
    /// Kind string used in error messages
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Mutate the object in place; must be idempotent
    fn apply_defaults(&mut self);

    /// Return every field error; `old` is the stored version on update
    fn validate(&self, old: Option<&Self>) -> FieldErrors;
}

impl Admission for Zone {
    const KIND: &'static str = crate::zone::KIND;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn apply_defaults(&mut self) {
        Zone::apply_defaults(self)
    }

    fn validate(&self, _old: Option<&Self>) -> FieldErrors {
        Zone::validate(self)
    }
}

impl Admission for RecordSet {
    const KIND: &'static str = crate::recordset::KIND;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn apply_defaults(&mut self) {
        RecordSet::apply_defaults(self)
    }

    fn validate(&self, _old: Option<&Self>) -> FieldErrors {
        RecordSet::validate(self)
    }
}

/// Default then validate `obj`, returning the admitted object or every field error
pub fn admit<T: Admission>(mut obj: T, old: Option<&T>) -> Result<T> {
    let key = obj.metadata().key();
    debug!(kind = T::KIND, object = %key, "default");
    obj.apply_defaults();

    debug!(
        kind = T::KIND,
        object = %key,
        "{}",
        if old.is_some() { "validate update" } else { "validate create" }
    );
    let errors = obj.validate(old);
    if !errors.is_empty() {
        return Err(CrdError::Invalid {
            kind: T::KIND.to_string(),
            name: obj.metadata().name.clone(),
            errors,
        });
    }

    Ok(obj)
}
