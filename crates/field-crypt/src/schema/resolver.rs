//! Field classification from static schema tables.
//!
//! Given an [`EntitySchema`], this module produces the ordered list of fields
//! that take part in encryption, including fields inherited from parent types.

use std::collections::HashSet;

use super::{EntitySchema, FieldMarker};

/// Classification of one field that the walker must visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name passed to [`super::Encryptable::field_mut`].
    pub name: &'static str,
    /// The field's string value is encrypted at rest.
    pub is_encrypted: bool,
    /// The field holds an embedded value object to recurse into.
    pub is_embedded: bool,
    /// Declared type of the embedded value object.
    ///
    /// The walker classifies the nested runtime instance itself; this is kept
    /// for introspection.
    pub embedded_schema: Option<&'static str>,
}

/// Ordered field classification for one concrete type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Name of the classified type.
    pub type_name: &'static str,
    /// Marked fields, most-derived declarations first.
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Returns `true` if the type has no encrypted or embedded fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of the directly encrypted fields, in walk order.
    pub fn encrypted_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.is_encrypted).map(|f| f.name)
    }
}

/// Classify `schema`, walking its parent chain up to the root.
///
/// Each level contributes its declarations in order; a name already declared
/// by a more-derived level is skipped, so re-declarations override and fields
/// are never duplicated. Plain declarations are consumed for that purpose but
/// do not appear in the result.
pub fn classify(schema: &'static EntitySchema) -> TypeDescriptor {
    let mut seen = HashSet::new();
    let mut fields = Vec::new();

    for level in schema.lineage() {
        for decl in level.fields {
            if !seen.insert(decl.name) {
                continue;
            }
            match decl.marker {
                FieldMarker::Plain => {}
                FieldMarker::Encrypted => fields.push(FieldDescriptor {
                    name: decl.name,
                    is_encrypted: true,
                    is_embedded: false,
                    embedded_schema: None,
                }),
                FieldMarker::Embedded(nested) => fields.push(FieldDescriptor {
                    name: decl.name,
                    is_encrypted: false,
                    is_embedded: true,
                    embedded_schema: Some(nested.type_name),
                }),
            }
        }
    }

    TypeDescriptor {
        type_name: schema.type_name,
        fields,
    }
}
