//! Declarative field metadata and the Field Classifier.
//!
//! # Responsibilities
//!
//! - Describe, per persistable type, which fields are encrypted and which hold
//!   embedded value objects ([`EntitySchema`], a static table).
//! - Give the walker mutable access to those fields by name ([`Encryptable`]).
//! - Derive the ordered [`TypeDescriptor`] for a type, walking its parent chain
//!   ([`resolver::classify`]), and cache it per runtime type
//!   ([`ClassificationCache`]).
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** This module must not import anything from
//!   `crate::crypto` or `crate::key`.
//! - Descriptors are immutable once derived.

pub mod cache;
pub mod resolver;

pub use cache::ClassificationCache;
pub use resolver::{classify, FieldDescriptor, TypeDescriptor};

use std::any::Any;

/// How a declared field takes part in encryption.
#[derive(Debug, Clone, Copy)]
pub enum FieldMarker {
    /// Stored as-is. Declaring a field plain in a derived type removes an
    /// inherited `Encrypted` or `Embedded` marker.
    Plain,
    /// String value encrypted before write and decrypted after load.
    Encrypted,
    /// Holds an embedded value object whose own marked fields are processed.
    Embedded(&'static EntitySchema),
}

/// One entry of an [`EntitySchema`] field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDecl {
    /// Field name, as resolved by [`Encryptable::field_mut`].
    pub name: &'static str,
    /// Encryption marker for the field.
    pub marker: FieldMarker,
}

impl FieldDecl {
    /// A field stored as-is.
    pub const fn plain(name: &'static str) -> Self {
        Self {
            name,
            marker: FieldMarker::Plain,
        }
    }

    /// A string field encrypted at rest.
    pub const fn encrypted(name: &'static str) -> Self {
        Self {
            name,
            marker: FieldMarker::Encrypted,
        }
    }

    /// A field holding an embedded value object of type `schema`.
    pub const fn embedded(name: &'static str, schema: &'static EntitySchema) -> Self {
        Self {
            name,
            marker: FieldMarker::Embedded(schema),
        }
    }
}

/// Static field table for one concrete type.
///
/// `parent` links to the schema of the type this one extends. A derived type
/// holds its parent's value and resolves inherited field names through it.
#[derive(Debug)]
pub struct EntitySchema {
    /// Human-readable type name, passed to the host on change-set recomputation.
    pub type_name: &'static str,
    /// Schema of the parent type, if any.
    pub parent: Option<&'static EntitySchema>,
    /// Fields declared at this level, in declaration order.
    pub fields: &'static [FieldDecl],
}

impl EntitySchema {
    /// Iterate this schema and its ancestors, most-derived first.
    pub fn lineage(&'static self) -> impl Iterator<Item = &'static EntitySchema> {
        std::iter::successors(Some(self), |s| s.parent)
    }
}

/// Mutable view of a single field, handed to the walker.
pub enum FieldSlot<'a> {
    /// A non-nullable string column.
    Text(&'a mut String),
    /// A nullable string column.
    NullableText(&'a mut Option<String>),
    /// An embedded value object; `None` when the reference is absent.
    Embedded(Option<&'a mut dyn Encryptable>),
}

impl std::fmt::Debug for FieldSlot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Values are never printed.
        match self {
            FieldSlot::Text(_) => f.write_str("FieldSlot::Text(..)"),
            FieldSlot::NullableText(_) => f.write_str("FieldSlot::NullableText(..)"),
            FieldSlot::Embedded(e) => write!(f, "FieldSlot::Embedded(present: {})", e.is_some()),
        }
    }
}

/// A persistable value whose marked fields can be transformed in place.
///
/// The classification cache keys on the runtime type, so implementors must be
/// `'static` concrete types.
pub trait Encryptable: Any {
    /// The static field table of this concrete type.
    fn schema(&self) -> &'static EntitySchema;

    /// Mutable access to the field called `name`.
    ///
    /// Inherited fields resolve through the embedded parent value. Returns
    /// `None` for unknown names or fields that do not hold a string or an
    /// embedded value object; the walker skips those.
    fn field_mut(&mut self, name: &str) -> Option<FieldSlot<'_>>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Persistable types shared by the unit tests of every module.

    use super::*;

    pub static USER: EntitySchema = EntitySchema {
        type_name: "User",
        parent: None,
        fields: &[
            FieldDecl::encrypted("name"),
            FieldDecl::encrypted("address"),
        ],
    };

    #[derive(Debug, Clone, PartialEq)]
    pub struct User {
        pub name: String,
        pub address: Option<String>,
    }

    impl User {
        pub fn new(name: &str, address: Option<&str>) -> Self {
            Self {
                name: name.into(),
                address: address.map(Into::into),
            }
        }
    }

    impl Encryptable for User {
        fn schema(&self) -> &'static EntitySchema {
            &USER
        }

        fn field_mut(&mut self, name: &str) -> Option<FieldSlot<'_>> {
            match name {
                "name" => Some(FieldSlot::Text(&mut self.name)),
                "address" => Some(FieldSlot::NullableText(&mut self.address)),
                _ => None,
            }
        }
    }

    pub static EXTENDED_USER: EntitySchema = EntitySchema {
        type_name: "ExtendedUser",
        parent: Some(&USER),
        fields: &[FieldDecl::encrypted("extra")],
    };

    #[derive(Debug, Clone, PartialEq)]
    pub struct ExtendedUser {
        pub user: User,
        pub extra: Option<String>,
    }

    impl ExtendedUser {
        pub fn new(name: &str, address: Option<&str>, extra: Option<&str>) -> Self {
            Self {
                user: User::new(name, address),
                extra: extra.map(Into::into),
            }
        }
    }

    impl Encryptable for ExtendedUser {
        fn schema(&self) -> &'static EntitySchema {
            &EXTENDED_USER
        }

        fn field_mut(&mut self, name: &str) -> Option<FieldSlot<'_>> {
            match name {
                "extra" => Some(FieldSlot::NullableText(&mut self.extra)),
                _ => self.user.field_mut(name),
            }
        }
    }

    pub static WITH_USER: EntitySchema = EntitySchema {
        type_name: "WithUser",
        parent: None,
        fields: &[
            FieldDecl::encrypted("name"),
            FieldDecl::plain("foo"),
            FieldDecl::embedded("user", &USER),
        ],
    };

    #[derive(Debug, Clone, PartialEq)]
    pub struct WithUser {
        pub name: String,
        pub foo: String,
        pub user: Option<User>,
    }

    impl WithUser {
        pub fn new(name: &str, foo: &str, user: Option<User>) -> Self {
            Self {
                name: name.into(),
                foo: foo.into(),
                user,
            }
        }
    }

    impl Encryptable for WithUser {
        fn schema(&self) -> &'static EntitySchema {
            &WITH_USER
        }

        fn field_mut(&mut self, name: &str) -> Option<FieldSlot<'_>> {
            match name {
                "name" => Some(FieldSlot::Text(&mut self.name)),
                "foo" => Some(FieldSlot::Text(&mut self.foo)),
                "user" => Some(FieldSlot::Embedded(
                    self.user.as_mut().map(|u| u as &mut dyn Encryptable),
                )),
                _ => None,
            }
        }
    }

    /// Derived type that re-declares an inherited encrypted field as plain.
    pub static PUBLIC_NAME_USER: EntitySchema = EntitySchema {
        type_name: "PublicNameUser",
        parent: Some(&USER),
        fields: &[FieldDecl::plain("name")],
    };

    #[derive(Debug, Clone, PartialEq)]
    pub struct PublicNameUser {
        pub user: User,
    }

    impl Encryptable for PublicNameUser {
        fn schema(&self) -> &'static EntitySchema {
            &PUBLIC_NAME_USER
        }

        fn field_mut(&mut self, name: &str) -> Option<FieldSlot<'_>> {
            self.user.field_mut(name)
        }
    }
}
