//! Property-based tests for the ciphers, the walker and the subscriber.
//!
//! These properties must hold for any field value that does not itself end
//! with the encryption marker:
//! - Both backends decrypt what they encrypted
//! - Encrypting then decrypting an object graph restores it exactly
//! - Flushing an entity that was only read writes back its stored ciphertext

use std::sync::Arc;

use field_crypt::{
    AesGcmSivCipher, ChaChaCipher, Cipher, ClassificationCache, Direction, EncryptSubscriber,
    Encryptable, EntitySchema, FieldDecl, FieldSlot, GraphWalker, IdentityMap, LifecycleListener,
    ManagedEntities, UnitOfWork, ENCRYPTION_MARKER,
};
use proptest::prelude::*;

// =============================================================================
// FIXTURES
// =============================================================================

static ADDRESS: EntitySchema = EntitySchema {
    type_name: "Address",
    parent: None,
    fields: &[FieldDecl::encrypted("street"), FieldDecl::plain("country")],
};

static CUSTOMER: EntitySchema = EntitySchema {
    type_name: "Customer",
    parent: None,
    fields: &[
        FieldDecl::encrypted("name"),
        FieldDecl::encrypted("email"),
        FieldDecl::plain("note"),
        FieldDecl::embedded("address", &ADDRESS),
    ],
};

#[derive(Debug, Clone, PartialEq)]
struct Address {
    street: String,
    country: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Customer {
    name: String,
    email: Option<String>,
    note: String,
    address: Option<Address>,
}

impl Encryptable for Address {
    fn schema(&self) -> &'static EntitySchema {
        &ADDRESS
    }

    fn field_mut(&mut self, name: &str) -> Option<FieldSlot<'_>> {
        match name {
            "street" => Some(FieldSlot::Text(&mut self.street)),
            "country" => Some(FieldSlot::Text(&mut self.country)),
            _ => None,
        }
    }
}

impl Encryptable for Customer {
    fn schema(&self) -> &'static EntitySchema {
        &CUSTOMER
    }

    fn field_mut(&mut self, name: &str) -> Option<FieldSlot<'_>> {
        match name {
            "name" => Some(FieldSlot::Text(&mut self.name)),
            "email" => Some(FieldSlot::NullableText(&mut self.email)),
            "note" => Some(FieldSlot::Text(&mut self.note)),
            "address" => Some(FieldSlot::Embedded(
                self.address.as_mut().map(|a| a as &mut dyn Encryptable),
            )),
            _ => None,
        }
    }
}

/// One customer held by a host, scheduled for update on every flush.
struct SingleEntityStore {
    customer: Customer,
}

impl ManagedEntities for SingleEntityStore {
    type Key = u64;

    fn entity_mut(&mut self, key: u64) -> Option<&mut dyn Encryptable> {
        let customer: &mut dyn Encryptable = &mut self.customer;
        (key == 1).then_some(customer)
    }
}

impl UnitOfWork for SingleEntityStore {
    fn scheduled_insertions(&self) -> Vec<u64> {
        Vec::new()
    }

    fn scheduled_updates(&self) -> Vec<u64> {
        vec![1]
    }

    fn recompute_change_set(&mut self, _key: u64, _type_name: &'static str) {}
}

impl IdentityMap for SingleEntityStore {
    fn managed_keys(&self) -> Vec<u64> {
        vec![1]
    }
}

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn field_value() -> impl Strategy<Value = String> {
    any::<String>().prop_filter("value must not carry the marker", |s| {
        !s.ends_with(ENCRYPTION_MARKER)
    })
}

fn address_strategy() -> impl Strategy<Value = Address> {
    (field_value(), field_value()).prop_map(|(street, country)| Address { street, country })
}

fn customer_strategy() -> impl Strategy<Value = Customer> {
    (
        field_value(),
        prop::option::of(field_value()),
        field_value(),
        prop::option::of(address_strategy()),
    )
        .prop_map(|(name, email, note, address)| Customer {
            name,
            email,
            note,
            address,
        })
}

fn key_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

// =============================================================================
// CIPHER PROPERTIES
// =============================================================================

mod cipher_properties {
    use super::*;

    proptest! {
        /// AES-GCM-SIV decrypts what it encrypted, under any key
        #[test]
        fn aes_roundtrip(key in key_strategy(), plaintext in any::<String>()) {
            let cipher = AesGcmSivCipher::with_key(&key).unwrap();
            let ciphertext = cipher.encrypt(&plaintext).unwrap();
            prop_assert!(ciphertext.starts_with("v1."));
            prop_assert_eq!(cipher.decrypt(&ciphertext).unwrap(), plaintext);
        }

        /// ChaCha20-Poly1305 decrypts what it encrypted, under any key
        #[test]
        fn chacha_roundtrip(key in key_strategy(), plaintext in any::<String>()) {
            let cipher = ChaChaCipher::with_key(&key).unwrap();
            let ciphertext = cipher.encrypt(&plaintext).unwrap();
            prop_assert!(ciphertext.starts_with("c1."));
            prop_assert_eq!(cipher.decrypt(&ciphertext).unwrap(), plaintext);
        }

        /// A different key never decrypts successfully
        #[test]
        fn wrong_key_fails(a in key_strategy(), b in key_strategy(), plaintext in any::<String>()) {
            prop_assume!(a != b);
            let ciphertext = AesGcmSivCipher::with_key(&a).unwrap().encrypt(&plaintext).unwrap();
            prop_assert!(AesGcmSivCipher::with_key(&b).unwrap().decrypt(&ciphertext).is_err());
        }
    }
}

// =============================================================================
// WALKER PROPERTIES
// =============================================================================

mod walker_properties {
    use super::*;

    proptest! {
        /// Encrypt then decrypt restores any object graph exactly
        #[test]
        fn graph_roundtrip(original in customer_strategy()) {
            let cache = ClassificationCache::new();
            let cipher = ChaChaCipher::with_key(&[9u8; 32]).unwrap();
            let walker = GraphWalker::new(&cache, Some(&cipher));

            let mut customer = original.clone();
            walker.process(&mut customer, Direction::Encrypt).unwrap();

            prop_assert!(customer.name.ends_with(ENCRYPTION_MARKER));
            prop_assert_eq!(&customer.note, &original.note);
            prop_assert_eq!(customer.email.is_some(), original.email.is_some());
            if let Some(address) = &customer.address {
                prop_assert!(address.street.ends_with(ENCRYPTION_MARKER));
            }

            walker.process(&mut customer, Direction::Decrypt).unwrap();
            prop_assert_eq!(customer, original);
        }

        /// Without a cipher neither direction changes anything
        #[test]
        fn disabled_walker_is_identity(original in customer_strategy()) {
            let cache = ClassificationCache::new();
            let walker = GraphWalker::new(&cache, None);

            let mut customer = original.clone();
            prop_assert_eq!(walker.process(&mut customer, Direction::Encrypt).unwrap(), 0);
            prop_assert_eq!(walker.process(&mut customer, Direction::Decrypt).unwrap(), 0);
            prop_assert_eq!(customer, original);
        }
    }
}

// =============================================================================
// SUBSCRIBER PROPERTIES
// =============================================================================

mod subscriber_properties {
    use super::*;

    proptest! {
        /// Flushing a customer that was only read writes back the stored ciphertext
        #[test]
        fn read_only_flush_is_stable(original in customer_strategy()) {
            let cipher = AesGcmSivCipher::with_key(&[3u8; 32]).unwrap();
            let subscriber = EncryptSubscriber::new(Some(Arc::new(cipher)));
            let listener: &dyn LifecycleListener<u64> = &subscriber;
            let mut store = SingleEntityStore { customer: original.clone() };

            listener.on_pre_write(&mut store).unwrap();
            let stored = store.customer.clone();
            listener.on_post_write_or_load(&mut store).unwrap();
            prop_assert_eq!(&store.customer, &original);

            listener.on_pre_write(&mut store).unwrap();
            prop_assert_eq!(&store.customer, &stored);
        }
    }
}
