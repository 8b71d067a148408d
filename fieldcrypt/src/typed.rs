//! Field encryption for strongly-typed records.
//!
//! A record type describes its fields through [`Encryptable`]: a static
//! table of [`FieldDescriptor`]s plus a visitor entry point that hands every
//! field marked for encryption to a [`FieldVisitor`]. The table is normally
//! generated with `#[derive(Encryptable)]` and `#[enc]` field markers:
//!
//! ```
//! use fieldcrypt::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Encryptable)]
//! struct Card {
//!     #[enc]
//!     front: String,
//!     #[enc]
//!     back: String,
//! }
//!
//! #[derive(Debug, Clone, Default, Encryptable)]
//! struct Staff {
//!     email: String,
//!     #[enc]
//!     real_name: String,
//!     #[enc]
//!     id_card: Card,
//! }
//!
//! let engine = FieldEngine::from_passphrase("passphrase").unwrap();
//! let mut staff = Staff {
//!     email: "a@b.com".into(),
//!     real_name: "Alice".into(),
//!     id_card: Card { front: "front.png".into(), back: String::new() },
//! };
//!
//! engine.encrypt_struct_fields(&mut staff).unwrap();
//! assert_eq!(staff.email, "a@b.com");
//! assert!(staff.real_name.starts_with("AES256:"));
//! assert!(staff.id_card.back.is_empty());
//!
//! let plain = engine.decrypt_struct_fields(&staff).unwrap();
//! assert_eq!(plain.real_name, "Alice");
//! ```
//!
//! Marked fields may be `String`, another `Encryptable` record, or an
//! `Option` / `Vec` of those. Empty strings, `None` and empty vectors are
//! skipped: absence of data is never turned into an envelope.

use crate::engine::FieldEngine;
use crate::error::Error;

/// Per-field metadata of an [`Encryptable`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name as declared on the record
    pub name: &'static str,
    /// Whether the field takes part in encryption
    pub encrypted: bool,
}

/// Receives every non-empty text leaf reachable through marked fields.
pub trait FieldVisitor {
    /// Visits one text leaf. `field` is the name of the innermost marked field.
    ///
    /// # Errors
    ///
    /// Any error aborts the traversal.
    fn visit_text(&mut self, field: &'static str, value: &mut String) -> Result<(), Error>;
}

/// A value that can sit behind an `#[enc]` marker.
pub trait EncryptedField {
    /// Passes every non-empty text leaf of this value to `visitor`.
    ///
    /// # Errors
    ///
    /// Propagates the first visitor error.
    fn accept(&mut self, field: &'static str, visitor: &mut dyn FieldVisitor) -> Result<(), Error>;
}

/// A record with a static encryption schema.
pub trait Encryptable {
    /// One descriptor per declared field, in declaration order.
    const FIELDS: &'static [FieldDescriptor];

    /// Passes every marked field to `visitor`.
    ///
    /// # Errors
    ///
    /// Propagates the first visitor error.
    fn accept_fields(&mut self, visitor: &mut dyn FieldVisitor) -> Result<(), Error>;
}

/// Names of the fields of `T` marked for encryption.
#[must_use]
pub fn encrypted_fields<T: Encryptable>() -> Vec<&'static str> {
    T::FIELDS.iter().filter(|d| d.encrypted).map(|d| d.name).collect()
}

impl EncryptedField for String {
    fn accept(&mut self, field: &'static str, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        visitor.visit_text(field, self)
    }
}

impl<T: EncryptedField> EncryptedField for Option<T> {
    fn accept(&mut self, field: &'static str, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
        match self {
            Some(inner) => inner.accept(field, visitor),
            None => Ok(()),
        }
    }
}

impl<T: EncryptedField> EncryptedField for Vec<T> {
    fn accept(&mut self, field: &'static str, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
        for item in self.iter_mut() {
            item.accept(field, visitor)?;
        }
        Ok(())
    }
}

struct Sealer<'a> {
    engine: &'a FieldEngine,
    sealed: usize,
    skipped: usize,
}

impl FieldVisitor for Sealer<'_> {
    fn visit_text(&mut self, field: &'static str, value: &mut String) -> Result<(), Error> {
        match self.engine.encrypt_leaf(field, value)? {
            Some(envelope) => {
                *value = envelope;
                self.sealed += 1;
            }
            None => self.skipped += 1,
        }
        Ok(())
    }
}

struct Opener<'a> {
    engine: &'a FieldEngine,
    opened: usize,
}

impl FieldVisitor for Opener<'_> {
    fn visit_text(&mut self, _field: &'static str, value: &mut String) -> Result<(), Error> {
        *value = self.engine.decrypt(value)?;
        self.opened += 1;
        Ok(())
    }
}

impl FieldEngine {
    /// Encrypts every marked, non-empty text field of `record` in place.
    ///
    /// Values that already carry a scheme tag follow the engine's
    /// [`ReencryptPolicy`](crate::engine::ReencryptPolicy).
    ///
    /// # Errors
    ///
    /// Returns the first codec error. The record may then be partially
    /// encrypted and must not be persisted.
    pub fn encrypt_struct_fields<T: Encryptable>(&self, record: &mut T) -> Result<(), Error> {
        let mut sealer = Sealer { engine: self, sealed: 0, skipped: 0 };
        record.accept_fields(&mut sealer)?;

        tracing::debug!(
            record = std::any::type_name::<T>(),
            sealed = sealer.sealed,
            skipped = sealer.skipped,
            "encrypted record fields"
        );
        Ok(())
    }

    /// Returns a decrypted copy of `record`, leaving the original untouched.
    ///
    /// # Errors
    ///
    /// Returns the first codec error, including `Error::InvalidFormat` for a
    /// marked field that does not hold an envelope.
    pub fn decrypt_struct_fields<T: Encryptable + Clone>(&self, record: &T) -> Result<T, Error> {
        let mut copy = record.clone();
        self.decrypt_struct_fields_in_place(&mut copy)?;
        Ok(copy)
    }

    /// Decrypts every marked, non-empty text field of `record` in place.
    ///
    /// # Errors
    ///
    /// See [`FieldEngine::decrypt_struct_fields`].
    pub fn decrypt_struct_fields_in_place<T: Encryptable>(&self, record: &mut T) -> Result<(), Error> {
        let mut opener = Opener { engine: self, opened: 0 };
        record.accept_fields(&mut opener)?;

        tracing::debug!(
            record = std::any::type_name::<T>(),
            opened = opener.opened,
            "decrypted record fields"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReencryptPolicy;

    // Hand-written schemas; the derive macro emits the same shape.
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Card {
        front: String,
        back: String,
    }

    impl Encryptable for Card {
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor { name: "front", encrypted: true },
            FieldDescriptor { name: "back", encrypted: true },
        ];

        fn accept_fields(&mut self, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
            self.front.accept("front", visitor)?;
            self.back.accept("back", visitor)
        }
    }

    impl EncryptedField for Card {
        fn accept(&mut self, _field: &'static str, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
            self.accept_fields(visitor)
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Contact {
        name: String,
        phone: String,
    }

    impl Encryptable for Contact {
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor { name: "name", encrypted: true },
            FieldDescriptor { name: "phone", encrypted: true },
        ];

        fn accept_fields(&mut self, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
            self.name.accept("name", visitor)?;
            self.phone.accept("phone", visitor)
        }
    }

    impl EncryptedField for Contact {
        fn accept(&mut self, _field: &'static str, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
            self.accept_fields(visitor)
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Staff {
        email: String,
        real_name: String,
        nickname: Option<String>,
        student_card: Card,
        emergency_contact: Vec<Contact>,
        permission_level: u8,
    }

    impl Encryptable for Staff {
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor { name: "email", encrypted: false },
            FieldDescriptor { name: "real_name", encrypted: true },
            FieldDescriptor { name: "nickname", encrypted: true },
            FieldDescriptor { name: "student_card", encrypted: true },
            FieldDescriptor { name: "emergency_contact", encrypted: true },
            FieldDescriptor { name: "permission_level", encrypted: false },
        ];

        fn accept_fields(&mut self, visitor: &mut dyn FieldVisitor) -> Result<(), Error> {
            self.real_name.accept("real_name", visitor)?;
            self.nickname.accept("nickname", visitor)?;
            self.student_card.accept("student_card", visitor)?;
            self.emergency_contact.accept("emergency_contact", visitor)
        }
    }

    fn test_engine() -> FieldEngine {
        FieldEngine::from_passphrase("typed passphrase").unwrap()
    }

    fn sample_staff() -> Staff {
        Staff {
            email: "alice@example.com".to_string(),
            real_name: "Alice".to_string(),
            nickname: Some("Al".to_string()),
            student_card: Card { front: "front.png".to_string(), back: String::new() },
            emergency_contact: vec![
                Contact { name: "Bob".to_string(), phone: "0911111111".to_string() },
                Contact { name: "Carol".to_string(), phone: "0922222222".to_string() },
            ],
            permission_level: 3,
        }
    }

    #[test]
    fn test_encrypts_marked_fields_only() {
        let engine = test_engine();
        let mut staff = sample_staff();
        engine.encrypt_struct_fields(&mut staff).unwrap();

        assert_eq!(staff.email, "alice@example.com");
        assert_eq!(staff.permission_level, 3);
        assert!(staff.real_name.starts_with("AES256:"));
        assert!(staff.nickname.as_deref().unwrap().starts_with("AES256:"));
    }

    #[test]
    fn test_recurses_into_nested_and_collections() {
        let engine = test_engine();
        let mut staff = sample_staff();
        engine.encrypt_struct_fields(&mut staff).unwrap();

        assert!(staff.student_card.front.starts_with("AES256:"));
        for contact in &staff.emergency_contact {
            assert!(contact.name.starts_with("AES256:"));
            assert!(contact.phone.starts_with("AES256:"));
        }
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let engine = test_engine();
        let mut staff = Staff { real_name: String::new(), nickname: None, ..sample_staff() };
        staff.emergency_contact.clear();
        engine.encrypt_struct_fields(&mut staff).unwrap();

        assert!(staff.real_name.is_empty());
        assert!(staff.nickname.is_none());
        assert!(staff.student_card.back.is_empty());
        assert!(staff.emergency_contact.is_empty());
    }

    #[test]
    fn test_all_empty_record_is_noop() {
        let engine = test_engine();
        let mut staff = Staff::default();
        engine.encrypt_struct_fields(&mut staff).unwrap();

        assert_eq!(staff, Staff::default());
    }

    #[test]
    fn test_decrypt_returns_copy() {
        let engine = test_engine();
        let mut staff = sample_staff();
        engine.encrypt_struct_fields(&mut staff).unwrap();

        let decrypted = engine.decrypt_struct_fields(&staff).unwrap();

        assert_eq!(decrypted, sample_staff());
        assert!(staff.real_name.starts_with("AES256:"));
    }

    #[test]
    fn test_decrypt_in_place() {
        let engine = test_engine();
        let mut staff = sample_staff();
        engine.encrypt_struct_fields(&mut staff).unwrap();
        engine.decrypt_struct_fields_in_place(&mut staff).unwrap();

        assert_eq!(staff, sample_staff());
    }

    #[test]
    fn test_second_encryption_skips_under_default_policy() {
        let engine = test_engine();
        let mut staff = sample_staff();
        engine.encrypt_struct_fields(&mut staff).unwrap();
        let once = staff.clone();

        engine.encrypt_struct_fields(&mut staff).unwrap();

        assert_eq!(staff, once);
        assert_eq!(engine.decrypt_struct_fields(&staff).unwrap(), sample_staff());
    }

    #[test]
    fn test_second_encryption_fails_under_reject_policy() {
        let engine = test_engine().with_reencrypt_policy(ReencryptPolicy::Reject);
        let mut staff = sample_staff();
        engine.encrypt_struct_fields(&mut staff).unwrap();

        let result = engine.encrypt_struct_fields(&mut staff);
        assert!(matches!(result, Err(Error::AlreadyEncrypted)));
    }

    #[test]
    fn test_partially_encrypted_resubmission_tolerated() {
        let engine = test_engine();
        let mut staff = sample_staff();
        staff.real_name = engine.encrypt("Alice").unwrap();

        engine.encrypt_struct_fields(&mut staff).unwrap();

        assert_eq!(engine.decrypt_struct_fields(&staff).unwrap(), sample_staff());
    }

    #[test]
    fn test_tagged_plaintext_field_rejected_under_skip_policy() {
        let engine = test_engine();
        let mut staff = sample_staff();
        staff.nickname = Some("AES256:my private diary".to_string());

        let result = engine.encrypt_struct_fields(&mut staff);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_decrypt_plaintext_field_fails() {
        let engine = test_engine();
        let staff = sample_staff();

        let result = engine.decrypt_struct_fields(&staff);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_encrypted_fields_from_descriptors() {
        assert_eq!(
            encrypted_fields::<Staff>(),
            vec!["real_name", "nickname", "student_card", "emergency_contact"]
        );
        assert_eq!(Card::FIELDS.len(), 2);
    }
}
