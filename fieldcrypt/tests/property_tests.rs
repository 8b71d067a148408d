//! Property-based tests with proptest.
//!
//! - `codec_properties`: envelope round trip, non-determinism, layout
//! - `fingerprint_properties`: determinism and digest shape
//! - `document_properties`: dynamic traversal round trip and query rewriting

use fieldcrypt::prelude::*;
use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;

fn engine(mode: CipherMode) -> FieldEngine {
    FieldEngine::from_passphrase("property passphrase").unwrap().with_cipher_mode(mode)
}

fn cipher_mode() -> impl Strategy<Value = CipherMode> {
    prop_oneof![Just(CipherMode::Aes256Cfb), Just(CipherMode::Aes256Gcm)]
}

/// Documents of plain lowercase field names, mixing strings and numbers.
fn document() -> impl Strategy<Value = Document> {
    let value = prop_oneof![
        any::<String>().prop_map(Value::String),
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
    ];
    prop::collection::btree_map("[a-z]{1,12}", value, 0..8).prop_map(|fields: BTreeMap<_, _>| {
        fields.into_iter().collect()
    })
}

mod codec_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: decrypt(encrypt(p)) == p for any UTF-8 text
        #[test]
        fn prop_roundtrip(plaintext in any::<String>(), mode in cipher_mode()) {
            let engine = engine(mode);
            let envelope = engine.encrypt(&plaintext).unwrap();

            prop_assert!(envelope.starts_with(mode.prefix()));
            prop_assert_eq!(engine.decrypt(&envelope).unwrap(), plaintext);
        }

        /// Property: two encryptions of the same value differ
        #[test]
        fn prop_non_deterministic(plaintext in any::<String>(), mode in cipher_mode()) {
            let engine = engine(mode);

            prop_assert_ne!(engine.encrypt(&plaintext).unwrap(), engine.encrypt(&plaintext).unwrap());
        }

        /// Property: an envelope is never accepted for encryption again
        #[test]
        fn prop_envelope_rejected(plaintext in any::<String>(), mode in cipher_mode()) {
            let engine = engine(mode);
            let envelope = engine.encrypt(&plaintext).unwrap();

            prop_assert!(matches!(engine.encrypt(&envelope), Err(Error::AlreadyEncrypted)));
        }
    }
}

mod fingerprint_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: fingerprints are stable 64-char lowercase hex digests
        #[test]
        fn prop_fingerprint_shape(value in any::<String>()) {
            let engine = engine(CipherMode::Aes256Cfb);
            let digest = engine.fingerprint(&value);

            prop_assert_eq!(digest.len(), 64);
            prop_assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
            prop_assert_eq!(digest, engine.fingerprint(&value));
        }

        /// Property: distinct values get distinct fingerprints
        #[test]
        fn prop_fingerprint_distinguishes(a in any::<String>(), b in any::<String>()) {
            prop_assume!(a != b);
            let engine = engine(CipherMode::Aes256Cfb);

            prop_assert_ne!(engine.fingerprint(&a), engine.fingerprint(&b));
        }
    }
}

mod document_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: decrypt_by_policy(encrypt_by_policy(d)) == d
        #[test]
        fn prop_document_roundtrip(original in document(), mode in cipher_mode()) {
            let engine = engine(mode);
            let mut doc = original.clone();

            engine.encrypt_by_policy(&mut doc).unwrap();
            for (field, value) in &original {
                if let Value::String(text) = value {
                    prop_assert_eq!(&doc[&format!("{field}_hash")], &Value::String(engine.fingerprint(text)));
                    prop_assert_ne!(&doc[field], value);
                } else {
                    prop_assert_eq!(&doc[field], value);
                }
            }

            engine.decrypt_by_policy(&mut doc).unwrap();
            prop_assert_eq!(doc, original);
        }

        /// Property: a rewritten filter equals the fingerprints written for the same values
        #[test]
        fn prop_filter_matches_written_document(original in document()) {
            let engine = engine(CipherMode::Aes256Cfb);
            let mut stored = original.clone();
            let mut filter = original;

            engine.encrypt_by_policy(&mut stored).unwrap();
            engine.rewrite_filter_to_fingerprints(&mut filter);

            for (field, condition) in &filter {
                prop_assert_eq!(stored.get(field), Some(condition));
            }
        }

        /// Property: a rejected traversal leaves the document unchanged
        #[test]
        fn prop_reject_is_all_or_nothing(original in document(), sealed in any::<String>()) {
            let engine = engine(CipherMode::Aes256Cfb).with_reencrypt_policy(ReencryptPolicy::Reject);
            let mut doc = original;
            doc.insert("zzsealed".to_string(), Value::String(engine.encrypt(&sealed).unwrap()));
            let before = doc.clone();

            prop_assert!(engine.encrypt_by_policy(&mut doc).is_err());
            prop_assert_eq!(doc, before);
        }
    }
}
