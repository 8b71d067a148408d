//! Basic usage example for `fieldcrypt`.

use fieldcrypt::prelude::*;
use serde_json::{json, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("fieldcrypt Basic Usage Example");
    println!("==============================\n");

    let engine = FieldEngine::from_passphrase("example passphrase")?;
    println!("✓ FieldEngine created ({:?})\n", engine.cipher_mode());

    // Single values
    let envelope = engine.encrypt("alice@example.com")?;
    println!("Envelope:    {envelope}");
    println!("Decrypted:   {}", engine.decrypt(&envelope)?);
    println!("Fingerprint: {}\n", engine.fingerprint("alice@example.com"));

    // Documents through a collection
    let users = EncryptedCollection::new(engine, MemoryStore::new(), "users");
    let Value::Object(alice) = json!({
        "_id": "u-1",
        "name": "Alice",
        "email": "alice@example.com",
        "team_id": "t-9",
        "ignore_encryption": ["_id", "team_id"],
    }) else {
        return Err("document must be an object".into());
    };
    users.save(alice)?;

    println!("Stored:");
    for doc in users.store().raw_documents("users")? {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }

    let Value::Object(filter) = json!({"email": "alice@example.com"}) else {
        return Err("filter must be an object".into());
    };
    println!("\nFound:");
    for doc in users.find(filter)? {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }

    Ok(())
}
