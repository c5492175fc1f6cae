use rand::RngCore;

/// A store-assigned 24-hex-character identifier, modeled on a Mongo-style
/// ObjectId (4-byte unix timestamp, 5 random bytes, 3-byte counter) so the
/// in-memory store and a real document-store adapter produce ids with the
/// same shape without either depending on a MongoDB driver.
pub fn generate_object_id(now_unix_secs: u32, counter: u32) -> String {
    let mut bytes = [0u8; 12];
    bytes[0..4].copy_from_slice(&now_unix_secs.to_be_bytes());

    let mut random = [0u8; 5];
    rand::thread_rng().fill_bytes(&mut random);
    bytes[4..9].copy_from_slice(&random);

    let counter_bytes = counter.to_be_bytes();
    bytes[9..12].copy_from_slice(&counter_bytes[1..4]);

    hex::encode(bytes)
}

/// `true` when `s` is a well-formed 24-character lowercase-hex identifier.
/// Malformed ids are rejected with `404` before ever reaching the store.
pub fn is_valid_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid() {
        let id = generate_object_id(1_700_000_000, 1);
        assert_eq!(id.len(), 24);
        assert!(is_valid_object_id(&id));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!is_valid_object_id("too-short"));
        assert!(!is_valid_object_id("zzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(!is_valid_object_id(""));
    }
}
