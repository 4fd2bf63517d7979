//! Identity helpers (spec 4.1: stable ids for deterministically-derived DataPoints).

use uuid::Uuid;

/// Cognee's `NAMESPACE_OID` equivalent - a fixed namespace so `uuid5` calls across
/// the process (and across runs) agree on the same derived id for the same key.
pub const NAMESPACE_OID: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x12, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

/// Deterministic id derived from a canonical key (e.g. `"<doc_id>:<chunk_index>"`).
///
/// Calling this twice with the same key always yields the same id, which is what
/// lets `add_data_points` treat re-ingestion of the same document as an upsert.
pub fn stable_id(canonical_key: &str) -> Uuid {
    Uuid::new_v5(&NAMESPACE_OID, canonical_key.as_bytes())
}

/// Random id for DataPoints with no natural deterministic key.
pub fn random_id() -> Uuid {
    Uuid::new_v4()
}
