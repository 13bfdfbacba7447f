use super::*;
use crate::signer::SigningKey;

fn service() -> BufferAccessService {
    let signer = TokenSigner::single(SigningKey::new("key-1", b"super-secret-key-material".to_vec()));
    BufferAccessService::new(signer, "https://internal.tyger.local", "https://tyger.example.com")
}

#[test]
fn grant_access_builds_distinct_uris_for_internal_and_external() {
    let service = service();
    let buffer = tyger_core::BufferBuilder::default().build();

    let internal = service.grant_access(&buffer, AccessMode::Read, false, 0).unwrap();
    assert!(internal.uri.starts_with("https://internal.tyger.local/"));

    let external = service.grant_access(&buffer, AccessMode::Write, true, 0).unwrap();
    assert!(external.uri.starts_with("https://tyger.example.com/"));
}

#[test]
fn grant_access_still_succeeds_within_the_soft_delete_grace_window() {
    let service = service();
    let mut buffer = tyger_core::BufferBuilder::default().build();
    buffer.soft_deleted_at_ms = Some(0);

    assert!(service.grant_access(&buffer, AccessMode::Read, false, 0).is_ok());
}

#[test]
fn grant_access_rejects_a_buffer_past_its_soft_delete_grace_window() {
    let service = service();
    let mut buffer = tyger_core::BufferBuilder::default().build();
    buffer.soft_deleted_at_ms = Some(0);

    let err = service.grant_access(&buffer, AccessMode::Read, false, tyger_core::Buffer::SOFT_DELETE_GRACE_MS).unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));
}

#[test]
fn validate_round_trips_a_minted_grant() {
    let service = service();
    let buffer = tyger_core::BufferBuilder::default().build();

    let grant = service.grant_access(&buffer, AccessMode::Read, false, 0).unwrap();
    let token = grant.uri.split("token=").nth(1).unwrap();

    assert!(service.validate(buffer.id.as_str(), token, AccessMode::Read, 0).is_ok());
    assert!(service.validate(buffer.id.as_str(), token, AccessMode::Write, 0).is_err());
    assert!(service.validate("buf-someotherid0000000", token, AccessMode::Read, 0).is_err());
}
