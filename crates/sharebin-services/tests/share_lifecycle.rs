mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use sharebin_core::quota::ANON_EXPIRY_LIMIT;
use sharebin_core::{AppError, PlanTier, ShareItem, ShareKind};
use sharebin_db::{MemoryShareRepository, ShareRepository};
use sharebin_services::{
    Disposition, ExpiryReaper, Requester, ShareDescriptor, ShareService, UploadContent,
    UploadRequest,
};
use sharebin_storage::{LocalStorage, Storage};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn test_text_round_trip_is_escaped() {
    let h = Harness::new().await;

    let outcome = h.service.upload(text_upload("<script>\0")).await.unwrap();
    assert_eq!(outcome.item.kind, ShareKind::Text);
    assert_eq!(outcome.item.content, "&lt;script&gt;");

    let descriptor = h.service.resolve(&outcome.item.short_code).await.unwrap();
    assert_eq!(descriptor, ShareDescriptor::Text("&lt;script&gt;".to_string()));
}

#[tokio::test]
async fn test_text_that_is_url_becomes_redirect() {
    let h = Harness::new().await;

    let outcome = h
        .service
        .upload(text_upload("  https://example.com/page  "))
        .await
        .unwrap();
    assert_eq!(outcome.item.kind, ShareKind::Url);

    let descriptor = h.service.resolve(&outcome.item.short_code).await.unwrap();
    assert_eq!(
        descriptor,
        ShareDescriptor::Redirect("https://example.com/page".to_string())
    );
}

#[tokio::test]
async fn test_invalid_url_rejected_without_record() {
    let h = Harness::new().await;

    let err = h.service.upload(url_upload("ftp://example.com")).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(h.repo.is_empty());
}

#[tokio::test]
async fn test_expiry_clamped_for_anonymous() {
    let h = Harness::new().await;

    let request = text_upload("hello").with_expiry_hours(10_000.0);
    let outcome = h.service.upload(request).await.unwrap();
    assert_eq!(outcome.ttl_secs, ANON_EXPIRY_LIMIT);
    let lifetime = outcome.item.expires_at - outcome.item.created_at;
    assert_eq!(lifetime, Duration::seconds(ANON_EXPIRY_LIMIT as i64));
}

#[tokio::test]
async fn test_zero_expiry_rejected() {
    let h = Harness::new().await;

    let err = h
        .service
        .upload(text_upload("hello").with_expiry_hours(0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_reserved_custom_code_rejected() {
    let h = Harness::new().await;

    for code in ["login", "/Login", "LOGIN!"] {
        let err = h
            .service
            .upload(text_upload("hello").with_custom_code(code))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CodeInUse(_)), "{} was accepted", code);
    }
    assert!(h.repo.is_empty());
}

#[tokio::test]
async fn test_custom_code_is_sanitized_and_unique() {
    let h = Harness::new().await;

    let outcome = h
        .service
        .upload(text_upload("first").with_custom_code("/My Notes"))
        .await
        .unwrap();
    assert_eq!(outcome.item.short_code, "my-notes");

    let err = h
        .service
        .upload(text_upload("second").with_custom_code("my-notes"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CodeInUse(_)));
}

#[tokio::test]
async fn test_concurrent_same_custom_code_one_wins() {
    // Both lookups are held until the other arrives, so both uploads pass the
    // availability check and the store has to settle the race on insert.
    let repo = FlakyRepository::new(MemoryShareRepository::new()).with_lookup_barrier(2);
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
    let service = ShareService::new(&test_config(&[]), Arc::new(repo.clone()), storage);

    let first = service.upload(text_upload("a").with_custom_code("race"));
    let second = service.upload(text_upload("b").with_custom_code("race"));
    let (first, second) = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        tokio::join!(first, second)
    })
    .await
    .expect("uploads did not both reach the availability check");

    let results = [first, second];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::CodeInUse(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(repo.inner.len(), 1);
}

#[tokio::test]
async fn test_generated_code_retries_past_collisions() {
    let h = Harness::new().await;
    for code in ["taken1", "taken2"] {
        h.insert_committed(&ShareItem::new(code, ShareKind::Text, "x", 60, None, Utc::now()))
            .await;
    }

    let generator = Arc::new(ScriptedGenerator::new(&["taken1", "taken2", "fresh1"]));
    let service = h.service.clone().with_generator(generator.clone());

    let outcome = service.upload(text_upload("hello")).await.unwrap();
    assert_eq!(outcome.item.short_code, "fresh1");
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn test_generated_code_skips_reserved_words() {
    let h = Harness::new().await;
    let generator = Arc::new(ScriptedGenerator::new(&["static", "abc123"]));
    let service = h.service.clone().with_generator(generator);

    let outcome = service.upload(text_upload("hello")).await.unwrap();
    assert_eq!(outcome.item.short_code, "abc123");
}

#[tokio::test]
async fn test_file_upload_serves_with_disposition() {
    let h = Harness::new().await;

    let image = h.service.upload(file_upload("Cat Pic.PNG", b"\x89PNG")).await.unwrap();
    assert_eq!(image.item.content, "cat-pic.png");
    match h.service.resolve(&image.item.short_code).await.unwrap() {
        ShareDescriptor::File {
            name,
            mime,
            disposition,
            path,
        } => {
            assert_eq!(name, "cat-pic.png");
            assert_eq!(mime, "image/png");
            assert_eq!(disposition, Disposition::Inline);
            assert!(path.ends_with("cat-pic.png"));
        }
        other => panic!("unexpected descriptor {:?}", other),
    }

    let doc = h.service.upload(file_upload("report.pdf", b"%PDF")).await.unwrap();
    match h.service.resolve(&doc.item.short_code).await.unwrap() {
        ShareDescriptor::File { disposition, .. } => {
            assert_eq!(disposition, Disposition::Attachment)
        }
        other => panic!("unexpected descriptor {:?}", other),
    }

    let (_, length) = h.service.open_file("cat-pic.png").await.unwrap();
    assert_eq!(length, 4);
}

#[tokio::test]
async fn test_non_ascii_filename_keeps_its_letters() {
    let h = Harness::new().await;

    let outcome = h.service.upload(file_upload("Résumé.PDF", b"%PDF")).await.unwrap();
    assert_eq!(outcome.item.content, "résumé.pdf");
    assert!(h.storage.exists("résumé.pdf").await.unwrap());

    let custom = h
        .service
        .upload(text_upload("menu").with_custom_code("Café"))
        .await
        .unwrap();
    assert_eq!(custom.item.short_code, "café");
}

#[tokio::test]
async fn test_same_filename_gets_distinct_artifacts() {
    let h = Harness::new().await;

    let a = h.service.upload(file_upload("notes.txt", b"one")).await.unwrap();
    let b = h.service.upload(file_upload("notes.txt", b"two")).await.unwrap();
    assert_eq!(a.item.content, "notes.txt");
    assert_eq!(b.item.content, "notes_1.txt");
    assert_eq!(h.storage.content_length("notes_1.txt").await.unwrap(), 3);
}

#[tokio::test]
async fn test_file_size_checks() {
    let h = Harness::with_config(test_config(&[("ANON_FILE_SIZE_LIMIT", "3")])).await;

    let err = h.service.upload(file_upload("big.bin", b"four")).await.unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));

    let unknown = UploadRequest::new(
        UploadContent::File {
            reader: Box::pin(&b"x"[..]),
            filename: "x.bin".to_string(),
            size: None,
        },
        Requester::anonymous(),
    );
    let err = h.service.upload(unknown).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(h.repo.is_empty());
}

#[tokio::test]
async fn test_paid_tier_gets_larger_text_quota() {
    let h = Harness::with_config(test_config(&[
        ("ANON_TEXT_SIZE_LIMIT", "4"),
        ("FREE_TEXT_SIZE_LIMIT", "4"),
        ("PAID_TEXT_SIZE_LIMIT", "100"),
    ]))
    .await;

    let err = h.service.upload(text_upload("longer text")).await.unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));

    let paid = Requester::user(Uuid::new_v4(), PlanTier::Paid);
    let request = UploadRequest::new(UploadContent::Text("longer text".into()), paid);
    let outcome = h.service.upload(request).await.unwrap();
    assert_eq!(outcome.item.user_id, paid.user_id);
}

#[tokio::test]
async fn test_failed_file_write_rolls_back_record() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FaultyStorage::new(LocalStorage::new(dir.path()).await.unwrap()));
    storage.fail_writes.store(true, Ordering::SeqCst);
    let repo = MemoryShareRepository::new();
    let service = ShareService::new(&test_config(&[]), Arc::new(repo.clone()), storage.clone());

    let err = service
        .upload(file_upload("doc.txt", b"data").with_custom_code("mydoc"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert!(repo.is_empty());
    assert!(!storage.exists("doc.txt").await.unwrap());

    storage.fail_writes.store(false, Ordering::SeqCst);
    let outcome = service
        .upload(file_upload("doc.txt", b"data").with_custom_code("mydoc"))
        .await
        .unwrap();
    assert_eq!(outcome.item.short_code, "mydoc");
}

#[tokio::test]
async fn test_failed_commit_removes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
    let repo = FlakyRepository::new(MemoryShareRepository::new());
    repo.fail_commits.store(true, Ordering::SeqCst);
    let service = ShareService::new(&test_config(&[]), Arc::new(repo.clone()), storage.clone());

    let err = service.upload(file_upload("doc.txt", b"data")).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert!(repo.inner.is_empty());
    assert!(!storage.exists("doc.txt").await.unwrap());
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let h = Harness::new().await;
    let err = h.service.resolve("nothing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Invalid link"));
}

#[tokio::test]
async fn test_expired_share_served_until_reaped() {
    let h = Harness::new().await;
    let mut item = ShareItem::new("stale1", ShareKind::Text, "old", 60, None, Utc::now());
    item.expires_at = Utc::now() - Duration::hours(1);
    h.insert_committed(&item).await;

    assert!(h.service.resolve("stale1").await.is_ok());

    let strict = Harness::with_config(test_config(&[("STRICT_READ_EXPIRY", "true")])).await;
    strict.insert_committed(&item).await;
    assert!(matches!(
        strict.service.resolve("stale1").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_file_lifecycle_ends_with_not_found() {
    let h = Harness::new().await;
    let reaper = ExpiryReaper::new(
        Arc::new(h.repo.clone()),
        h.storage.clone(),
        std::time::Duration::from_secs(60),
    );

    let outcome = h
        .service
        .upload(file_upload("photo.jpg", b"jpegbytes").with_expiry_hours(1.0))
        .await
        .unwrap();
    let code = outcome.item.short_code.clone();
    assert!(h.storage.exists("photo.jpg").await.unwrap());

    let before = reaper.run_once_at(outcome.item.expires_at).await.unwrap();
    assert_eq!(before.records_deleted, 0);

    let after_expiry = outcome.item.expires_at + Duration::seconds(1);
    let report = reaper.run_once_at(after_expiry).await.unwrap();
    assert_eq!(report.records_deleted, 1);
    assert_eq!(report.artifacts_deleted, 1);

    assert!(!h.storage.exists("photo.jpg").await.unwrap());
    assert!(h.repo.get_by_code(&code).await.unwrap().is_none());
    assert!(matches!(
        h.service.resolve(&code).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_detach_owner_keeps_shares() {
    let h = Harness::new().await;
    let owner = Uuid::new_v4();
    let requester = Requester::user(owner, PlanTier::Free);

    let request = UploadRequest::new(UploadContent::Text("mine".into()), requester);
    let outcome = h.service.upload(request).await.unwrap();
    assert_eq!(outcome.item.user_id, Some(owner));

    assert_eq!(h.service.detach_owner(owner).await.unwrap(), 1);
    let record = h.repo.get_by_code(&outcome.item.short_code).await.unwrap().unwrap();
    assert!(record.user_id.is_none());
    assert!(h.service.resolve(&outcome.item.short_code).await.is_ok());
}
