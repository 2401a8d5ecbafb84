mod common;

use std::sync::Arc;

use linkvault_api::ApiError;
use linkvault_api::VaultConfig;
use linkvault_api::now_millis;
use linkvault_types::models::{AuthUser, ContentKind};
use tokio::io::AsyncReadExt;

use common::{TestVault, file, text};

#[tokio::test]
async fn single_view_text_is_served_once() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            max_views: Some(1),
            ..text("hello")
        })
        .await
        .unwrap();

    let first = vault.engine.access(&created.id, None).await.unwrap();
    assert_eq!(first.kind, ContentKind::Text);
    assert_eq!(first.text.as_deref(), Some("hello"));
    assert_eq!(first.view_count, Some(1));
    assert_eq!(first.max_views, Some(1));

    let second = vault.engine.access(&created.id, None).await;
    assert!(matches!(second, Err(ApiError::ExpiredOrInvalid)));
    // exhausted, not deleted
    assert_eq!(vault.view_count(&created.id), Some(1));
}

#[tokio::test]
async fn view_limit_allows_exactly_max_views() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            max_views: Some(3),
            ..text("three times")
        })
        .await
        .unwrap();

    for expected in 1..=3 {
        let resp = vault.engine.access(&created.id, None).await.unwrap();
        assert_eq!(resp.view_count, Some(expected));
    }
    assert!(matches!(
        vault.engine.access(&created.id, None).await,
        Err(ApiError::ExpiredOrInvalid)
    ));
}

#[tokio::test]
async fn unlimited_content_keeps_counting() {
    let vault = TestVault::new().await;
    let created = vault.engine.create(text("forever-ish")).await.unwrap();
    assert_eq!(created.max_views, None);

    for _ in 0..10 {
        vault.engine.access(&created.id, None).await.unwrap();
    }
    assert_eq!(vault.view_count(&created.id), Some(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_access_grants_the_last_view_once() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            max_views: Some(1),
            ..text("race me")
        })
        .await
        .unwrap();

    let id = Arc::new(created.id);
    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = vault.engine.clone();
            let id = id.clone();
            tokio::spawn(async move { engine.access(&id, None).await })
        })
        .collect();

    let results = futures_util::future::join_all(tasks).await;
    let granted = results
        .iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(ApiError::ExpiredOrInvalid))))
        .count();

    assert_eq!(granted, 1);
    assert_eq!(exhausted, 15);
    assert_eq!(vault.view_count(&id), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_share_one_time_text_once() {
    let vault = TestVault::new().await;

    for _ in 0..20 {
        let created = vault
            .engine
            .create(linkvault_api::lifecycle::NewContent {
                one_time: true,
                ..text("only one of you")
            })
            .await
            .unwrap();

        let id = Arc::new(created.id);
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let engine = vault.engine.clone();
                let id = id.clone();
                tokio::spawn(async move { engine.access(&id, None).await })
            })
            .collect();

        let results = futures_util::future::join_all(tasks).await;
        let granted: Vec<_> = results
            .iter()
            .filter_map(|r| match r {
                Ok(Ok(resp)) => Some(resp),
                _ => None,
            })
            .collect();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(ApiError::ExpiredOrInvalid))))
            .count();

        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].text.as_deref(), Some("only one of you"));
        assert_eq!(granted[0].view_count, Some(1));
        assert_eq!(refused, 15);
        assert!(vault.db.get_content(&id).unwrap().is_none());
    }
}

#[tokio::test]
async fn one_time_text_is_deleted_after_first_read() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            one_time: true,
            ..text("burn after reading")
        })
        .await
        .unwrap();

    let first = vault.engine.access(&created.id, None).await.unwrap();
    assert_eq!(first.text.as_deref(), Some("burn after reading"));

    assert!(matches!(
        vault.engine.access(&created.id, None).await,
        Err(ApiError::ExpiredOrInvalid)
    ));
    assert!(vault.db.get_content(&created.id).unwrap().is_none());
    assert!(matches!(
        vault
            .engine
            .stats(&created.id, None, Some(&created.delete_token))
            .await,
        Err(ApiError::Forbidden)
    ));
}

#[tokio::test]
async fn one_time_file_survives_metadata_access_until_downloaded() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            one_time: true,
            ..file("notes.txt", "text/plain", b"file body")
        })
        .await
        .unwrap();

    let meta = vault.engine.access(&created.id, None).await.unwrap();
    assert_eq!(meta.kind, ContentKind::File);
    assert_eq!(meta.text, None);
    assert_eq!(meta.original_name.as_deref(), Some("notes.txt"));
    assert!(vault.storage.exists(&created.id).await.unwrap());

    let mut download = vault.engine.open_download(&created.id, None).await.unwrap();
    assert_eq!(download.ticket.filename, "notes.txt");
    assert_eq!(download.ticket.media_type, "text/plain");
    assert_eq!(download.ticket.size, 9);

    let mut body = Vec::new();
    download.file.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"file body");
    vault.engine.complete_download(&download.ticket).await.unwrap();

    assert!(vault.db.get_content(&created.id).unwrap().is_none());
    assert!(!vault.storage.exists(&created.id).await.unwrap());
    assert!(matches!(
        vault.engine.open_download(&created.id, None).await,
        Err(ApiError::ExpiredOrInvalid)
    ));
}

#[tokio::test]
async fn abandoned_download_does_not_consume() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            one_time: true,
            ..file("a.pdf", "application/pdf", b"%PDF-1.7")
        })
        .await
        .unwrap();

    // Opened but never completed.
    drop(vault.engine.open_download(&created.id, None).await.unwrap());

    assert!(vault.engine.open_download(&created.id, None).await.is_ok());
}

#[tokio::test]
async fn expired_content_is_purged_on_access() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(file("old.png", "image/png", b"\x89PNG"))
        .await
        .unwrap();
    vault.expire_content(&created.id);

    assert!(matches!(
        vault.engine.access(&created.id, None).await,
        Err(ApiError::ExpiredOrInvalid)
    ));
    assert!(vault.db.get_content(&created.id).unwrap().is_none());
    assert!(!vault.storage.exists(&created.id).await.unwrap());
    assert!(matches!(
        vault
            .engine
            .stats(&created.id, None, Some(&created.delete_token))
            .await,
        Err(ApiError::Forbidden)
    ));
}

#[tokio::test]
async fn expiry_is_checked_before_password() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            password: Some("x".into()),
            ..text("secret")
        })
        .await
        .unwrap();
    vault.expire_content(&created.id);

    // A wrong password still reports expiry, and the record is gone.
    assert!(matches!(
        vault.engine.access(&created.id, Some("wrong")).await,
        Err(ApiError::ExpiredOrInvalid)
    ));
    assert!(vault.db.get_content(&created.id).unwrap().is_none());
}

#[tokio::test]
async fn password_gates_access_without_consuming_views() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            password: Some("x".into()),
            max_views: Some(1),
            ..text("gated")
        })
        .await
        .unwrap();

    assert!(matches!(
        vault.engine.access(&created.id, Some("y")).await,
        Err(ApiError::InvalidPassword)
    ));
    assert!(matches!(
        vault.engine.access(&created.id, None).await,
        Err(ApiError::InvalidPassword)
    ));
    assert_eq!(vault.view_count(&created.id), Some(0));

    let resp = vault.engine.access(&created.id, Some("x")).await.unwrap();
    assert!(resp.requires_password);
    assert_eq!(resp.text.as_deref(), Some("gated"));
    assert_eq!(resp.view_count, Some(1));
}

#[tokio::test]
async fn verify_password_has_no_side_effects() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            password: Some("open sesame".into()),
            one_time: true,
            ..text("once")
        })
        .await
        .unwrap();

    for _ in 0..3 {
        assert!(vault.engine.verify_password(&created.id, Some("open sesame")).await.unwrap());
        assert!(!vault.engine.verify_password(&created.id, Some("nope")).await.unwrap());
        assert!(!vault.engine.verify_password(&created.id, None).await.unwrap());
    }
    assert_eq!(vault.view_count(&created.id), Some(0));

    // Still consumable exactly once afterwards.
    vault.engine.access(&created.id, Some("open sesame")).await.unwrap();
    assert!(!vault.engine.verify_password(&created.id, Some("open sesame")).await.unwrap());
}

#[tokio::test]
async fn verify_password_rejects_expired_without_purging() {
    let vault = TestVault::new().await;
    let created = vault.engine.create(text("no password")).await.unwrap();
    assert!(vault.engine.verify_password(&created.id, None).await.unwrap());

    vault.expire_content(&created.id);
    assert!(!vault.engine.verify_password(&created.id, None).await.unwrap());
    assert!(vault.db.get_content(&created.id).unwrap().is_some());
    assert!(!vault.engine.verify_password("missing", None).await.unwrap());
}

#[tokio::test]
async fn peek_reports_password_gate_without_consuming() {
    let vault = TestVault::new().await;
    let gated = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            password: Some("pw".into()),
            ..text("hidden")
        })
        .await
        .unwrap();

    let resp = vault.engine.peek(&gated.id).await.unwrap();
    assert!(resp.requires_password);
    assert_eq!(resp.text, None);
    assert_eq!(resp.view_count, None);
    assert_eq!(vault.view_count(&gated.id), Some(0));

    let open = vault.engine.create(text("visible")).await.unwrap();
    let resp = vault.engine.peek(&open.id).await.unwrap();
    assert_eq!(resp.text.as_deref(), Some("visible"));
    assert_eq!(resp.view_count, Some(1));
}

#[tokio::test]
async fn delete_requires_token_or_ownership() {
    let vault = TestVault::new().await;
    let owner = AuthUser {
        id: "owner-1".into(),
        email: "owner@example.com".into(),
        token: String::new(),
    };
    let stranger = AuthUser {
        id: "someone-else".into(),
        email: "x@example.com".into(),
        token: String::new(),
    };
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            owner_id: Some(owner.id.clone()),
            ..text("mine")
        })
        .await
        .unwrap();

    for (requester, token) in [
        (None, None),
        (None, Some("wrong-token")),
        (None, Some("")),
        (Some(&stranger), None),
        (Some(&stranger), Some("wrong-token")),
    ] {
        assert!(matches!(
            vault.engine.delete(&created.id, requester, token).await,
            Err(ApiError::Forbidden)
        ));
    }
    assert!(vault.engine.access(&created.id, None).await.is_ok());

    vault.engine.delete(&created.id, Some(&owner), None).await.unwrap();
    assert!(vault.db.get_content(&created.id).unwrap().is_none());

    // A second delete of a gone id is reported as forbidden, not success.
    assert!(matches!(
        vault.engine.delete(&created.id, Some(&owner), None).await,
        Err(ApiError::Forbidden)
    ));
}

#[tokio::test]
async fn delete_token_works_for_anonymous_content() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(file("data.csv", "text/csv", b"a,b\n1,2\n"))
        .await
        .unwrap();

    let stats = vault
        .engine
        .stats(&created.id, None, Some(&created.delete_token))
        .await
        .unwrap();
    assert_eq!(stats.view_count, 0);
    assert_eq!(stats.max_views, None);

    vault
        .engine
        .delete(&created.id, None, Some(&created.delete_token))
        .await
        .unwrap();
    assert!(!vault.storage.exists(&created.id).await.unwrap());
    assert!(matches!(
        vault
            .engine
            .delete(&created.id, None, Some(&created.delete_token))
            .await,
        Err(ApiError::Forbidden)
    ));
}

#[tokio::test]
async fn creation_defaults_and_normalization() {
    let vault = TestVault::new().await;
    let before = now_millis();
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            expiry_minutes: Some(0),
            max_views: Some(0),
            password: Some(String::new()),
            ..text("defaults")
        })
        .await
        .unwrap();
    let after = now_millis();

    let ten_minutes = 10 * 60 * 1000;
    assert!(created.expires_at >= before + ten_minutes);
    assert!(created.expires_at <= after + ten_minutes);
    assert_eq!(created.max_views, None);

    let row = vault.db.get_content(&created.id).unwrap().unwrap();
    assert_eq!(row.password_hash, None);
    assert_eq!(row.view_count, 0);
    assert!(row.expires_at > row.created_at);
    assert_ne!(row.delete_token_hash, created.delete_token);

    let custom = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            expiry_minutes: Some(60),
            ..text("an hour")
        })
        .await
        .unwrap();
    let row = vault.db.get_content(&custom.id).unwrap().unwrap();
    assert_eq!(row.expires_at - row.created_at, 60 * 60 * 1000);
}

#[tokio::test]
async fn huge_expiry_is_clamped_to_the_maximum() {
    let config = VaultConfig {
        max_expiry_minutes: 24 * 60,
        ..VaultConfig::default()
    };
    let vault = TestVault::with_config(config).await;

    for requested in [i64::MAX / 1000, i64::MAX, 24 * 60 + 1] {
        let created = vault
            .engine
            .create(linkvault_api::lifecycle::NewContent {
                expiry_minutes: Some(requested),
                ..text("long lived")
            })
            .await
            .unwrap();
        let row = vault.db.get_content(&created.id).unwrap().unwrap();
        assert_eq!(row.expires_at - row.created_at, 24 * 60 * 60 * 1000);
        assert_eq!(created.expires_at, row.expires_at);
    }

    // Within the cap the request is honored as-is.
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            expiry_minutes: Some(90),
            ..text("short")
        })
        .await
        .unwrap();
    let row = vault.db.get_content(&created.id).unwrap().unwrap();
    assert_eq!(row.expires_at - row.created_at, 90 * 60 * 1000);
}

#[tokio::test]
async fn creation_validates_payloads() {
    let config = VaultConfig {
        max_file_bytes: 16,
        ..VaultConfig::default()
    };
    let vault = TestVault::with_config(config).await;

    assert!(matches!(
        vault.engine.create(text("")).await,
        Err(ApiError::MissingPayload)
    ));
    assert!(matches!(
        vault
            .engine
            .create(file("run.exe", "application/x-msdownload", b"MZ"))
            .await,
        Err(ApiError::InvalidFileType)
    ));
    assert!(matches!(
        vault
            .engine
            .create(file("big.txt", "text/plain", &[b'a'; 17]))
            .await,
        Err(ApiError::FileTooLarge { .. })
    ));
    assert!(
        vault
            .engine
            .create(file("ok.txt", "text/plain", &[b'a'; 16]))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn download_checks_password_then_kind() {
    let vault = TestVault::new().await;
    let gated_text = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            password: Some("pw".into()),
            ..text("not a file")
        })
        .await
        .unwrap();

    assert!(matches!(
        vault.engine.open_download(&gated_text.id, Some("bad")).await,
        Err(ApiError::InvalidPassword)
    ));
    assert!(matches!(
        vault.engine.open_download(&gated_text.id, Some("pw")).await,
        Err(ApiError::NotAFile)
    ));
    assert!(matches!(
        vault.engine.open_download("does-not-exist", None).await,
        Err(ApiError::ExpiredOrInvalid)
    ));
}

#[tokio::test]
async fn download_does_not_touch_view_counter() {
    let vault = TestVault::new().await;
    let created = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            max_views: Some(1),
            ..file("pic.gif", "image/gif", b"GIF89a")
        })
        .await
        .unwrap();

    vault.engine.access(&created.id, None).await.unwrap();
    let download = vault.engine.open_download(&created.id, None).await.unwrap();
    vault.engine.complete_download(&download.ticket).await.unwrap();

    assert_eq!(vault.view_count(&created.id), Some(1));
    assert!(vault.engine.open_download(&created.id, None).await.is_ok());
}

#[tokio::test]
async fn owners_see_only_their_live_content() {
    let vault = TestVault::new().await;
    let owner = AuthUser {
        id: "owner-2".into(),
        email: "o@example.com".into(),
        token: String::new(),
    };
    let mine = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            owner_id: Some(owner.id.clone()),
            max_views: Some(5),
            ..text("listed")
        })
        .await
        .unwrap();
    let stale = vault
        .engine
        .create(linkvault_api::lifecycle::NewContent {
            owner_id: Some(owner.id.clone()),
            ..text("expired")
        })
        .await
        .unwrap();
    vault.expire_content(&stale.id);
    vault.engine.create(text("anonymous")).await.unwrap();

    let items = vault.engine.list_owned(&owner).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, mine.id);
    assert_eq!(items[0].kind, ContentKind::Text);
    assert_eq!(items[0].max_views, Some(5));
}
