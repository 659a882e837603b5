//! Client registry integration tests against a real tempdir SQLite database.

use onboardd::config::OnboardConfig;
use onboardd::registry::{ClientFilter, ClientPatch, ClientStatus, NewClient, Page};
use onboardd::{AppContext, CoreError};
use tempfile::TempDir;

async fn ctx() -> (AppContext, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = OnboardConfig::new(Some(dir.path().to_path_buf()), Some("warn".to_string()));
    let ctx = AppContext::init(config).await.unwrap();
    (ctx, dir)
}

fn client_input(email: &str) -> NewClient {
    NewClient {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        phone: "+15551230000".to_string(),
        date_of_birth: "1990-12-10".to_string(),
        address: "12 Analytical Way".to_string(),
        city: "London".to_string(),
        state: "LD".to_string(),
        zip_code: "10001".to_string(),
        country: "US".to_string(),
        national_id: None,
    }
}

#[tokio::test]
async fn register_assigns_active_status_and_zero_counts() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("a@x.com")).await.unwrap();
    assert_eq!(client.status, "ACTIVE");
    assert_eq!(client.account_count, 0);
    assert_eq!(client.verification_count, 0);
    assert!(client.encrypted_national_id.is_none());
}

#[tokio::test]
async fn duplicate_contact_is_rejected_case_insensitively() {
    let (ctx, _dir) = ctx().await;
    ctx.registry.register(client_input("a@x.com")).await.unwrap();

    let err = ctx
        .registry
        .register(client_input("A@X.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateContact(_)));
}

#[tokio::test]
async fn national_id_is_stored_sealed_and_reveals_to_plaintext() {
    let (ctx, _dir) = ctx().await;
    let mut input = client_input("pii@x.com");
    input.national_id = Some("123456789".to_string());

    let client = ctx.registry.register(input).await.unwrap();
    let blob = client.encrypted_national_id.expect("blob stored");
    assert!(blob.starts_with("v1:"));
    assert!(!blob.contains("123456789"));

    let revealed = ctx.registry.reveal_national_id(&client.id).await.unwrap();
    assert_eq!(revealed.as_deref(), Some("123456789"));
}

#[tokio::test]
async fn reveal_is_none_when_never_collected() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("none@x.com")).await.unwrap();
    assert_eq!(ctx.registry.reveal_national_id(&client.id).await.unwrap(), None);
}

#[tokio::test]
async fn update_applies_only_present_fields() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("u@x.com")).await.unwrap();

    let updated = ctx
        .registry
        .update(
            &client.id,
            ClientPatch {
                phone: Some("+15559990000".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.phone, "+15559990000");
    assert_eq!(updated.first_name, client.first_name);
    assert_eq!(updated.email, client.email);
    assert_eq!(updated.status, "ACTIVE");
}

#[tokio::test]
async fn status_toggle_is_unrestricted() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("s@x.com")).await.unwrap();

    for status in [
        ClientStatus::Suspended,
        ClientStatus::Active,
        ClientStatus::Inactive,
        ClientStatus::Active,
    ] {
        let updated = ctx
            .registry
            .update(
                &client.id,
                ClientPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, status.as_str());
    }
}

#[tokio::test]
async fn update_unknown_id_is_not_found() {
    let (ctx, _dir) = ctx().await;
    let err = ctx
        .registry
        .update("no-such-id", ClientPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn list_supports_search_status_and_pagination() {
    let (ctx, _dir) = ctx().await;
    let mut alice = client_input("alice@wonder.org");
    alice.first_name = "Alice".to_string();
    let mut bob = client_input("bob@builder.net");
    bob.first_name = "Bob".to_string();
    let mut carol = client_input("carol@x.com");
    carol.first_name = "Carol".to_string();

    ctx.registry.register(alice).await.unwrap();
    let bob = ctx.registry.register(bob).await.unwrap();
    ctx.registry.register(carol).await.unwrap();

    // Case-insensitive substring over name/email.
    let (rows, total) = ctx
        .registry
        .list(
            &ClientFilter {
                search: Some("WONDER".to_string()),
                status: None,
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].first_name, "Alice");

    // Exact status match.
    ctx.registry
        .update(
            &bob.id,
            ClientPatch {
                status: Some(ClientStatus::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (rows, total) = ctx
        .registry
        .list(
            &ClientFilter {
                search: None,
                status: Some(ClientStatus::Suspended),
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, bob.id);

    // Pagination: page size 2 over 3 rows, total unaffected.
    let (page1, total) = ctx
        .registry
        .list(&ClientFilter::default(), Page { limit: 2, offset: 0 })
        .await
        .unwrap();
    let (page2, _) = ctx
        .registry
        .list(&ClientFilter::default(), Page { limit: 2, offset: 2 })
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 1);
    assert!(page1.iter().all(|c| c.id != page2[0].id));
}

#[tokio::test]
async fn remove_is_refused_while_accounts_exist() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("del@x.com")).await.unwrap();
    let site = ctx
        .catalog
        .create(onboardd::catalog::NewWebsite {
            name: "Site".to_string(),
            url: "https://site.example".to_string(),
            category: "survey".to_string(),
            config: "{}".to_string(),
            is_active: true,
        })
        .await
        .unwrap();
    ctx.ledger.get_or_create(&client.id, &site.id).await.unwrap();

    let err = ctx.registry.remove(&client.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    // Still present.
    assert!(ctx.registry.get(&client.id).await.is_ok());
}

#[tokio::test]
async fn remove_succeeds_with_zero_accounts_and_cleans_verifications() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("gone@x.com")).await.unwrap();
    ctx.storage
        .insert_verification(&client.id, "document", "PASSED")
        .await
        .unwrap();

    ctx.registry.remove(&client.id).await.unwrap();

    let err = ctx.registry.get(&client.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert!(ctx
        .storage
        .list_verifications_for_client(&client.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn detail_joins_accounts_events_and_verifications() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("detail@x.com")).await.unwrap();
    let site = ctx
        .catalog
        .create(onboardd::catalog::NewWebsite {
            name: "Detail Site".to_string(),
            url: "https://detail.example".to_string(),
            category: "cashback".to_string(),
            config: "{}".to_string(),
            is_active: true,
        })
        .await
        .unwrap();
    ctx.ledger.get_or_create(&client.id, &site.id).await.unwrap();
    ctx.storage
        .insert_verification(&client.id, "selfie", "PASSED")
        .await
        .unwrap();

    let detail = ctx.registry.detail(&client.id).await.unwrap();
    assert_eq!(detail.client.account_count, 1);
    assert_eq!(detail.client.verification_count, 1);
    assert_eq!(detail.accounts.len(), 1);
    // Creation event rides along.
    assert_eq!(detail.accounts[0].events.len(), 1);
    assert_eq!(detail.verifications.len(), 1);
    assert_eq!(detail.verifications[0].kind, "selfie");
}
