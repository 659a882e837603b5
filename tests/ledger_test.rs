//! Ledger integration tests — record creation, the registration state
//! machine against real storage, and retry semantics.

use onboardd::catalog::NewWebsite;
use onboardd::config::OnboardConfig;
use onboardd::ledger::{AccountStatus, RegistrationStep};
use onboardd::registry::NewClient;
use onboardd::{AppContext, CoreError};
use tempfile::TempDir;

async fn ctx() -> (AppContext, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = OnboardConfig::new(Some(dir.path().to_path_buf()), Some("warn".to_string()));
    let ctx = AppContext::init(config).await.unwrap();
    (ctx, dir)
}

/// Seed one client and one active website; return (client_id, website_id).
async fn seed(ctx: &AppContext) -> (String, String) {
    let client = ctx
        .registry
        .register(NewClient {
            first_name: "Lin".to_string(),
            last_name: "Mei".to_string(),
            email: "lin@x.com".to_string(),
            phone: "+15553334444".to_string(),
            date_of_birth: "1992-03-14".to_string(),
            address: "9 Elm St".to_string(),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            zip_code: "73301".to_string(),
            country: "US".to_string(),
            national_id: None,
        })
        .await
        .unwrap();
    let website = ctx
        .catalog
        .create(NewWebsite {
            name: "Ledger Site".to_string(),
            url: "https://ledger.example".to_string(),
            category: "survey".to_string(),
            config: "{}".to_string(),
            is_active: true,
        })
        .await
        .unwrap();
    (client.id, website.id)
}

#[tokio::test]
async fn creation_starts_pending_with_one_creation_event() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;

    let (account, created) = ctx.ledger.get_or_create(&client, &website).await.unwrap();
    assert!(created);
    assert_eq!(account.registration_step, "PENDING");
    assert_eq!(account.status, "PENDING");

    let events = ctx.ledger.events(&account.id, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].from_step, None);
    assert_eq!(events[0].to_step.as_deref(), Some("PENDING"));
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;

    let (first, created) = ctx.ledger.get_or_create(&client, &website).await.unwrap();
    assert!(created);
    let (second, created) = ctx.ledger.get_or_create(&client, &website).await.unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);
    // No extra creation event on the second call.
    assert_eq!(ctx.ledger.events(&first.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_or_create_requires_existing_client_and_website() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;

    assert!(matches!(
        ctx.ledger.get_or_create("ghost", &website).await.unwrap_err(),
        CoreError::NotFound { entity: "client", .. }
    ));
    assert!(matches!(
        ctx.ledger.get_or_create(&client, "ghost").await.unwrap_err(),
        CoreError::NotFound { entity: "website", .. }
    ));
}

#[tokio::test]
async fn happy_path_walks_the_chain_with_one_event_per_transition() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;
    let (account, _) = ctx.ledger.get_or_create(&client, &website).await.unwrap();

    let a = ctx
        .ledger
        .transition(&account.id, RegistrationStep::InProgress, "automation picked up")
        .await
        .unwrap();
    assert_eq!(a.registration_step, "IN_PROGRESS");
    assert_eq!(a.status, "PENDING");

    let a = ctx
        .ledger
        .transition(&account.id, RegistrationStep::Submitted, "form submitted")
        .await
        .unwrap();
    assert_eq!(a.registration_step, "SUBMITTED");
    assert_eq!(a.status, "PENDING");

    let a = ctx
        .ledger
        .transition(&account.id, RegistrationStep::Completed, "confirmation email received")
        .await
        .unwrap();
    assert_eq!(a.registration_step, "COMPLETED");
    assert_eq!(a.status, "COMPLETED");

    // 1 creation + 3 transitions, newest first.
    let events = ctx.ledger.events(&account.id, 10).await.unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].to_step.as_deref(), Some("COMPLETED"));
    assert!(events[0].message.contains("confirmation email received"));
}

#[tokio::test]
async fn off_graph_transitions_are_rejected() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;
    let (account, _) = ctx.ledger.get_or_create(&client, &website).await.unwrap();

    // From PENDING only IN_PROGRESS is reachable.
    for to in [
        RegistrationStep::Submitted,
        RegistrationStep::Completed,
        RegistrationStep::Failed,
        RegistrationStep::Pending,
    ] {
        assert!(matches!(
            ctx.ledger.transition(&account.id, to, "skip").await.unwrap_err(),
            CoreError::InvalidTransition { .. }
        ));
    }

    // Terminal states have no transition exits at all.
    ctx.ledger
        .transition(&account.id, RegistrationStep::InProgress, "x")
        .await
        .unwrap();
    ctx.ledger
        .transition(&account.id, RegistrationStep::Submitted, "x")
        .await
        .unwrap();
    ctx.ledger
        .transition(&account.id, RegistrationStep::Completed, "x")
        .await
        .unwrap();
    for to in [
        RegistrationStep::Pending,
        RegistrationStep::InProgress,
        RegistrationStep::Submitted,
        RegistrationStep::Failed,
    ] {
        assert!(matches!(
            ctx.ledger.transition(&account.id, to, "undo").await.unwrap_err(),
            CoreError::InvalidTransition { .. }
        ));
    }

    // Rejected attempts never append events: 1 creation + 3 valid moves.
    assert_eq!(ctx.ledger.events(&account.id, 20).await.unwrap().len(), 4);
}

#[tokio::test]
async fn transition_on_unknown_account_is_not_found() {
    let (ctx, _dir) = ctx().await;
    assert!(matches!(
        ctx.ledger
            .transition("ghost", RegistrationStep::InProgress, "x")
            .await
            .unwrap_err(),
        CoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn retry_moves_failed_back_to_pending_with_one_event() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;
    let (account, _) = ctx.ledger.get_or_create(&client, &website).await.unwrap();

    ctx.ledger
        .transition(&account.id, RegistrationStep::InProgress, "x")
        .await
        .unwrap();
    ctx.ledger
        .transition(&account.id, RegistrationStep::Submitted, "x")
        .await
        .unwrap();
    ctx.ledger
        .transition(&account.id, RegistrationStep::Failed, "captcha wall")
        .await
        .unwrap();

    let before = ctx.ledger.events(&account.id, 20).await.unwrap().len();
    let retried = ctx.ledger.retry(&account.id).await.unwrap();
    assert_eq!(retried.registration_step, "PENDING");
    assert_eq!(retried.status, "PENDING");
    let after = ctx.ledger.events(&account.id, 20).await.unwrap();
    assert_eq!(after.len(), before + 1);
    assert!(after[0].message.contains("retry"));
}

#[tokio::test]
async fn retry_is_a_noop_on_non_failed_records() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;
    let (account, _) = ctx.ledger.get_or_create(&client, &website).await.unwrap();

    let before = ctx.ledger.events(&account.id, 20).await.unwrap().len();
    let same = ctx.ledger.retry(&account.id).await.unwrap();
    assert_eq!(same.id, account.id);
    assert_eq!(same.registration_step, "PENDING");
    assert_eq!(same.updated_at, account.updated_at);
    // No event appended.
    assert_eq!(ctx.ledger.events(&account.id, 20).await.unwrap().len(), before);
}

#[tokio::test]
async fn list_by_website_filters_on_coarse_status() {
    let (ctx, _dir) = ctx().await;
    let (client, website) = seed(&ctx).await;
    let (account, _) = ctx.ledger.get_or_create(&client, &website).await.unwrap();

    let pending = ctx
        .ledger
        .list_by_website(&website, Some(AccountStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, account.id);

    let completed = ctx
        .ledger
        .list_by_website(&website, Some(AccountStatus::Completed))
        .await
        .unwrap();
    assert!(completed.is_empty());
}
