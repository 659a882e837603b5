//! Aggregation engine integration tests.

use onboardd::catalog::NewWebsite;
use onboardd::config::OnboardConfig;
use onboardd::ledger::RegistrationStep;
use onboardd::registry::NewClient;
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
        first_name: "Demo".to_string(),
        last_name: "Client".to_string(),
        email: email.to_string(),
        phone: "+15557778888".to_string(),
        date_of_birth: "1991-07-01".to_string(),
        address: "4 Oak Ave".to_string(),
        city: "Denver".to_string(),
        state: "CO".to_string(),
        zip_code: "80014".to_string(),
        country: "US".to_string(),
        national_id: None,
    }
}

async fn seed_website(ctx: &AppContext, name: &str) -> String {
    ctx.catalog
        .create(NewWebsite {
            name: name.to_string(),
            url: format!("https://{}.example", name.to_lowercase()),
            category: "survey".to_string(),
            config: "{}".to_string(),
            is_active: true,
        })
        .await
        .unwrap()
        .id
}

/// Walk a record PENDING -> IN_PROGRESS -> SUBMITTED -> COMPLETED.
async fn complete(ctx: &AppContext, account_id: &str) {
    for step in [
        RegistrationStep::InProgress,
        RegistrationStep::Submitted,
        RegistrationStep::Completed,
    ] {
        ctx.ledger.transition(account_id, step, "test walk").await.unwrap();
    }
}

#[tokio::test]
async fn completion_rate_is_zero_on_empty_ledger() {
    let (ctx, _dir) = ctx().await;
    let stats = ctx.dashboard.stats().await.unwrap();
    assert_eq!(stats.total_accounts, 0);
    assert_eq!(stats.completion_rate, 0.0);
    assert!(stats.completion_rate.is_finite());
}

#[tokio::test]
async fn end_to_end_scenario_counts_and_rate() {
    let (ctx, _dir) = ctx().await;

    // Register; duplicate contact is refused.
    let client = ctx.registry.register(client_input("a@x.com")).await.unwrap();
    assert!(matches!(
        ctx.registry.register(client_input("a@x.com")).await.unwrap_err(),
        CoreError::DuplicateContact(_)
    ));

    // Onboard against {W1, W2} — two fresh PENDING records.
    let w1 = seed_website(&ctx, "W1").await;
    let w2 = seed_website(&ctx, "W2").await;
    let outcomes = ctx
        .orchestrator
        .start_onboarding(&client.id, &[w1.clone(), w2])
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.created && o.account.status == "PENDING"));

    // Drive W1's record through to COMPLETED.
    let w1_account = outcomes
        .iter()
        .find(|o| o.account.website_id == w1)
        .unwrap();
    complete(&ctx, &w1_account.account.id).await;

    let stats = ctx.dashboard.stats().await.unwrap();
    assert_eq!(stats.active_clients, 1);
    assert_eq!(stats.active_websites, 2);
    assert_eq!(stats.total_accounts, 2);
    assert_eq!(stats.pending_accounts, 1);
    assert_eq!(stats.completed_accounts, 1);
    assert_eq!(stats.failed_accounts, 0);
    assert_eq!(stats.completion_rate, 50.0);
}

#[tokio::test]
async fn completion_rate_rounds_to_one_decimal() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("rate@x.com")).await.unwrap();

    // 10 accounts, 3 completed -> 30.0.
    let mut accounts = Vec::new();
    for i in 0..10 {
        let site = seed_website(&ctx, &format!("Rate{i}")).await;
        let (account, _) = ctx.ledger.get_or_create(&client.id, &site).await.unwrap();
        accounts.push(account);
    }
    for account in accounts.iter().take(3) {
        complete(&ctx, &account.id).await;
    }

    let stats = ctx.dashboard.stats().await.unwrap();
    assert_eq!(stats.total_accounts, 10);
    assert_eq!(stats.completed_accounts, 3);
    assert_eq!(stats.completion_rate, 30.0);
}

#[tokio::test]
async fn inactive_entities_drop_out_of_the_headline_counts() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("inact@x.com")).await.unwrap();
    let site = seed_website(&ctx, "Headline").await;

    ctx.registry
        .update(
            &client.id,
            onboardd::registry::ClientPatch {
                status: Some(onboardd::registry::ClientStatus::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    ctx.catalog
        .update(
            &site,
            onboardd::catalog::WebsitePatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stats = ctx.dashboard.stats().await.unwrap();
    assert_eq!(stats.active_clients, 0);
    assert_eq!(stats.active_websites, 0);
}

#[tokio::test]
async fn recent_events_join_display_names_newest_first() {
    let (ctx, _dir) = ctx().await;
    let client = ctx.registry.register(client_input("feed@x.com")).await.unwrap();
    let site = seed_website(&ctx, "Feed Site").await;
    let (account, _) = ctx.ledger.get_or_create(&client.id, &site).await.unwrap();
    ctx.ledger
        .transition(&account.id, RegistrationStep::InProgress, "picked up")
        .await
        .unwrap();

    let feed = ctx.dashboard.recent_events().await.unwrap();
    // Creation event + transition event, transition first.
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].to_step.as_deref(), Some("IN_PROGRESS"));
    assert_eq!(feed[0].client_first_name, "Demo");
    assert_eq!(feed[0].website_name, "Feed Site");
    assert!(feed[0].created_at >= feed[1].created_at);
}
