mod common;

use common::{names, raw, Event, FakeApi, RecordingObserver};
use contactbook_core::{
    CacheLookupError, ContactDraft, ContactId, DirectoryConfig, DirectoryCore, DirectoryError,
    ErrorKind, InvalidField, Presentation, RefreshState,
};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    api: Arc<FakeApi>,
    observer: Arc<RecordingObserver>,
    core: Arc<DirectoryCore>,
}

async fn loaded_core() -> Fixture {
    let api = Arc::new(FakeApi::with_records(vec![
        raw(1, "Bob", None),
        raw(2, "Ann", Some("friend")),
    ]));
    let observer = Arc::new(RecordingObserver::default());
    let core = Arc::new(DirectoryCore::new(
        api.clone(),
        observer.clone(),
        &DirectoryConfig::default(),
    ));
    core.load().await.unwrap();
    Fixture {
        api,
        observer,
        core,
    }
}

#[tokio::test(start_paused = true)]
async fn initial_load_failure_is_fatal() {
    let api = Arc::new(FakeApi::default());
    api.fail_with(Some(503));
    let observer = Arc::new(RecordingObserver::default());
    let core = DirectoryCore::new(api, observer.clone(), &DirectoryConfig::default());

    let err = core.load().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);

    let failures = observer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].presentation, Presentation::Fatal);
    assert!(failures[0]
        .user_message
        .as_deref()
        .unwrap()
        .starts_with("Please reload the page"));
}

#[tokio::test(start_paused = true)]
async fn invalid_draft_is_rejected_before_any_request() {
    let fixture = loaded_core().await;
    let draft = ContactDraft::new("X").with_email("not-an-email");

    let err = fixture.core.create_contact(&draft).await.unwrap_err();
    match err {
        DirectoryError::Validation(validation) => assert_eq!(
            validation.fields(),
            &[InvalidField::FullName, InvalidField::Email]
        ),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(fixture.api.write_calls(), 0);

    let failures = fixture.observer.failures();
    assert_eq!(failures[0].presentation, Presentation::Inline);
    assert_eq!(
        failures[0].user_message.as_deref(),
        Some("These fields have invalid values: Full name, Email")
    );
}

#[tokio::test(start_paused = true)]
async fn create_refetches_directory_and_confirms() {
    let fixture = loaded_core().await;
    let draft = ContactDraft::from_form("Cy Young", "cy@example.com", "", &[], "work");

    let created = fixture.core.create_contact(&draft).await.unwrap().unwrap();
    assert_eq!(created.full_name(), "Cy Young");

    assert_eq!(fixture.core.snapshot().generation(), 2);
    assert_eq!(
        names(&fixture.core.visible_contacts()),
        vec!["Ann", "Bob", "Cy Young"]
    );
    assert_eq!(
        fixture.core.tag_vocabulary().to_vec(),
        vec!["friend".to_string(), "work".to_string()]
    );
    assert_eq!(
        fixture.observer.messages(),
        vec!["New contact added: Cy Young".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn update_and_delete_confirm_with_contact_name() {
    let fixture = loaded_core().await;
    let id = ContactId::Number(1);

    let existing = fixture.core.contact_for_edit(&id).unwrap();
    let draft = ContactDraft::new("Bobby Tables").with_tags(existing.tags());
    fixture.core.update_contact(&id, &draft).await.unwrap();
    assert_eq!(
        fixture.core.contact_for_edit(&id).unwrap().full_name(),
        "Bobby Tables"
    );

    fixture.core.delete_contact(&id).await.unwrap();
    assert_eq!(
        fixture.core.contact_for_edit(&id),
        Err(CacheLookupError::NotFound(id.clone()))
    );
    assert_eq!(
        fixture.observer.messages(),
        vec![
            "Contact updated: Bobby Tables".to_string(),
            "Contact deleted: Bobby Tables".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_inline_and_leaves_cache_untouched() {
    let fixture = loaded_core().await;
    fixture.api.fail_with(Some(500));

    let err = fixture
        .core
        .create_contact(&ContactDraft::new("Cy Young"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(fixture.core.snapshot().generation(), 1);
    assert_eq!(fixture.api.fetch_calls(), 1);

    let failures = fixture.observer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].presentation, Presentation::Inline);
    assert_eq!(
        failures[0].user_message.as_deref(),
        Some("Request failed: 500 Internal Server Error: boom")
    );
    assert!(fixture.observer.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_write_resolves_aborted_as_notice() {
    let fixture = loaded_core().await;
    fixture.api.set_write_delay(Duration::from_secs(10));

    let pending = {
        let core = Arc::clone(&fixture.core);
        tokio::spawn(async move { core.delete_contact(&ContactId::Number(2)).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    fixture.core.cancel_pending_write();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Aborted);
    assert_eq!(fixture.core.snapshot().generation(), 1);
    assert_eq!(fixture.api.fetch_calls(), 1);

    let failures = fixture.observer.failures();
    assert_eq!(failures[0].presentation, Presentation::Notice);
    assert_eq!(failures[0].user_message.as_deref(), Some("Request aborted."));

    // A fresh token lets the next write go through.
    fixture.api.set_write_delay(Duration::ZERO);
    fixture
        .core
        .delete_contact(&ContactId::Number(2))
        .await
        .unwrap();
    assert_eq!(names(&fixture.core.visible_contacts()), vec!["Bob"]);
}

#[tokio::test(start_paused = true)]
async fn tag_toggles_and_return_to_list_notify_renderer() {
    let fixture = loaded_core().await;

    fixture.core.toggle_tag("Friend", true);
    assert_eq!(names(&fixture.core.visible_contacts()), vec!["Ann"]);

    fixture.core.search_text_changed("bo");
    fixture.core.return_to_list();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(fixture.core.criteria().is_unfiltered());
    assert_eq!(
        fixture.observer.criteria_events(),
        vec![
            (String::new(), vec!["Ann".to_string()]),
            (String::new(), vec!["Ann".to_string(), "Bob".to_string()]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_picks_up_remote_changes_until_shutdown() {
    let fixture = loaded_core().await;
    assert!(fixture.core.start_refresh());
    assert!(!fixture.core.start_refresh());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(fixture.api.fetch_calls(), 2);
    assert!(fixture
        .observer
        .events()
        .iter()
        .any(|event| matches!(event, Event::Replaced { generation: 2, .. })));

    fixture.core.shutdown().await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(fixture.api.fetch_calls(), 2);
    assert_eq!(fixture.core.refresh_state(), RefreshState::Idle);
}
