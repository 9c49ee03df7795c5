mod common;

use chrono::{TimeZone, Utc};
use common::{lead, service, Call, RecordingTransport};
use console_sync::controller::{FormController, FormMode, SubmitOutcome};
use console_sync::error::SyncError;
use console_sync::model::{EntityKind, Record, Scope};
use console_sync::notify::Severity;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).unwrap()
}

#[tokio::test]
async fn form_closes_only_after_success() {
    let transport = RecordingTransport::with_responses(vec![
        Err(SyncError::Status {
            status: 500,
            message: "db down".into(),
        }),
        Ok(json!({ "data": { "_id": "p1" } })),
    ]);
    let (svc, notes) = service(transport.clone());
    let mut form = FormController::new(svc.clone(), EntityKind::Project, Scope::Root, None);
    assert_eq!(form.mode(), &FormMode::Create);

    let values = json!({ "projectName": "Solar roof" });
    let outcome = form.submit(values.clone(), None).await;
    assert!(matches!(outcome, SubmitOutcome::Failed(SyncError::Status { .. })));
    assert!(form.is_open());
    assert_eq!(svc.store().slice(EntityKind::Project).version(), 0);

    let outcome = form.submit(values, None).await;
    assert!(outcome.is_closed());
    assert!(!form.is_open());
    assert_eq!(svc.store().slice(EntityKind::Project).version(), 1);
    assert_eq!(
        notes.messages(Severity::Error),
        vec!["Project could not create."]
    );
    assert_eq!(
        notes.messages(Severity::Success),
        vec!["Project created successfully."]
    );
}

#[tokio::test]
async fn validation_errors_stay_on_the_form() {
    let transport = RecordingTransport::default();
    let (svc, _) = service(transport.clone());
    let mut form = FormController::new(svc, EntityKind::Project, Scope::Root, None);

    let outcome = form.submit(json!({ "projectName": "" }), None).await;
    assert!(!outcome.is_closed());
    assert!(form.is_open());
    assert_eq!(
        form.errors().get("projectName"),
        Some("Project name is required")
    );
    assert!(transport.calls().await.is_empty());

    form.cancel();
    assert!(form.errors().is_empty());
    assert!(!form.is_open());
}

#[tokio::test]
async fn edit_without_new_file_keeps_image_url() {
    let transport = RecordingTransport::default();
    let (svc, _) = service(transport.clone());
    let existing = record(json!({
        "_id": "l1",
        "imageUrl": "https://cdn/old.png",
        "contactInformation": { "firstName": "Jane", "email": "jane@x.com" }
    }));
    let mut form = FormController::new(svc, EntityKind::Lead, Scope::Root, Some(existing));

    let now = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
    let initial = form.initial_values(now);
    assert_eq!(initial["contactInformation"]["firstName"], "Jane");
    assert_eq!(initial["contactInformation"]["lastName"], "");
    assert_eq!(initial["startDate"], "2024-05-02T08:00:00.000Z");

    let values = json!({ "contactInformation": { "firstName": "Janet" } });
    assert!(form.submit(values, None).await.is_closed());

    let calls = transport.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path(), "api/v1/lead/l1/update");
    let body = calls[0].body().unwrap();
    assert_eq!(body["imageUrl"], "https://cdn/old.png");
    assert_eq!(body["contactInformation"]["firstName"], "Janet");
}

#[tokio::test]
async fn edited_values_apply_changes_over_record() {
    let (svc, _) = service(RecordingTransport::default());
    let form = FormController::new(
        svc,
        EntityKind::Lead,
        Scope::Root,
        Some(record(lead("l1", "Jane"))),
    );
    let now = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
    let values = form.edited_values(now, &json!({ "contactInformation": { "lastName": "Roe" } }));
    assert_eq!(values["contactInformation"]["firstName"], "Jane");
    assert_eq!(values["contactInformation"]["lastName"], "Roe");
    assert_eq!(values["projectType"], "Electrical");
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let transport = RecordingTransport::default();
    let (svc, notes) = service(transport.clone());
    let mut form = FormController::new(
        svc,
        EntityKind::Contact,
        Scope::Root,
        Some(record(json!({ "_id": "c1" }))),
    );

    let deleted = form.delete(&|_: &str| false).await.unwrap();
    assert!(deleted.is_none());
    assert!(form.is_open());
    assert!(transport.calls().await.is_empty());
    assert!(notes.all().is_empty());
}

#[tokio::test]
async fn confirmed_delete_uses_delete_verb_and_closes() {
    let transport = RecordingTransport::with_responses(vec![Ok(json!({ "data": { "_id": "c1" } }))]);
    let (svc, _) = service(transport.clone());
    let mut form = FormController::new(
        svc.clone(),
        EntityKind::Contact,
        Scope::Root,
        Some(record(json!({ "_id": "c1" }))),
    );

    let asked = std::cell::RefCell::new(Vec::new());
    let confirm = |prompt: &str| {
        asked.borrow_mut().push(prompt.to_string());
        true
    };
    let deleted = form.delete(&confirm).await.unwrap();
    assert_eq!(deleted, Some(json!({ "data": { "_id": "c1" } })));
    assert!(!form.is_open());
    assert_eq!(
        asked.into_inner(),
        vec!["Are you sure you want to delete this Contact?"]
    );
    assert_eq!(
        transport.calls().await,
        vec![Call::Delete {
            path: "api/v1/contact/c1/delete".into()
        }]
    );
    assert_eq!(svc.store().slice(EntityKind::Contact).version(), 1);
}

#[tokio::test]
async fn create_mode_has_nothing_to_delete() {
    let transport = RecordingTransport::default();
    let (svc, _) = service(transport.clone());
    let mut form = FormController::new(svc, EntityKind::Customer, Scope::Root, None);
    assert!(form.delete(&|_: &str| true).await.unwrap().is_none());
    assert!(transport.calls().await.is_empty());
}
