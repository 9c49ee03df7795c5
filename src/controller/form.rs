use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::http::{Attachment, Transport};
use crate::model::{EntityKind, Record, Scope};
use crate::notify::Notifier;
use crate::schema::ValidationErrors;
use crate::service::{EntityService, IMAGE_URL_FIELD};

/// Asks the user before a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create,
    Edit(Record),
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// The mutation succeeded and the dialog closed.
    Closed(Value),
    /// Nothing changed remotely; the dialog stays open.
    Failed(SyncError),
}

impl SubmitOutcome {
    pub fn is_closed(&self) -> bool {
        matches!(self, SubmitOutcome::Closed(_))
    }
}

fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Blank form for `kind`. Date fields start at `now`.
pub fn defaults(kind: EntityKind, now: DateTime<Utc>) -> Value {
    let now = timestamp(now);
    match kind {
        EntityKind::Lead | EntityKind::Contact => json!({
            "priorityLevel": "",
            "companyType": "",
            "leadOwner": "",
            "startDate": now,
            "endDate": now,
            "contactInformation": {
                "firstName": "",
                "lastName": "",
                "company": "",
                "companyNumber": "",
                "industry": "",
                "address": "",
                "phone1": "",
                "phone2": "",
                "email": ""
            },
            "projectType": "",
            "projectSize": "",
            "budgetEstimate": "",
            "currency": "GBP",
            "expectedStart": now,
            "expectedCompletion": null
        }),
        EntityKind::Project => json!({
            "projectName": "",
            "clientName": "",
            "asignTo": "",
            "asignBy": "",
            "startDate": now,
            "endDate": null,
            "description": "",
            "status": "pending"
        }),
        EntityKind::Customer => json!({
            "name": "",
            "email": "",
            "phone": "",
            "age": "",
            "address": "",
            "country": "",
            "zipCode": "",
            "web": "",
            "description": "",
            "status": "pending"
        }),
        EntityKind::CalendarEvent => json!({
            "title": "",
            "allDay": false,
            "start": now,
            "end": now
        }),
        EntityKind::Board | EntityKind::Task => json!({ "title": "" }),
        EntityKind::Role => json!({ "name": "" }),
        _ => json!({}),
    }
}

/// Copy `over` onto `base`, descending into objects present on both sides.
fn overlay(base: &mut Value, over: &Value) {
    match (base, over) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(key) {
                    Some(slot) if slot.is_object() && value.is_object() => overlay(slot, value),
                    Some(slot) => *slot = value.clone(),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, over) => *base = over.clone(),
    }
}

/// Create/edit form for one record.
pub struct FormController<T: ?Sized, N: ?Sized> {
    service: EntityService<T, N>,
    kind: EntityKind,
    scope: Scope,
    mode: FormMode,
    errors: ValidationErrors,
    open: bool,
}

impl<T, N> FormController<T, N>
where
    T: Transport + ?Sized,
    N: Notifier + ?Sized,
{
    /// Edit mode when `record` is given, create mode otherwise.
    pub fn new(
        service: EntityService<T, N>,
        kind: EntityKind,
        scope: Scope,
        record: Option<Record>,
    ) -> Self {
        let mode = match record {
            Some(record) => FormMode::Edit(record),
            None => FormMode::Create,
        };
        Self {
            service,
            kind,
            scope,
            mode,
            errors: ValidationErrors::default(),
            open: true,
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Field errors from the last submit.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn initial_values(&self, now: DateTime<Utc>) -> Value {
        let mut values = defaults(self.kind, now);
        if let FormMode::Edit(record) = &self.mode {
            overlay(&mut values, &record.clone().into_value());
        }
        values
    }

    /// Initial values with the user's `changes` applied on top.
    pub fn edited_values(&self, now: DateTime<Utc>, changes: &Value) -> Value {
        let mut values = self.initial_values(now);
        overlay(&mut values, changes);
        values
    }

    fn record_id(&self, record: &Record) -> Result<String> {
        record.id().ok_or_else(|| SyncError::Decode {
            entity: self.kind,
            reason: "record has no id".into(),
        })
    }

    /// Validate and send. Only a successful mutation closes the form.
    pub async fn submit(
        &mut self,
        values: Value,
        attachment: Option<Attachment>,
    ) -> SubmitOutcome {
        self.errors = ValidationErrors::default();
        let result = match &self.mode {
            FormMode::Create => {
                self.service
                    .create_with_attachment(self.kind, &self.scope, values, attachment)
                    .await
            }
            FormMode::Edit(record) => match self.record_id(record) {
                Ok(id) => {
                    let mut values = values;
                    if attachment.is_none() {
                        keep_image_url(&mut values, record);
                    }
                    self.service
                        .update_with_attachment(self.kind, &self.scope, &id, values, attachment)
                        .await
                }
                Err(err) => Err(err),
            },
        };
        match result {
            Ok(body) => {
                info!(entity = %self.kind, "form submitted");
                self.open = false;
                SubmitOutcome::Closed(body)
            }
            Err(err) => {
                if let SyncError::Validation(errors) = &err {
                    self.errors = errors.clone();
                }
                debug!(entity = %self.kind, error = %err, "form stays open");
                SubmitOutcome::Failed(err)
            }
        }
    }

    /// Delete the edited record after confirmation. `Ok(None)` when declined or
    /// in create mode; nothing is sent then.
    pub async fn delete(&mut self, confirm: &dyn Confirm) -> Result<Option<Value>> {
        let FormMode::Edit(record) = &self.mode else {
            return Ok(None);
        };
        let id = self.record_id(record)?;
        let prompt = format!("Are you sure you want to delete this {}?", self.kind.label());
        if !confirm.confirm(&prompt) {
            debug!(entity = %self.kind, %id, "delete declined");
            return Ok(None);
        }
        let body = self.service.delete(self.kind, &self.scope, &id).await?;
        self.open = false;
        Ok(Some(body))
    }

    pub fn cancel(&mut self) {
        self.errors = ValidationErrors::default();
        self.open = false;
    }
}

/// Without a new file the record's current image stays.
fn keep_image_url(values: &mut Value, record: &Record) {
    let Some(url) = record.get(IMAGE_URL_FIELD) else {
        return;
    };
    if let Value::Object(map) = values {
        if map.get(IMAGE_URL_FIELD).map_or(true, Value::is_null) {
            map.insert(IMAGE_URL_FIELD.to_string(), url.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn lead_defaults_start_dates_now() {
        let values = defaults(EntityKind::Lead, now());
        assert_eq!(values["startDate"], "2024-03-01T09:30:00.000Z");
        assert_eq!(values["expectedStart"], "2024-03-01T09:30:00.000Z");
        assert_eq!(values["expectedCompletion"], Value::Null);
        assert_eq!(values["currency"], "GBP");
    }

    #[test]
    fn overlay_keeps_defaults_for_missing_nested_fields() {
        let mut values = defaults(EntityKind::Lead, now());
        let record = json!({
            "_id": "l1",
            "contactInformation": { "firstName": "Jane" },
            "currency": "EUR"
        });
        overlay(&mut values, &record);
        assert_eq!(values["_id"], "l1");
        assert_eq!(values["contactInformation"]["firstName"], "Jane");
        assert_eq!(values["contactInformation"]["lastName"], "");
        assert_eq!(values["currency"], "EUR");
    }

    #[test]
    fn image_url_kept_unless_replaced() {
        let record =
            Record::from_value(json!({ "_id": "1", "imageUrl": "https://cdn/old.png" })).unwrap();
        let mut values = json!({ "name": "x" });
        keep_image_url(&mut values, &record);
        assert_eq!(values["imageUrl"], "https://cdn/old.png");

        let mut values = json!({ "imageUrl": "https://cdn/new.png" });
        keep_image_url(&mut values, &record);
        assert_eq!(values["imageUrl"], "https://cdn/new.png");
    }
}
