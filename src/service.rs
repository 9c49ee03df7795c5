//! Data-access operations: one HTTP call per intent, then a slice update and a
//! notification.
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::envelope::{self, Analytics};
use crate::error::{Result, SyncError};
use crate::http::{Attachment, FilePart, Transport};
use crate::model::{EntityKind, Record, ResourcePath, Scope};
use crate::notify::{Notification, Notifier};
use crate::pagination::PageRequest;
use crate::schema::{self, schema_for};
use crate::store::{Applied, Store, UploadKey};

/// Field the uploaded attachment URL is stored under.
pub const IMAGE_URL_FIELD: &str = "imageUrl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Update,
    Delete,
    AddNote,
    DeleteNote,
    DeleteFile,
    UpdateStatus,
    UploadDocuments,
}

impl Action {
    /// (subject suffix, past tense, verb)
    fn words(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Action::Create => ("", "created", "create"),
            Action::Update => ("", "updated", "update"),
            Action::Delete => ("", "deleted", "delete"),
            Action::AddNote => (" note", "added", "add"),
            Action::DeleteNote => (" note", "deleted", "delete"),
            Action::DeleteFile => (" file", "deleted", "delete"),
            Action::UpdateStatus => (" status", "updated", "update"),
            Action::UploadDocuments => (" documents", "uploaded", "upload"),
        }
    }

    fn success(self, kind: EntityKind) -> String {
        let (subject, done, _) = self.words();
        format!("{}{subject} {done} successfully.", kind.label())
    }

    fn failure(self, kind: EntityKind) -> String {
        let (subject, _, verb) = self.words();
        format!("{}{subject} could not {verb}.", kind.label())
    }
}

/// Entity operations bound to one store, transport and notifier.
pub struct EntityService<T: ?Sized, N: ?Sized> {
    transport: Arc<T>,
    notifier: Arc<N>,
    store: Store,
}

impl<T: ?Sized, N: ?Sized> Clone for EntityService<T, N> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            notifier: Arc::clone(&self.notifier),
            store: self.store.clone(),
        }
    }
}

impl<T, N> EntityService<T, N>
where
    T: Transport + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(transport: Arc<T>, notifier: Arc<N>, store: Store) -> Self {
        Self {
            transport,
            notifier,
            store,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn notify_failure(&self, err: &SyncError, message: String) {
        // The login redirect already happened; no toast on top of it.
        if !err.is_unauthorized() {
            self.notifier.notify(Notification::error(message));
        }
    }

    /// Run one mutating call. Success toggles each slice in `toggles` once.
    async fn mutate<F>(
        &self,
        kind: EntityKind,
        action: Action,
        toggles: &[EntityKind],
        call: F,
    ) -> Result<Value>
    where
        F: Future<Output = Result<Value>>,
    {
        match call.await {
            Ok(body) => {
                for toggled in toggles {
                    self.store.slice(*toggled).toggle_action();
                }
                info!(entity = %kind, ?action, "mutation applied");
                self.notifier.notify(Notification::success(action.success(kind)));
                Ok(body)
            }
            Err(err) => {
                warn!(entity = %kind, ?action, error = %err, "mutation failed");
                self.store.slice(kind).set_error(None, &err);
                self.notify_failure(&err, action.failure(kind));
                Err(err)
            }
        }
    }

    fn prepare(&self, kind: EntityKind, values: Value) -> Result<Value> {
        schema_for(kind)
            .prepare(values)
            .map_err(SyncError::Validation)
    }

    /// Load one page into the slice. Responses superseded by a newer fetch are dropped.
    #[instrument(
        skip_all,
        fields(entity = %kind, page = request.wire_page(), limit = request.page_size)
    )]
    pub async fn fetch(
        &self,
        kind: EntityKind,
        scope: &Scope,
        request: &PageRequest,
    ) -> Result<Applied> {
        let path = ResourcePath::listing(kind, scope)?;
        let slice = self.store.slice(kind);
        let ticket = slice.begin_fetch();

        let result: Result<_> = async {
            let body = self.transport.get(&path, &request.query_pairs()).await?;
            envelope::decode_page(kind, &body)
        }
        .await;

        match result {
            Ok(page) => {
                let count = page.items.len();
                let applied = slice.set_collection_success(ticket, page);
                info!(count, ?applied, "page loaded");
                Ok(applied)
            }
            Err(err) => {
                warn!(error = %err, "fetch failed");
                slice.set_error(Some(ticket), &err);
                Err(err)
            }
        }
    }

    #[instrument(skip_all, fields(entity = %kind))]
    pub async fn create(&self, kind: EntityKind, scope: &Scope, values: Value) -> Result<Value> {
        let payload = self.prepare(kind, values)?;
        self.send_create(kind, scope, payload).await
    }

    async fn send_create(&self, kind: EntityKind, scope: &Scope, payload: Value) -> Result<Value> {
        let path = ResourcePath::collection(kind, scope)?;
        self.mutate(kind, Action::Create, &[kind], self.transport.post(&path, &payload))
            .await
    }

    #[instrument(skip_all, fields(entity = %kind, id = %id))]
    pub async fn update(
        &self,
        kind: EntityKind,
        scope: &Scope,
        id: &str,
        values: Value,
    ) -> Result<Value> {
        let payload = self.prepare(kind, values)?;
        self.send_update(kind, scope, id, payload).await
    }

    async fn send_update(
        &self,
        kind: EntityKind,
        scope: &Scope,
        id: &str,
        payload: Value,
    ) -> Result<Value> {
        let path = ResourcePath::update(kind, scope, id)?;
        let call = async {
            self.transport
                .put(&path, &payload)
                .await
                .map_err(|err| err.for_record(kind, id))
        };
        self.mutate(kind, Action::Update, &[kind], call).await
    }

    /// `DELETE .../<id>/delete`. A second delete of the same id yields `NotFound`
    /// and leaves the slice's items and version alone.
    #[instrument(skip_all, fields(entity = %kind, id = %id))]
    pub async fn delete(&self, kind: EntityKind, scope: &Scope, id: &str) -> Result<Value> {
        let path = ResourcePath::delete(kind, scope, id)?;
        let slice = self.store.slice(kind);
        let call = async {
            let body = self
                .transport
                .delete(&path)
                .await
                .map_err(|err| err.for_record(kind, id))?;
            let snapshot = body.get("data").cloned().unwrap_or_else(|| body.clone());
            slice.set_deleted(snapshot);
            Ok(body)
        };
        self.mutate(kind, Action::Delete, &[kind], call).await
    }

    async fn upload_inner(
        &self,
        kind: EntityKind,
        key: &UploadKey,
        attachment: Attachment,
        schema_name: Option<&str>,
    ) -> Result<String> {
        let path = ResourcePath::file_upload(&key.to_string(), schema_name);
        let body = self
            .transport
            .upload(&path, FilePart::single(attachment))
            .await?;
        let url = envelope::decode_upload(kind, &body)?;
        self.store.slice(kind).set_uploaded_url(key.clone(), url.clone());
        Ok(url)
    }

    /// Upload one file for `target_id` and remember its URL under that id.
    /// Does not signal a collection change.
    #[instrument(skip_all, fields(entity = %kind, target_id = %target_id))]
    pub async fn upload(
        &self,
        kind: EntityKind,
        target_id: &str,
        attachment: Attachment,
        schema_name: Option<&str>,
    ) -> Result<String> {
        self.notifier.notify(Notification::info("Uploading file..."));
        let key = UploadKey::Record(target_id.to_string());
        match self.upload_inner(kind, &key, attachment, schema_name).await {
            Ok(url) => {
                info!(%url, "file uploaded");
                self.notifier
                    .notify(Notification::success("Image uploaded successfully."));
                Ok(url)
            }
            Err(err) => {
                warn!(error = %err, "upload failed");
                self.store.slice(kind).set_error(None, &err);
                self.notify_failure(&err, format!("{} image could not upload.", kind.label()));
                Err(err)
            }
        }
    }

    /// Upload step of the composed operations. Failure is reported once, as the
    /// failure of the whole mutation, and nothing else is sent.
    async fn attach(
        &self,
        kind: EntityKind,
        action: Action,
        key: UploadKey,
        attachment: Attachment,
        payload: &mut Value,
    ) -> Result<()> {
        self.notifier.notify(Notification::info("Uploading file..."));
        match self.upload_inner(kind, &key, attachment, None).await {
            Ok(url) => {
                let mut extra = Map::new();
                extra.insert(IMAGE_URL_FIELD.to_string(), Value::String(url));
                schema::merge(payload, extra);
                Ok(())
            }
            Err(err) => {
                let err = SyncError::Upload(Box::new(err));
                warn!(entity = %kind, %key, error = %err, "attachment failed; mutation not sent");
                self.store.slice(kind).set_error(None, &err);
                self.notify_failure(
                    &err,
                    format!("{} Image upload failed.", action.failure(kind)),
                );
                Err(err)
            }
        }
    }

    /// Validate, upload the attachment if any, then create with its URL merged in.
    #[instrument(skip_all, fields(entity = %kind))]
    pub async fn create_with_attachment(
        &self,
        kind: EntityKind,
        scope: &Scope,
        values: Value,
        attachment: Option<Attachment>,
    ) -> Result<Value> {
        let mut payload = self.prepare(kind, values)?;
        let Some(attachment) = attachment else {
            return self.send_create(kind, scope, payload).await;
        };
        // No server id yet; the upload is keyed by a fresh request id until the
        // create settles, then moved under the new record's id or dropped.
        let key = UploadKey::Request(Uuid::new_v4());
        self.attach(kind, Action::Create, key.clone(), attachment, &mut payload)
            .await?;
        let result = self.send_create(kind, scope, payload).await;
        let slice = self.store.slice(kind);
        if let Some(url) = slice.take_uploaded_url(&key) {
            let created = result
                .as_ref()
                .ok()
                .and_then(|body| envelope::decode_record(kind, body).ok())
                .and_then(|record| record.id());
            if let Some(id) = created {
                slice.set_uploaded_url(UploadKey::Record(id), url);
            }
        }
        result
    }

    /// Validate, upload the attachment if any, then update. Without an attachment
    /// the record's existing `imageUrl` in `values` is sent unchanged.
    #[instrument(skip_all, fields(entity = %kind, id = %id))]
    pub async fn update_with_attachment(
        &self,
        kind: EntityKind,
        scope: &Scope,
        id: &str,
        values: Value,
        attachment: Option<Attachment>,
    ) -> Result<Value> {
        let mut payload = self.prepare(kind, values)?;
        if let Some(attachment) = attachment {
            let key = UploadKey::Record(id.to_string());
            self.attach(kind, Action::Update, key, attachment, &mut payload)
                .await?;
        }
        self.send_update(kind, scope, id, payload).await
    }

    /// Load one record into the slice's `selected` slot.
    #[instrument(skip_all, fields(entity = %kind, id = %id))]
    pub async fn get_by_id(&self, kind: EntityKind, scope: &Scope, id: &str) -> Result<Record> {
        let path = ResourcePath::item(kind, scope, id)?;
        let slice = self.store.slice(kind);
        let result: Result<_> = async {
            let body = self
                .transport
                .get(&path, &[])
                .await
                .map_err(|err| err.for_record(kind, id))?;
            envelope::decode_record(kind, &body)
        }
        .await;
        match result {
            Ok(record) => {
                slice.set_selected(Some(record.clone()));
                Ok(record)
            }
            Err(err) => {
                warn!(error = %err, "lookup failed");
                slice.set_error(None, &err);
                Err(err)
            }
        }
    }

    pub fn select(&self, kind: EntityKind, record: Option<Record>) {
        self.store.slice(kind).set_selected(record);
    }

    #[instrument(skip_all, fields(entity = %kind, id = %id))]
    pub async fn add_note(&self, kind: EntityKind, id: &str, values: Value) -> Result<Value> {
        let path = ResourcePath::notes(kind, id);
        self.mutate(kind, Action::AddNote, &[kind], self.transport.post(&path, &values))
            .await
    }

    #[instrument(skip_all, fields(project_id = %project_id, note_id = %note_id))]
    pub async fn delete_note(&self, project_id: &str, note_id: &str) -> Result<Value> {
        let path = ResourcePath::project(&format!("{project_id}/notes/{note_id}"));
        let kind = EntityKind::Project;
        self.mutate(kind, Action::DeleteNote, &[kind], self.transport.delete(&path))
            .await
    }

    #[instrument(skip_all, fields(project_id = %project_id, file_id = %file_id))]
    pub async fn delete_file(&self, project_id: &str, file_id: &str) -> Result<Value> {
        let path = ResourcePath::project(&format!("{project_id}/files/{file_id}"));
        let kind = EntityKind::Project;
        self.mutate(kind, Action::DeleteFile, &[kind], self.transport.delete(&path))
            .await
    }

    #[instrument(skip_all)]
    pub async fn project_analytics(&self) -> Result<Analytics> {
        let slice = self.store.slice(EntityKind::Project);
        let result: Result<_> = async {
            let body = self
                .transport
                .get(&ResourcePath::project("analytics"), &[])
                .await?;
            envelope::decode_analytics(&body)
        }
        .await;
        match result {
            Ok(analytics) => {
                slice.set_analytics(analytics);
                Ok(analytics)
            }
            Err(err) => {
                warn!(error = %err, "analytics failed");
                slice.set_error(None, &err);
                Err(err)
            }
        }
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn update_project_status(&self, id: &str, values: Value) -> Result<Value> {
        let path = ResourcePath::project(&format!("{id}/update-status"));
        let kind = EntityKind::Project;
        self.mutate(kind, Action::UpdateStatus, &[kind], self.transport.put(&path, &values))
            .await
    }

    /// Reorder a project's boards. Both the board and project lists refetch.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn update_project_board_order(&self, id: &str, values: Value) -> Result<Value> {
        let path = ResourcePath::project(&format!("{id}/update/board"));
        self.mutate(
            EntityKind::Board,
            Action::Update,
            &[EntityKind::Board, EntityKind::Project],
            self.transport.put(&path, &values),
        )
        .await
    }

    /// Attach several documents to a record as `files[0]`, `files[1]`, ...
    #[instrument(skip_all, fields(entity = %kind, id = %id, count = files.len()))]
    pub async fn upload_documents(
        &self,
        kind: EntityKind,
        id: &str,
        files: Vec<Attachment>,
    ) -> Result<Value> {
        let path = ResourcePath::document_upload(id);
        let call = async {
            let body = self
                .transport
                .upload(&path, FilePart::indexed(files))
                .await?;
            Ok(body.get("data").cloned().unwrap_or(body))
        };
        self.mutate(kind, Action::UploadDocuments, &[kind], call).await
    }
}
