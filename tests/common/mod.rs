#![allow(dead_code)]

use console_sync::error::Result;
use console_sync::http::{FilePart, LoginRedirect, Transport};
use console_sync::model::EntityKind;
use console_sync::notify::{Notification, Notifier, Severity};
use console_sync::service::EntityService;
use console_sync::store::Store;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get {
        path: String,
        query: Vec<(String, String)>,
    },
    Post {
        path: String,
        body: Value,
    },
    Put {
        path: String,
        body: Value,
    },
    Delete {
        path: String,
    },
    Upload {
        path: String,
        fields: Vec<String>,
        files: Vec<String>,
    },
}

impl Call {
    pub fn path(&self) -> &str {
        match self {
            Call::Get { path, .. }
            | Call::Post { path, .. }
            | Call::Put { path, .. }
            | Call::Delete { path }
            | Call::Upload { path, .. } => path,
        }
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        match self {
            Call::Get { query, .. } => query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Call::Post { body, .. } | Call::Put { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Transport double answering from a script and recording every call.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    responses: Arc<Mutex<VecDeque<Result<Value>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingTransport {
    pub fn with_responses(responses: Vec<Result<Value>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    pub async fn push_response(&self, response: Result<Value>) {
        self.responses.lock().await.push_back(response);
    }

    async fn record(&self, call: Call) -> Result<Value> {
        self.calls.lock().await.push(call);
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(json!({})))
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn get(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value> {
        let query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.record(Call::Get {
            path: path.to_string(),
            query,
        })
        .await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.record(Call::Post {
            path: path.to_string(),
            body: body.clone(),
        })
        .await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.record(Call::Put {
            path: path.to_string(),
            body: body.clone(),
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.record(Call::Delete {
            path: path.to_string(),
        })
        .await
    }

    async fn upload(&self, path: &str, parts: Vec<FilePart>) -> Result<Value> {
        self.record(Call::Upload {
            path: path.to_string(),
            fields: parts.iter().map(|p| p.field.clone()).collect(),
            files: parts
                .iter()
                .map(|p| p.attachment.file_name.clone())
                .collect(),
        })
        .await
    }
}

/// Transport whose GETs stay pending until the test answers them, in any order.
#[derive(Clone, Default)]
pub struct GatedTransport {
    pending: Arc<Mutex<Vec<oneshot::Sender<Result<Value>>>>>,
}

impl GatedTransport {
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Wait until `count` requests are in flight.
    pub async fn wait_for(&self, count: usize) {
        while self.pending().await < count {
            tokio::task::yield_now().await;
        }
    }

    /// Answer the request issued `index`-th (0-based).
    pub async fn answer(&self, index: usize, response: Result<Value>) {
        let mut guard = self.pending.lock().await;
        let (tx, _) = oneshot::channel();
        let sender = std::mem::replace(&mut guard[index], tx);
        let _ = sender.send(response);
    }
}

#[async_trait::async_trait]
impl Transport for GatedTransport {
    async fn get(&self, _path: &str, _query: &[(&'static str, String)]) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.push(tx);
        rx.await.unwrap_or_else(|_| Ok(json!({})))
    }

    async fn post(&self, _path: &str, _body: &Value) -> Result<Value> {
        Ok(json!({}))
    }

    async fn put(&self, _path: &str, _body: &Value) -> Result<Value> {
        Ok(json!({}))
    }

    async fn delete(&self, _path: &str) -> Result<Value> {
        Ok(json!({}))
    }

    async fn upload(&self, _path: &str, _parts: Vec<FilePart>) -> Result<Value> {
        Ok(json!({}))
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<parking_lot::Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter(|n| n.severity() == severity)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

#[derive(Clone, Default)]
pub struct RecordingRedirect {
    targets: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl RecordingRedirect {
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

impl LoginRedirect for RecordingRedirect {
    fn redirect(&self, login_path: &str) {
        self.targets.lock().push(login_path.to_string());
    }
}

pub fn service<T: Transport>(
    transport: T,
) -> (EntityService<T, RecordingNotifier>, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let service = EntityService::new(
        Arc::new(transport),
        Arc::new(notifier.clone()),
        Store::new(),
    );
    (service, notifier)
}

/// `{ data: { <plural>: items, page, total, limit } }`
pub fn page_body(kind: EntityKind, items: Vec<Value>, page: u64, total: u64, limit: u64) -> Value {
    let mut data = serde_json::Map::new();
    data.insert(kind.envelope_key().to_string(), Value::Array(items));
    data.insert("page".into(), json!(page));
    data.insert("total".into(), json!(total));
    data.insert("limit".into(), json!(limit));
    json!({ "data": data })
}

pub fn lead(id: &str, first_name: &str) -> Value {
    json!({
        "_id": id,
        "contactInformation": { "firstName": first_name, "lastName": "Doe" },
        "projectType": "Electrical"
    })
}
