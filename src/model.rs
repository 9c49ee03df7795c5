use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SyncError};

const API_PREFIX: &str = "api/v1";

/// Every remote collection the console keeps a slice for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Lead,
    Contact,
    Customer,
    Project,
    Board,
    Task,
    Role,
    Permission,
    User,
    Invoice,
    CalendarEvent,
    Vehicle,
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Lead,
        EntityKind::Contact,
        EntityKind::Customer,
        EntityKind::Project,
        EntityKind::Board,
        EntityKind::Task,
        EntityKind::Role,
        EntityKind::Permission,
        EntityKind::User,
        EntityKind::Invoice,
        EntityKind::CalendarEvent,
        EntityKind::Vehicle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Lead => "lead",
            EntityKind::Contact => "contact",
            EntityKind::Customer => "customer",
            EntityKind::Project => "project",
            EntityKind::Board => "board",
            EntityKind::Task => "task",
            EntityKind::Role => "role",
            EntityKind::Permission => "permission",
            EntityKind::User => "user",
            EntityKind::Invoice => "invoice",
            EntityKind::CalendarEvent => "calendar_event",
            EntityKind::Vehicle => "vehicle",
        }
    }

    /// Path segment below `/api/v1` for root-scoped collections.
    pub fn resource(&self) -> &'static str {
        match self {
            EntityKind::Role => "user/role",
            EntityKind::Permission => "user/permission",
            EntityKind::CalendarEvent => "event",
            other => other.as_str(),
        }
    }

    /// Key of the item array inside a list response's `data` object.
    pub fn envelope_key(&self) -> &'static str {
        match self {
            EntityKind::Lead => "leads",
            EntityKind::Contact => "contacts",
            EntityKind::Customer => "customers",
            EntityKind::Project => "projects",
            EntityKind::Board => "boards",
            EntityKind::Task => "tasks",
            EntityKind::Role => "roles",
            EntityKind::Permission => "permissions",
            EntityKind::User => "users",
            EntityKind::Invoice => "invoices",
            EntityKind::CalendarEvent => "events",
            EntityKind::Vehicle => "vehicles",
        }
    }

    /// Human label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Lead => "Lead",
            EntityKind::Contact => "Contact",
            EntityKind::Customer => "Customer",
            EntityKind::Project => "Project",
            EntityKind::Board => "Board",
            EntityKind::Task => "Task",
            EntityKind::Role => "User Role",
            EntityKind::Permission => "Permission",
            EntityKind::User => "User",
            EntityKind::Invoice => "Invoice",
            EntityKind::CalendarEvent => "Event",
            EntityKind::Vehicle => "Vehicle",
        }
    }

    /// Whether records of this kind carry an uploaded image or attachment.
    pub fn has_attachment(&self) -> bool {
        matches!(
            self,
            EntityKind::Lead
                | EntityKind::Contact
                | EntityKind::Customer
                | EntityKind::Project
                | EntityKind::Vehicle
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == needle || k.envelope_key() == needle)
            .or_else(|| match needle.as_str() {
                "event" => Some(EntityKind::CalendarEvent),
                _ => None,
            })
            .ok_or_else(|| format!("unknown entity '{s}'"))
    }
}

/// Where a collection lives. Boards hang off a project, tasks off a board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    Root,
    Project(String),
    Board { project: String, board: String },
    /// Read-only listing of every task in a project, across boards.
    ProjectTasks(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Root => f.write_str("root"),
            Scope::Project(p) => write!(f, "project {p}"),
            Scope::Board { project, board } => write!(f, "project {project} board {board}"),
            Scope::ProjectTasks(p) => write!(f, "all tasks of project {p}"),
        }
    }
}

/// Builders for the relative endpoint paths of a collection.
pub struct ResourcePath;

impl ResourcePath {
    /// Path used for `GET` list requests.
    pub fn listing(kind: EntityKind, scope: &Scope) -> Result<String> {
        match (kind, scope) {
            (EntityKind::Task, Scope::ProjectTasks(project)) => {
                Ok(format!("{API_PREFIX}/project/{project}/task/all"))
            }
            _ => Self::collection(kind, scope),
        }
    }

    /// Path used for `POST` create requests and as the prefix of item paths.
    pub fn collection(kind: EntityKind, scope: &Scope) -> Result<String> {
        match (kind, scope) {
            (EntityKind::Board, Scope::Project(project)) => {
                Ok(format!("{API_PREFIX}/project/{project}/board"))
            }
            (EntityKind::Task, Scope::Board { project, board }) => {
                Ok(format!("{API_PREFIX}/project/{project}/board/{board}/task"))
            }
            (EntityKind::Board | EntityKind::Task, _)
            | (_, Scope::Project(_))
            | (_, Scope::Board { .. })
            | (_, Scope::ProjectTasks(_)) => {
                Err(SyncError::InvalidScope {
                    entity: kind,
                    scope: scope.to_string(),
                })
            }
            (_, Scope::Root) => Ok(format!("{API_PREFIX}/{}", kind.resource())),
        }
    }

    pub fn item(kind: EntityKind, scope: &Scope, id: &str) -> Result<String> {
        Ok(format!("{}/{id}", Self::collection(kind, scope)?))
    }

    pub fn update(kind: EntityKind, scope: &Scope, id: &str) -> Result<String> {
        Ok(format!("{}/update", Self::item(kind, scope, id)?))
    }

    pub fn delete(kind: EntityKind, scope: &Scope, id: &str) -> Result<String> {
        Ok(format!("{}/delete", Self::item(kind, scope, id)?))
    }

    pub fn notes(kind: EntityKind, id: &str) -> String {
        format!("{API_PREFIX}/{}/{id}/notes", kind.resource())
    }

    pub fn file_upload(target_id: &str, schema_name: Option<&str>) -> String {
        match schema_name {
            Some(schema) => format!("{API_PREFIX}/media/file-upload/{target_id}/{schema}"),
            None => format!("{API_PREFIX}/media/file-upload/{target_id}"),
        }
    }

    pub fn document_upload(target_id: &str) -> String {
        format!("{API_PREFIX}/media/multiple-document-upload/{target_id}")
    }

    pub fn project(suffix: &str) -> String {
        format!("{API_PREFIX}/project/{suffix}")
    }
}

/// An entity record as the server sent it. Only the id is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl Record {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Server-assigned identity, read from `_id` and falling back to `id`.
    pub fn id(&self) -> Option<String> {
        ["_id", "id"].iter().find_map(|key| match self.0.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Look up a dotted path such as `contactInformation.firstName`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = self.0.get(parts.next()?)?;
        parts.try_fold(first, |value, key| value.get(key))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
