//! Per-entity form rules, kept as data.
//!
//! Each entity has a static list of [`FieldSpec`]s: optional numeric coercion
//! applied before a payload is sent, plus validation rules checked first.
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::EntityKind;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
/// UK numbers: national `0...`, `+44`/`0044`/`01144` prefixes, optional extension.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\(?(?:(?:0(?:0|11)\)?[\s-]?\(?|\+)44\)?[\s-]?\(?(?:0\)?[\s-]?\(?)?|0)",
        r"(?:\d{5}\)?[\s-]?\d{4,5}|\d{4}\)?[\s-]?(?:\d{5}|\d{3}[\s-]?\d{3})",
        r"|\d{3}\)?[\s-]?\d{3}[\s-]?\d{3,4}|\d{2}\)?[\s-]?\d{4}[\s-]?\d{4}",
        r"|8(?:00[\s-]?11[\s-]?11|45[\s-]?46[\s-]?4\d))",
        r"(?:(?:[\s-]?(?:x|ext\.?\s?|#)\d+)?)$",
    ))
    .expect("valid phone regex")
});
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^((https?|ftp)://)?(www\.)?[a-z0-9-]+(\.[a-z0-9-]+)+(:\d+)?(/\S*)?$")
        .expect("valid url regex")
});

/// Conversion applied to a field before the payload leaves the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Parse a string as a JSON number.
    Number,
    /// Strip formatting characters and parse the remaining digits.
    Digits,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Required,
    MaxLen(usize),
    /// Carries the message shown when the address is malformed.
    Email(&'static str),
    Phone,
    Url,
    Numeric,
    MinNumber(f64),
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub path: &'static str,
    pub label: &'static str,
    pub coercion: Option<Coercion>,
    pub rules: &'static [Rule],
}

const fn field(
    path: &'static str,
    label: &'static str,
    coercion: Option<Coercion>,
    rules: &'static [Rule],
) -> FieldSpec {
    FieldSpec {
        path,
        label,
        coercion,
        rules,
    }
}

const CUSTOMER_STATUS: &[&str] = &["pending", "verified", "rejected"];

const CUSTOMER_FIELDS: &[FieldSpec] = &[
    field("name", "Name", None, &[Rule::Required, Rule::MaxLen(255)]),
    field(
        "email",
        "Email",
        None,
        &[
            Rule::Required,
            Rule::MaxLen(255),
            Rule::Email("Must be a valid email"),
        ],
    ),
    field(
        "phone",
        "Phone number",
        Some(Coercion::Digits),
        &[Rule::Required, Rule::Phone],
    ),
    field(
        "age",
        "Age",
        Some(Coercion::Number),
        &[Rule::Required, Rule::Numeric, Rule::MinNumber(16.0)],
    ),
    field("address", "Address", None, &[Rule::Required, Rule::MaxLen(255)]),
    field("country", "Country", None, &[Rule::Required, Rule::MaxLen(255)]),
    field(
        "zipCode",
        "Zip code",
        Some(Coercion::Number),
        &[Rule::Required, Rule::Numeric],
    ),
    field("web", "Website", None, &[Rule::Required, Rule::Url]),
    field("description", "Description", None, &[Rule::MaxLen(500)]),
    field("status", "Status", None, &[Rule::OneOf(CUSTOMER_STATUS)]),
];

/// Leads and contacts share one form.
const PERSON_FIELDS: &[FieldSpec] = &[
    field(
        "contactInformation.email",
        "Email",
        None,
        &[Rule::Email("Incorrect email address")],
    ),
    field("phone", "Phone number", Some(Coercion::Digits), &[]),
    field("age", "Age", Some(Coercion::Number), &[Rule::Numeric]),
];

const PROJECT_FIELDS: &[FieldSpec] = &[field(
    "projectName",
    "Project name",
    None,
    &[Rule::Required, Rule::MaxLen(255)],
)];

const VEHICLE_FIELDS: &[FieldSpec] = &[field(
    "manufactureYear",
    "Manufacture year",
    Some(Coercion::Number),
    &[Rule::Numeric],
)];

const TITLE_FIELDS: &[FieldSpec] = &[field("title", "Title", None, &[Rule::Required])];

const ROLE_FIELDS: &[FieldSpec] = &[field("name", "Name", None, &[Rule::Required])];

/// Field-level messages keyed by dotted path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, path: &str, message: String) {
        // First failing rule wins.
        self.0.entry(path.to_string()).or_insert(message);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (path, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{path}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub fields: &'static [FieldSpec],
}

pub fn schema_for(kind: EntityKind) -> EntitySchema {
    let fields = match kind {
        EntityKind::Customer => CUSTOMER_FIELDS,
        EntityKind::Lead | EntityKind::Contact => PERSON_FIELDS,
        EntityKind::Project => PROJECT_FIELDS,
        EntityKind::Vehicle => VEHICLE_FIELDS,
        EntityKind::Board | EntityKind::Task => TITLE_FIELDS,
        EntityKind::Role => ROLE_FIELDS,
        _ => &[],
    };
    EntitySchema { kind, fields }
}

fn lookup<'a>(values: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(values, |v, key| v.get(key))
}

fn lookup_mut<'a>(values: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(values, |v, key| v.get_mut(key))
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn check(rule: &Rule, spec: &FieldSpec, value: &Value) -> Option<String> {
    let label = spec.label;
    match rule {
        Rule::Required => None,
        Rule::MaxLen(max) => as_text(value)
            .filter(|s| s.chars().count() > *max)
            .map(|_| format!("{label} must be at most {max} characters")),
        Rule::Email(message) => match as_text(value) {
            Some(s) if EMAIL_RE.is_match(s.trim()) => None,
            _ => Some(message.to_string()),
        },
        Rule::Phone => match as_text(value) {
            Some(s) if PHONE_RE.is_match(s.trim()) => None,
            _ => Some("Invalid phone number".to_string()),
        },
        Rule::Url => match as_text(value) {
            Some(s) if URL_RE.is_match(s.trim()) => None,
            _ => Some("Invalid URL".to_string()),
        },
        Rule::Numeric => as_number(value)
            .is_none()
            .then(|| "Please enter a number".to_string()),
        Rule::MinNumber(min) => match as_number(value) {
            Some(n) if n >= *min => None,
            Some(_) => Some(format!("{label} must be at least {min}")),
            None => Some("Please enter a number".to_string()),
        },
        Rule::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => None,
            _ => Some(format!("{label} must be one of {}", allowed.join(", "))),
        },
    }
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

fn coerce_value(coercion: Coercion, value: &Value) -> Option<Value> {
    match (coercion, value) {
        (_, Value::Number(_)) => Some(value.clone()),
        (Coercion::Number, Value::String(s)) => s.trim().parse::<f64>().ok().and_then(number_value),
        (Coercion::Digits, Value::String(s)) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().ok().map(|n| Value::Number(n.into()))
        }
        _ => None,
    }
}

impl EntitySchema {
    /// Check every rule; returns all field errors at once.
    pub fn validate(&self, values: &Value) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for spec in self.fields {
            let value = lookup(values, spec.path);
            if is_blank(value) {
                if spec.rules.contains(&Rule::Required) {
                    errors.insert(spec.path, format!("{} is required", spec.label));
                }
                continue;
            }
            let Some(value) = value else { continue };
            for rule in spec.rules {
                if let Some(message) = check(rule, spec, value) {
                    errors.insert(spec.path, message);
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Apply numeric coercions in place. Blank optional fields become `null`.
    pub fn coerce(&self, values: &mut Value) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for spec in self.fields {
            let Some(coercion) = spec.coercion else { continue };
            let Some(slot) = lookup_mut(values, spec.path) else { continue };
            if is_blank(Some(&*slot)) {
                *slot = Value::Null;
                continue;
            }
            match coerce_value(coercion, slot) {
                Some(v) => *slot = v,
                None => errors.insert(spec.path, format!("{} must be a number", spec.label)),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate then coerce, yielding the payload to send.
    pub fn prepare(&self, mut values: Value) -> Result<Value, ValidationErrors> {
        if !values.is_object() {
            let mut errors = ValidationErrors::default();
            errors.insert("", format!("{} payload must be an object", self.kind.label()));
            return Err(errors);
        }
        self.validate(&values)?;
        self.coerce(&mut values)?;
        Ok(values)
    }
}

/// Shallow-merge `extra` into `values`, overwriting keys.
pub fn merge(values: &mut Value, extra: Map<String, Value>) {
    if let Value::Object(map) = values {
        map.extend(extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_customer() -> Value {
        json!({
            "name": "Acme",
            "email": "ops@acme.io",
            "phone": "+44 7911 123456",
            "age": "30",
            "address": "1 Road",
            "country": "UK",
            "zipCode": "12345",
            "web": "https://acme.io",
            "status": "pending"
        })
    }

    #[test]
    fn customer_happy_path_coerces_numbers() {
        let out = schema_for(EntityKind::Customer)
            .prepare(valid_customer())
            .unwrap();
        assert_eq!(out["age"], json!(30));
        assert_eq!(out["zipCode"], json!(12345));
        assert_eq!(out["phone"], json!(447911123456i64));
        assert_eq!(out["name"], json!("Acme"));
    }

    #[test]
    fn customer_reports_every_failing_field() {
        let mut values = valid_customer();
        values["name"] = json!("");
        values["email"] = json!("not-an-email");
        values["age"] = json!(12);
        values["web"] = json!("no spaces allowed.com x");
        values["status"] = json!("archived");
        let errors = schema_for(EntityKind::Customer).validate(&values).unwrap_err();
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("email"), Some("Must be a valid email"));
        assert_eq!(errors.get("age"), Some("Age must be at least 16"));
        assert_eq!(errors.get("web"), Some("Invalid URL"));
        assert!(errors.get("status").unwrap().contains("pending"));
        assert_eq!(errors.get("address"), None);
    }

    #[test]
    fn customer_phone_must_be_a_uk_number() {
        let schema = schema_for(EntityKind::Customer);
        for ok in ["07911 123456", "+44 (0)20 7946 0958", "0044 7911 123456", "0800 111 111"] {
            let mut values = valid_customer();
            values["phone"] = json!(ok);
            assert!(schema.validate(&values).is_ok(), "{ok} should pass");
        }
        for bad in ["12345678", "1234 5678 9012", "+1 555 123 4567"] {
            let mut values = valid_customer();
            values["phone"] = json!(bad);
            let errors = schema.validate(&values).unwrap_err();
            assert_eq!(errors.get("phone"), Some("Invalid phone number"), "{bad}");
        }
    }

    #[test]
    fn lead_email_checked_only_when_present() {
        let schema = schema_for(EntityKind::Lead);
        schema
            .validate(&json!({ "contactInformation": { "firstName": "Jane" } }))
            .unwrap();
        let errors = schema
            .validate(&json!({ "contactInformation": { "email": "jane" } }))
            .unwrap_err();
        assert_eq!(
            errors.get("contactInformation.email"),
            Some("Incorrect email address")
        );
    }

    #[test]
    fn non_numeric_input_is_an_error_not_nan() {
        let schema = schema_for(EntityKind::Lead);
        let err = schema.prepare(json!({ "age": "forty" })).unwrap_err();
        assert_eq!(err.get("age"), Some("Please enter a number"));

        let out = schema.prepare(json!({ "age": "", "phone": "" })).unwrap();
        assert_eq!(out["age"], Value::Null);
        assert_eq!(out["phone"], Value::Null);
    }

    #[test]
    fn entities_without_rules_pass_through() {
        let values = json!({ "amount": "12.5", "lines": [] });
        let out = schema_for(EntityKind::Invoice).prepare(values.clone()).unwrap();
        assert_eq!(out, values);
        assert!(schema_for(EntityKind::Invoice).prepare(json!("x")).is_err());
    }

    #[test]
    fn boards_and_tasks_need_a_title() {
        let errors = schema_for(EntityKind::Board)
            .validate(&json!({ "title": "  " }))
            .unwrap_err();
        assert_eq!(errors.get("title"), Some("Title is required"));
        schema_for(EntityKind::Task)
            .validate(&json!({ "title": "Wire panel" }))
            .unwrap();
    }

    #[test]
    fn merge_overwrites_keys() {
        let mut values = json!({ "a": 1, "imageUrl": null });
        let mut extra = Map::new();
        extra.insert("imageUrl".into(), json!("https://cdn/x.png"));
        merge(&mut values, extra);
        assert_eq!(values, json!({ "a": 1, "imageUrl": "https://cdn/x.png" }));
    }
}
