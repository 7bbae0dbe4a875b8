use super::message::{Request, Response};
use super::schema::{Field, FieldKind, HarEntity, KeyValue, Schema};
use super::timestamp::Timestamp;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// HAR format version written by default.
pub const HAR_VERSION: &str = "1.2";

/// Name this tool records as the archive creator.
pub const CREATOR_NAME: &str = "Harpy";

const UNINITIALIZED: &str = "[uninitialized]";

pub(crate) static CONTAINER: Schema = Schema {
    entity: "Container",
    fields: &[Field::required("log", FieldKind::Entity(&LOG))],
};

pub(crate) static LOG: Schema = Schema {
    entity: "Log",
    fields: &[
        Field::required("version", FieldKind::String),
        Field::required("creator", FieldKind::Entity(&CREATOR)),
        Field::optional("browser", FieldKind::Entity(&BROWSER)),
        Field::optional("pages", FieldKind::List(&PAGE)),
        Field::required("entries", FieldKind::List(&ENTRY)),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static CREATOR: Schema = Schema {
    entity: "Creator",
    fields: &[
        Field::required("name", FieldKind::String),
        Field::required("version", FieldKind::String),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static BROWSER: Schema = Schema {
    entity: "Browser",
    fields: &[
        Field::required("name", FieldKind::String),
        Field::required("version", FieldKind::String),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static PAGE: Schema = Schema {
    entity: "Page",
    fields: &[
        Field::required("startedDateTime", FieldKind::Timestamp),
        Field::required("id", FieldKind::String),
        Field::required("title", FieldKind::String),
        Field::required("pageTimings", FieldKind::Entity(&PAGE_TIMINGS)),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static PAGE_TIMINGS: Schema = Schema {
    entity: "PageTimings",
    fields: &[
        Field::optional("onContentLoad", FieldKind::Number),
        Field::optional("onLoad", FieldKind::Number),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static ENTRY: Schema = Schema {
    entity: "Entry",
    fields: &[
        Field::optional("pageref", FieldKind::String),
        Field::required("startedDateTime", FieldKind::Timestamp),
        Field::required("time", FieldKind::Number),
        Field::required("request", FieldKind::Entity(&super::message::REQUEST)),
        Field::required("response", FieldKind::Entity(&super::message::RESPONSE)),
        Field::required("cache", FieldKind::Entity(&CACHE)),
        Field::required("timings", FieldKind::Entity(&TIMINGS)),
        Field::optional("serverIPAddress", FieldKind::String),
        Field::optional("connection", FieldKind::String),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static CACHE: Schema = Schema {
    entity: "Cache",
    fields: &[
        Field::optional("beforeRequest", FieldKind::Entity(&REQUEST_CACHE)),
        Field::optional("afterRequest", FieldKind::Entity(&REQUEST_CACHE)),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static REQUEST_CACHE: Schema = Schema {
    entity: "RequestCache",
    fields: &[
        Field::optional("expires", FieldKind::Timestamp),
        Field::required("lastAccess", FieldKind::Timestamp),
        Field::required("eTag", FieldKind::String),
        Field::required("hitCount", FieldKind::Integer),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static TIMINGS: Schema = Schema {
    entity: "Timings",
    fields: &[
        Field::optional("blocked", FieldKind::Number),
        Field::optional("dns", FieldKind::Number),
        Field::optional("connect", FieldKind::Number),
        Field::required("send", FieldKind::Number),
        Field::required("wait", FieldKind::Number),
        Field::required("receive", FieldKind::Number),
        Field::optional("ssl", FieldKind::Number),
        Field::optional("comment", FieldKind::String),
    ],
};

/// Top-level HAR object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Log>,
}

impl Container {
    pub fn new(log: Log) -> Self {
        Self { log: Some(log) }
    }

    pub fn entries(&self) -> &[Entry] {
        self.log.as_ref().map(Log::entries).unwrap_or(&[])
    }
}

impl HarEntity for Container {
    fn schema() -> &'static Schema {
        &CONTAINER
    }

    fn with_defaults() -> Self {
        Self::new(Log::with_defaults())
    }

    fn check(&self) -> Result<()> {
        match &self.log {
            Some(log) => log.check(),
            None => Ok(()),
        }
    }
}

/// Main HAR log object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Log {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<Creator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<Browser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<Page>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<Entry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Log {
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }

    pub fn entries(&self) -> &[Entry] {
        self.entries.as_deref().unwrap_or(&[])
    }

    pub fn pages(&self) -> &[Page] {
        self.pages.as_deref().unwrap_or(&[])
    }

    pub fn push_entry(&mut self, entry: Entry) {
        self.entries.get_or_insert_with(Vec::new).push(entry);
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages().iter().find(|p| p.id.as_deref() == Some(id))
    }
}

impl HarEntity for Log {
    fn schema() -> &'static Schema {
        &LOG
    }

    fn with_defaults() -> Self {
        Self {
            version: Some(HAR_VERSION.to_string()),
            creator: Some(Creator::with_defaults()),
            entries: Some(Vec::new()),
            ..Default::default()
        }
    }

    fn label(&self) -> String {
        match (&self.version, &self.creator) {
            (Some(version), Some(creator)) => format!(
                "HAR {} Log created by {} {}",
                version,
                creator.key(),
                creator.value()
            ),
            _ => "Log".to_string(),
        }
    }

    /// Page ids are unique and every entry's `pageref` names one of them.
    fn check(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for page in self.pages() {
            let id = page.id.as_deref().unwrap_or_default();
            if !ids.insert(id) {
                return Err(Error::validation(
                    "Log",
                    "pages",
                    "unique page ids",
                    format!("duplicate id '{}'", id),
                ));
            }
        }

        for entry in self.entries() {
            if let Some(pageref) = &entry.page_ref
                && !ids.contains(pageref.as_str())
            {
                return Err(Error::validation(
                    "Entry",
                    "pageref",
                    "id of a page in this log",
                    format!("'{}'", pageref),
                ));
            }
            entry.check()?;
        }

        Ok(())
    }
}

/// Creator information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for Creator {
    fn schema() -> &'static Schema {
        &CREATOR
    }

    fn with_defaults() -> Self {
        Self::pair(CREATOR_NAME, env!("CARGO_PKG_VERSION"))
    }

    fn label(&self) -> String {
        format!("Created by {}", self.name.as_deref().unwrap_or(UNINITIALIZED))
    }
}

impl KeyValue for Creator {
    fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(key.into()),
            version: Some(value.into()),
            comment: None,
        }
    }

    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn value(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }
}

/// Browser information; same shape as [`Creator`], different entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Browser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for Browser {
    fn schema() -> &'static Schema {
        &BROWSER
    }

    fn with_defaults() -> Self {
        Self::pair(CREATOR_NAME, env!("CARGO_PKG_VERSION"))
    }

    fn label(&self) -> String {
        format!("Browser '{}'", self.name.as_deref().unwrap_or(UNINITIALIZED))
    }
}

impl KeyValue for Browser {
    fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(key.into()),
            version: Some(value.into()),
            comment: None,
        }
    }

    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn value(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }
}

/// Page information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "startedDateTime", skip_serializing_if = "Option::is_none")]
    pub started_date_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "pageTimings", skip_serializing_if = "Option::is_none")]
    pub page_timings: Option<PageTimings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for Page {
    fn schema() -> &'static Schema {
        &PAGE
    }

    fn with_defaults() -> Self {
        Self {
            started_date_time: Some(Timestamp::now()),
            id: Some("page_1".to_string()),
            title: Some("[Title could not be determined]".to_string()),
            page_timings: Some(PageTimings::with_defaults()),
            comment: None,
        }
    }

    fn label(&self) -> String {
        format!(
            "Page with title '{}'",
            self.title.as_deref().unwrap_or("[undefined]")
        )
    }
}

/// Page timing information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTimings {
    #[serde(rename = "onContentLoad", skip_serializing_if = "Option::is_none")]
    pub on_content_load: Option<f64>,
    #[serde(rename = "onLoad", skip_serializing_if = "Option::is_none")]
    pub on_load: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for PageTimings {
    fn schema() -> &'static Schema {
        &PAGE_TIMINGS
    }

    fn with_defaults() -> Self {
        Self {
            on_content_load: Some(-1.0),
            on_load: Some(-1.0),
            comment: None,
        }
    }

    fn label(&self) -> String {
        "Page timing ".to_string()
    }
}

/// Individual HTTP transaction entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "pageref", skip_serializing_if = "Option::is_none")]
    pub page_ref: Option<String>,
    #[serde(rename = "startedDateTime", skip_serializing_if = "Option::is_none")]
    pub started_date_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<Cache>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<Timings>,
    #[serde(rename = "serverIPAddress", skip_serializing_if = "Option::is_none")]
    pub server_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Entry {
    /// Total elapsed time in ms, or -1 when unset.
    pub fn time(&self) -> f64 {
        self.time.unwrap_or(-1.0)
    }
}

impl HarEntity for Entry {
    fn schema() -> &'static Schema {
        &ENTRY
    }

    fn with_defaults() -> Self {
        let timings = Timings::with_defaults();
        Self {
            started_date_time: Some(Timestamp::now()),
            time: Some(timings.total()),
            request: Some(Request::with_defaults()),
            response: Some(Response::with_defaults()),
            cache: Some(Cache::with_defaults()),
            timings: Some(timings),
            ..Default::default()
        }
    }

    fn label(&self) -> String {
        match &self.request {
            Some(request) => format!("Entry {} {}", request.method(), request.url()),
            None => "Entry".to_string(),
        }
    }

    fn check(&self) -> Result<()> {
        if let Some(request) = &self.request {
            request.check()?;
        }
        if let Some(timings) = &self.timings {
            timings.check()?;
        }
        Ok(())
    }
}

/// Cache information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cache {
    #[serde(rename = "beforeRequest", skip_serializing_if = "Option::is_none")]
    pub before_request: Option<RequestCache>,
    #[serde(rename = "afterRequest", skip_serializing_if = "Option::is_none")]
    pub after_request: Option<RequestCache>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for Cache {
    fn schema() -> &'static Schema {
        &CACHE
    }

    // Nothing is known about the cache unless a producer recorded it.
    fn with_defaults() -> Self {
        Self::default()
    }
}

/// Cache entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCache {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<Timestamp>,
    #[serde(rename = "lastAccess", skip_serializing_if = "Option::is_none")]
    pub last_access: Option<Timestamp>,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    #[serde(rename = "hitCount", skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for RequestCache {
    fn schema() -> &'static Schema {
        &REQUEST_CACHE
    }

    fn with_defaults() -> Self {
        Self {
            last_access: Some(Timestamp::now()),
            e_tag: Some(String::new()),
            hit_count: Some(0),
            ..Default::default()
        }
    }
}

/// Timing information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Timings {
    /// Sum of every measured phase; unmeasured (-1) and unset phases count as 0.
    ///
    /// `ssl` is already included in `connect`, so it is not added again.
    pub fn total(&self) -> f64 {
        [
            self.blocked,
            self.dns,
            self.connect,
            self.send,
            self.wait,
            self.receive,
        ]
        .into_iter()
        .flatten()
        .filter(|ms| *ms > 0.0)
        .sum()
    }

    fn phases(&self) -> [(&'static str, Option<f64>); 3] {
        [
            ("send", self.send),
            ("wait", self.wait),
            ("receive", self.receive),
        ]
    }
}

impl HarEntity for Timings {
    fn schema() -> &'static Schema {
        &TIMINGS
    }

    fn with_defaults() -> Self {
        Self {
            blocked: Some(-1.0),
            dns: Some(-1.0),
            connect: Some(-1.0),
            send: Some(0.0),
            wait: Some(0.0),
            receive: Some(0.0),
            ssl: Some(-1.0),
            comment: None,
        }
    }

    fn label(&self) -> String {
        format!("Timings {:.3} ms", self.total())
    }

    fn check(&self) -> Result<()> {
        for (field, value) in self.phases() {
            if let Some(ms) = value
                && ms < 0.0
            {
                return Err(Error::validation(
                    "Timings",
                    field,
                    "non-negative number",
                    ms.to_string(),
                ));
            }
        }
        Ok(())
    }
}
