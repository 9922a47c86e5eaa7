//! Fluent resource handles over the request façade.
//!
//! Each handle carries the shared [`RequestFacade`] and the path it
//! addresses; every leaf method is exactly one façade call.
//!
//! ```rust,ignore
//! let library = client.query().library().one("Showreel");
//! let tasks = library.tasks().many(Filters::default()).fetch().await?;
//! library.tasks().one("t-1").run().await?;
//! ```

mod library;
mod users;
mod utility;
mod volumes;

use std::sync::Arc;

use serde_json::Value;

use crate::{error::Result, facade::RequestFacade};

pub use library::{
    Folders, Libraries, Library, Metacopies, Metacopy, Metafile, MetafileSet, Metafiles, Task,
    Tasks, Thumbnails, Transactions, Transcode, Transcodes,
};
pub use users::{UserResource, Users};
pub use utility::{Finder, Utility};
pub use volumes::{Volume, Volumes};

/// Entry point of the query surface.
#[derive(Clone)]
pub struct Query {
    api: Arc<RequestFacade>,
}

impl Query {
    pub fn new(api: Arc<RequestFacade>) -> Self {
        Self { api }
    }

    pub fn library(&self) -> Libraries {
        Libraries::new(self.api.clone())
    }

    pub fn volumes(&self) -> Volumes {
        Volumes::new(self.api.clone())
    }

    pub fn users(&self) -> Users {
        Users::new(self.api.clone())
    }

    pub fn utility(&self) -> Utility {
        Utility::new(self.api.clone())
    }

    pub fn finder(&self) -> Finder {
        Finder::new(self.api.clone())
    }
}

/// Selection passed to `many(...)`. Only bulk metafile operations read `ids`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters {
    pub ids: Vec<String>,
}

impl Filters {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// A listable collection: `GET <uri>`.
#[derive(Clone)]
pub struct Collection {
    api: Arc<RequestFacade>,
    uri: String,
    params: Option<Value>,
}

impl Collection {
    pub(crate) fn new(api: Arc<RequestFacade>, uri: String) -> Self {
        Self {
            api,
            uri,
            params: None,
        }
    }

    pub(crate) fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, self.params.clone()).await
    }
}

/// Percent-encodes one path segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Merges `extra`'s fields into `base` when `extra` is an object.
fn merge(mut base: Value, extra: Option<Value>) -> Value {
    if let (Some(target), Some(Value::Object(fields))) = (base.as_object_mut(), extra) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_spreads_options_over_base() {
        let merged = merge(json!({"files": ["a"]}), Some(json!({"preset": "proxy", "files": ["b"]})));
        assert_eq!(merged, json!({"files": ["b"], "preset": "proxy"}));
    }

    #[test]
    fn merge_ignores_non_objects() {
        assert_eq!(merge(json!({"a": 1}), Some(json!([1, 2]))), json!({"a": 1}));
        assert_eq!(merge(json!({"a": 1}), None), json!({"a": 1}));
    }

    #[test]
    fn filters_collect_ids() {
        assert_eq!(Filters::ids(["x", "y"]).ids, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn segments_are_percent_encoded() {
        assert_eq!(encode_segment("a/b"), "a%2Fb");
        assert_eq!(encode_segment("A#1"), "A%231");
        assert_eq!(encode_segment("Show reel"), "Show%20reel");
        assert_eq!(encode_segment("plain-id_1.x"), "plain-id_1.x");
    }
}
