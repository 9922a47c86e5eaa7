//! `/library` and everything nested under a single library.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{encode_segment, merge, Collection, Filters};
use crate::{
    error::{Error, Result},
    facade::RequestFacade,
};

#[derive(Clone)]
pub struct Libraries {
    api: Arc<RequestFacade>,
}

impl Libraries {
    pub(crate) fn new(api: Arc<RequestFacade>) -> Self {
        Self { api }
    }

    pub fn many(&self, _filters: Filters) -> Collection {
        Collection::new(self.api.clone(), "/library".into())
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        self.api.post("/library", Some(data)).await
    }

    pub fn one(&self, id: &str) -> Library {
        Library {
            api: self.api.clone(),
            uri: format!("/library/{}", encode_segment(id)),
        }
    }
}

#[derive(Clone)]
pub struct Library {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Library {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, None).await
    }

    pub async fn put(&self, data: Value) -> Result<Value> {
        self.api.put(&self.uri, data).await
    }

    pub async fn delete(&self) -> Result<Value> {
        self.api.delete(&self.uri).await
    }

    pub async fn scan(&self) -> Result<Value> {
        self.api.post(&format!("{}/scan", self.uri), None).await
    }

    /// Exports `files` with the given options spread into the body.
    pub async fn export(&self, files: Value, options: Option<Value>) -> Result<Value> {
        let body = merge(json!({ "files": files }), options);
        self.api
            .post(&format!("{}/metafiles/export", self.uri), Some(body))
            .await
    }

    pub fn tasks(&self) -> Tasks {
        Tasks {
            api: self.api.clone(),
            uri: format!("{}/tasks", self.uri),
        }
    }

    pub fn metafiles(&self) -> Metafiles {
        Metafiles {
            api: self.api.clone(),
            library_uri: self.uri.clone(),
        }
    }

    pub fn transcodes(&self) -> Transcodes {
        Transcodes {
            api: self.api.clone(),
            uri: format!("{}/transcode", self.uri),
        }
    }

    pub fn transactions(&self) -> Transactions {
        Transactions {
            api: self.api.clone(),
            uri: format!("{}/transactions", self.uri),
        }
    }

    pub fn folders(&self) -> Folders {
        Folders {
            api: self.api.clone(),
            uri: format!("{}/folders", self.uri),
        }
    }
}

// ── tasks ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Tasks {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Tasks {
    pub async fn create(&self, data: Value) -> Result<Value> {
        self.api.post(&self.uri, Some(data)).await
    }

    pub fn many(&self, _filters: Filters) -> Collection {
        Collection::new(self.api.clone(), self.uri.clone())
    }

    pub async fn generate(&self, data: Value) -> Result<Value> {
        self.api
            .post(&format!("{}/generate", self.uri), Some(data))
            .await
    }

    pub fn one(&self, id: &str) -> Task {
        Task {
            api: self.api.clone(),
            uri: format!("{}/{}", self.uri, encode_segment(id)),
        }
    }
}

#[derive(Clone)]
pub struct Task {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Task {
    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, None).await
    }

    pub async fn put(&self, data: Value) -> Result<Value> {
        self.api.put(&self.uri, data).await
    }

    pub async fn delete(&self) -> Result<Value> {
        self.api.delete(&self.uri).await
    }

    pub async fn run(&self) -> Result<Value> {
        self.api.post(&format!("{}/run", self.uri), None).await
    }

    pub async fn stop(&self) -> Result<Value> {
        self.api.post(&format!("{}/stop", self.uri), None).await
    }
}

// ── metafiles ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Metafiles {
    api: Arc<RequestFacade>,
    library_uri: String,
}

impl Metafiles {
    pub fn many(&self, filters: Filters) -> MetafileSet {
        MetafileSet {
            api: self.api.clone(),
            library_uri: self.library_uri.clone(),
            ids: filters.ids,
        }
    }

    pub fn one(&self, id: &str) -> Metafile {
        Metafile {
            api: self.api.clone(),
            uri: format!("{}/metafiles/{}", self.library_uri, encode_segment(id)),
        }
    }
}

/// A filtered selection of metafiles; bulk operations act on `Filters::ids`.
#[derive(Clone)]
pub struct MetafileSet {
    api: Arc<RequestFacade>,
    library_uri: String,
    ids: Vec<String>,
}

impl MetafileSet {
    pub async fn fetch(&self) -> Result<Value> {
        self.api
            .get(
                &format!("{}/metafiles", self.library_uri),
                Some(json!({ "extended": true })),
            )
            .await
    }

    /// Queues a transcode job for the library.
    pub async fn export_transcode(&self, data: Value) -> Result<Value> {
        self.api
            .post(&format!("{}/transcode", self.library_uri), Some(data))
            .await
    }

    pub async fn generate_thumbnails(&self) -> Result<Value> {
        self.api
            .post(
                &format!("{}/metafiles/thumbnails", self.library_uri),
                Some(json!({ "files": self.ids })),
            )
            .await
    }

    pub async fn analyse(&self, options: Option<Value>) -> Result<Value> {
        let body = merge(json!({ "metafiles": self.ids }), options);
        self.api
            .post(&format!("{}/metafiles/analyse", self.library_uri), Some(body))
            .await
    }
}

#[derive(Clone)]
pub struct Metafile {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Metafile {
    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, None).await
    }

    pub async fn put(&self, data: Value) -> Result<Value> {
        self.api.put(&self.uri, data).await
    }

    pub async fn delete(&self) -> Result<Value> {
        self.api.delete(&self.uri).await
    }

    /// Sets one metadata field: `PUT …/metadata/<key>` with `{value}`.
    pub async fn put_metadata(&self, key: &str, value: Value) -> Result<Value> {
        self.api
            .put(
                &format!("{}/metadata/{}", self.uri, encode_segment(key)),
                json!({ "value": value }),
            )
            .await
    }

    pub fn thumbnails(&self) -> Thumbnails {
        Thumbnails {
            api: self.api.clone(),
            uri: format!("{}/thumbnails", self.uri),
        }
    }

    pub fn metacopies(&self) -> Metacopies {
        Metacopies {
            api: self.api.clone(),
            uri: format!("{}/metacopies", self.uri),
        }
    }
}

#[derive(Clone)]
pub struct Thumbnails {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Thumbnails {
    pub async fn generate(&self) -> Result<Value> {
        self.api.post(&self.uri, None).await
    }

    pub async fn center(&self) -> Result<Value> {
        self.api.get(&format!("{}/center", self.uri), None).await
    }

    pub async fn first(&self) -> Result<Value> {
        self.api.get(&format!("{}/first", self.uri), None).await
    }

    pub async fn last(&self) -> Result<Value> {
        self.api.get(&format!("{}/last", self.uri), None).await
    }

    pub async fn all(&self) -> Result<Value> {
        self.api
            .get(&format!("{}/all", self.uri), Some(json!({ "extended": true })))
            .await
    }

    pub async fn analyse(&self, options: Value) -> Result<Value> {
        self.api
            .post(&format!("{}/analyse", self.uri), Some(options))
            .await
    }
}

#[derive(Clone)]
pub struct Metacopies {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Metacopies {
    pub fn many(&self, _filters: Filters) -> Collection {
        Collection::new(self.api.clone(), self.uri.clone())
    }

    pub fn one(&self, id: &str) -> Metacopy {
        Metacopy {
            api: self.api.clone(),
            uri: format!("{}/{}", self.uri, encode_segment(id)),
        }
    }
}

#[derive(Clone)]
pub struct Metacopy {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Metacopy {
    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, None).await
    }

    pub async fn show(&self) -> Result<Value> {
        self.api.post(&format!("{}/show", self.uri), None).await
    }

    /// Removes the copy's record; the file on disk is kept.
    pub async fn delete(&self) -> Result<Value> {
        self.api.delete(&self.uri).await
    }
}

// ── transcodes, transactions, folders ────────────────────────────────

#[derive(Clone)]
pub struct Transcodes {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Transcodes {
    pub fn many(&self, _filters: Filters) -> Collection {
        Collection::new(self.api.clone(), self.uri.clone())
    }

    pub fn one(&self, id: &str) -> Transcode {
        Transcode {
            api: self.api.clone(),
            uri: format!("{}/{}", self.uri, encode_segment(id)),
        }
    }
}

#[derive(Clone)]
pub struct Transcode {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Transcode {
    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, None).await
    }

    pub async fn delete(&self) -> Result<Value> {
        self.api.delete(&self.uri).await
    }

    pub async fn run(&self) -> Result<Value> {
        self.api.post(&self.uri, None).await
    }

    pub async fn cancel(&self) -> Result<Value> {
        self.api.post(&format!("{}/cancel", self.uri), None).await
    }
}

#[derive(Clone)]
pub struct Transactions {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Transactions {
    pub fn many(&self, _filters: Filters) -> Collection {
        Collection::new(self.api.clone(), self.uri.clone())
    }
}

#[derive(Clone)]
pub struct Folders {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Folders {
    /// `PUT …/folders`. `pathToFolder` and `overwrite` are checked before any request.
    pub async fn put(&self, data: Value) -> Result<Value> {
        validate_folder_request(&data)?;
        self.api.put(&self.uri, data).await
    }
}

fn validate_folder_request(data: &Value) -> Result<()> {
    match data.get("pathToFolder") {
        Some(Value::String(path)) if !path.is_empty() => {}
        _ => return Err(Error::Validation("pathToFolder is required".into())),
    }
    match data.get("overwrite") {
        Some(Value::Null) | None => Err(Error::Validation("overwrite is required".into())),
        Some(_) => Ok(()),
    }
}
