use std::sync::Arc;

use serde_json::{json, Value};

use crate::{error::Result, facade::RequestFacade};

/// Server-side helpers that do not belong to a library.
#[derive(Clone)]
pub struct Utility {
    api: Arc<RequestFacade>,
}

impl Utility {
    pub(crate) fn new(api: Arc<RequestFacade>) -> Self {
        Self { api }
    }

    /// Indexes `path` for files of the given `types`.
    pub async fn index(&self, path: &str, types: Value) -> Result<Value> {
        self.api
            .post("/utility/index", Some(json!({ "path": path, "types": types })))
            .await
    }

    pub async fn transcode_status(&self) -> Result<Value> {
        self.api.get("/status/transcode", None).await
    }

    pub async fn luts(&self) -> Result<Value> {
        self.api.get("/utility/luts", None).await
    }

    pub async fn list(&self, path: &str, options: Value) -> Result<Value> {
        self.api
            .post("/utility/list", Some(json!({ "path": path, "options": options })))
            .await
    }
}

/// Reveals paths in the server host's file browser.
#[derive(Clone)]
pub struct Finder {
    api: Arc<RequestFacade>,
}

impl Finder {
    const OPEN_PATH: &'static str = "/finder/open/";

    pub(crate) fn new(api: Arc<RequestFacade>) -> Self {
        Self { api }
    }

    pub async fn show(&self, path: &str) -> Result<Value> {
        self.api
            .post_unversioned(Self::OPEN_PATH, json!({ "path": path }))
            .await
    }
}
