use std::sync::Arc;

use serde_json::Value;

use super::{encode_segment, Collection, Filters};
use crate::{error::Result, facade::RequestFacade};

#[derive(Clone)]
pub struct Volumes {
    api: Arc<RequestFacade>,
}

impl Volumes {
    pub(crate) fn new(api: Arc<RequestFacade>) -> Self {
        Self { api }
    }

    pub fn many(&self, _filters: Filters) -> Collection {
        Collection::new(self.api.clone(), "/volumes".into())
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        self.api.post("/volumes", Some(data)).await
    }

    pub fn one(&self, id: &str) -> Volume {
        Volume {
            api: self.api.clone(),
            uri: format!("/volumes/{}", encode_segment(id)),
        }
    }
}

#[derive(Clone)]
pub struct Volume {
    api: Arc<RequestFacade>,
    uri: String,
}

impl Volume {
    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, None).await
    }

    /// Unmounts the volume on the server host.
    pub async fn eject(&self) -> Result<Value> {
        self.api.post(&format!("{}/eject", self.uri), None).await
    }
}
