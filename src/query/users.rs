use std::sync::Arc;

use serde_json::Value;

use super::{encode_segment, Collection, Filters};
use crate::{error::Result, facade::RequestFacade};

#[derive(Clone)]
pub struct Users {
    api: Arc<RequestFacade>,
}

impl Users {
    pub(crate) fn new(api: Arc<RequestFacade>) -> Self {
        Self { api }
    }

    pub fn many(&self, _filters: Filters) -> Collection {
        Collection::new(self.api.clone(), "/users".into())
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        self.api.post("/users", Some(data)).await
    }

    pub fn one(&self, id: &str) -> UserResource {
        UserResource {
            api: self.api.clone(),
            uri: format!("/users/{}", encode_segment(id)),
        }
    }
}

#[derive(Clone)]
pub struct UserResource {
    api: Arc<RequestFacade>,
    uri: String,
}

impl UserResource {
    pub async fn fetch(&self) -> Result<Value> {
        self.api.get(&self.uri, None).await
    }

    pub async fn put(&self, data: Value) -> Result<Value> {
        self.api.put(&self.uri, data).await
    }

    pub async fn delete(&self) -> Result<Value> {
        self.api.delete(&self.uri).await
    }
}
