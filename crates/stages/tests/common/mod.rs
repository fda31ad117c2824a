#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline::{
    ApiClient, ApiRequest, ApiResponse, Clock, Entity, Fingerprint, PipelineError, RunOptions,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use stages::{Stores, TaskContext};
use store::MemoryStore;

pub const RAW_TABLE: &str = "test_api_items";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub modified: Option<Timestamp>,
}

impl Entity for Item {
    const TABLE: &'static str = "_tool_test_items";

    fn natural_key(&self) -> String {
        self.id.to_string()
    }

    fn modified_at(&self) -> Option<Timestamp> {
        self.modified
    }
}

/// Scripted [`ApiClient`]: answers requests in order and records them.
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<VecDeque<Result<ApiResponse, PipelineError>>>,
    pub requests: Mutex<Vec<ApiRequest>>,
}

impl FakeApi {
    pub fn new(responses: Vec<Result<ApiResponse, PipelineError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::default(),
        })
    }

    /// One JSON-array page per entry, holding that many items with
    /// consecutive ids.
    pub fn pages(sizes: &[usize]) -> Arc<Self> {
        let mut next_id = 1;
        let responses = sizes
            .iter()
            .map(|&n| {
                let items: Vec<_> = (next_id..next_id + n as u64)
                    .map(|id| serde_json::json!({ "id": id, "name": format!("item {id}") }))
                    .collect();
                next_id += n as u64;
                Ok(json_response(serde_json::Value::Array(items)))
            })
            .collect();
        Self::new(responses)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn query_of(&self, index: usize) -> Vec<(String, String)> {
        self.requests.lock()[index].query.clone()
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, PipelineError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::storage("fake api script exhausted")))
    }
}

pub fn json_response(value: serde_json::Value) -> ApiResponse {
    ApiResponse {
        status: 200,
        body: serde_json::to_vec(&value).unwrap(),
    }
}

/// A clock that only moves when told to.
pub struct ManualClock(Mutex<Timestamp>);

impl ManualClock {
    pub fn at(rfc3339: &str) -> Arc<Self> {
        Arc::new(Self(Mutex::new(ts(rfc3339))))
    }

    pub fn set(&self, rfc3339: &str) {
        *self.0.lock() = ts(rfc3339);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.0.lock()
    }
}

pub fn ts(rfc3339: &str) -> Timestamp {
    Timestamp::parse_rfc3339(rfc3339).unwrap()
}

pub fn fingerprint() -> Fingerprint {
    Fingerprint::new()
        .with_int("connectionId", 1)
        .with_int("projectId", 42)
}

pub fn context(api: Arc<FakeApi>, store: Arc<MemoryStore>, options: RunOptions) -> TaskContext {
    TaskContext::new(options, fingerprint(), api, Stores::shared(store))
}
