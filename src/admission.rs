//! Admission verdicts: admit now, queue for later, or reject.
//!
//! Sits in front of the engine the way an API gateway filter would. A
//! request is first offered to the shared rate limiter (and to its
//! provider's limiter when one is configured); if the limiters deny it,
//! the request is parked in the normal queue of its class instead of
//! being dropped, up to a per-queue depth cap.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock;
use crate::engine::config::EngineConfig;
use crate::engine::Engine;
use crate::entry::QueueClass;
use crate::limit::DynamicLimit;
use crate::limiter::{BucketLimiter, BucketRegistry};

/// One inbound request, reduced to what admission needs.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub path: String,
    pub user_id: Option<i64>,
    pub access_token: Option<String>,
    /// Captured request summary, queued alongside the identity so a parked
    /// request can be replayed downstream.
    pub http_request: Option<HttpRequestSummary>,
    /// Payment provider the request targets; `None` uses the configured
    /// default.
    pub provider: Option<String>,
}

/// What gets captured from the original HTTP request when it is queued.
/// Sorted headers keep the serialized form (and so the entry key) stable
/// for a given request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequestSummary {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Wire shape of a queued entry's payload when a request summary was
/// captured. Without one the payload is the bare identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub key: String,
    pub http_request: HttpRequestSummary,
}

impl AdmissionRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            user_id: None,
            access_token: None,
            http_request: None,
            provider: None,
        }
    }

    /// Identity used for queue placement: user id when known, then
    /// access token, then the path itself.
    fn queue_key(&self) -> String {
        if let Some(id) = self.user_id {
            return id.to_string();
        }
        if let Some(token) = &self.access_token {
            return token.clone();
        }
        self.path.clone()
    }

    /// The payload stored in the queue: the captured request envelope when
    /// one exists, otherwise just the identity key.
    fn queue_payload(&self) -> String {
        match &self.http_request {
            Some(summary) => serde_json::to_string(&QueuedRequest {
                key: self.queue_key(),
                http_request: summary.clone(),
            })
            .unwrap_or_else(|_| self.queue_key()),
            None => self.queue_key(),
        }
    }
}

/// The admission decision, in the wire shape downstream clients expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub allowed: bool,
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u64>,
    pub current_limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_type: Option<String>,
    pub message: String,
}

impl Verdict {
    pub fn allowed(current_limit: i64) -> Self {
        Self {
            allowed: true,
            queued: false,
            queue_position: None,
            current_limit,
            queue_type: None,
            message: "request admitted".to_string(),
        }
    }

    pub fn queued(position: u64, current_limit: i64, queue_type: &str) -> Self {
        Self {
            allowed: false,
            queued: true,
            queue_position: Some(position),
            current_limit,
            queue_type: Some(queue_type.to_string()),
            message: "rate limit exceeded, request queued".to_string(),
        }
    }

    pub fn rejected(current_limit: i64, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            queued: false,
            queue_position: None,
            current_limit,
            queue_type: None,
            message: message.into(),
        }
    }
}

/// Decides, for each request, between immediate admission, queueing, and
/// rejection. Shares the bucket registry with the engine so the verdict
/// path and the poll path see the same water levels.
pub struct AdmissionService {
    engine: Arc<Engine>,
    global: BucketLimiter,
    providers: HashMap<String, BucketLimiter>,
    max_queue_depth: u64,
    order_path_prefix: String,
    default_provider: String,
}

impl AdmissionService {
    /// Build the service from configuration, creating the global limiter
    /// and one limiter per configured provider.
    pub fn from_config(
        engine: Arc<Engine>,
        buckets: Arc<BucketRegistry>,
        global_limit: Arc<DynamicLimit>,
        config: &EngineConfig,
    ) -> Self {
        let global =
            BucketLimiter::global(Arc::clone(&buckets), global_limit, config.bucket.capacity);
        let providers = config
            .providers
            .iter()
            .map(|(name, p)| {
                let limiter = BucketLimiter::provider(
                    name.clone(),
                    Arc::clone(&buckets),
                    p.capacity,
                    p.rate,
                    p.min_rate,
                    p.max_rate,
                );
                (name.clone(), limiter)
            })
            .collect();

        Self {
            engine,
            global,
            providers,
            max_queue_depth: config.admission.max_queue_depth,
            order_path_prefix: config.admission.order_path_prefix.clone(),
            default_provider: config.admission.default_provider.clone(),
        }
    }

    pub fn decide(&self, request: &AdmissionRequest) -> Verdict {
        self.decide_at(request, clock::now_ms())
    }

    /// Deterministic variant with a caller-supplied clock.
    pub fn decide_at(&self, request: &AdmissionRequest, now_ms: u64) -> Verdict {
        if !self.global.try_consume_at(now_ms) {
            return self.queue_request(request, now_ms, self.global.current_limit());
        }

        // The shared bucket admitted the request; its provider still gets
        // a say when a scoped limiter is configured.
        if let Some(provider) = self.provider_limiter(request) {
            if !provider.try_consume_at(now_ms) {
                debug!(provider = provider.provider_name(), "provider limiter denied");
                return self.queue_request(request, now_ms, provider.current_limit());
            }
        }

        Verdict::allowed(self.global.current_limit())
    }

    /// The limiter scoped to the request's provider, if one is configured.
    pub fn provider_limiter(&self, request: &AdmissionRequest) -> Option<&BucketLimiter> {
        let name = request
            .provider
            .as_deref()
            .unwrap_or(&self.default_provider);
        self.providers.get(name)
    }

    pub fn global_limiter(&self) -> &BucketLimiter {
        &self.global
    }

    /// Route by path: order endpoints queue into the ORDER class,
    /// everything else into OTHER. Admission only ever queues into the
    /// normal queues; retries are re-enqueued by the processing side.
    fn queue_for(&self, path: &str) -> QueueClass {
        if path.starts_with(&self.order_path_prefix) {
            QueueClass::OrderNormal
        } else {
            QueueClass::OtherNormal
        }
    }

    fn queue_request(&self, request: &AdmissionRequest, now_ms: u64, limit: i64) -> Verdict {
        let queue = self.queue_for(&request.path);

        match self.engine.depth(queue) {
            Ok(depth) if depth >= self.max_queue_depth => {
                warn!(%queue, depth, "queue at capacity, rejecting");
                return Verdict::rejected(limit, "queue capacity exceeded, request rejected");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "engine unreachable, rejecting");
                return Verdict::rejected(limit, "admission engine unavailable");
            }
        }

        match self.engine.enqueue(queue, request.queue_payload(), now_ms) {
            Ok(position) => {
                debug!(%queue, position, "request queued");
                Verdict::queued(position, limit, queue.class_label())
            }
            Err(e) => {
                warn!(error = %e, "engine unreachable, rejecting");
                Verdict::rejected(limit, "admission engine unavailable")
            }
        }
    }
}
