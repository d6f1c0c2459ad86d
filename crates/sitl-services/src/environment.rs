//! Environment region cache with shared-ownership snapshots.
//!
//! Regions arrive from the external driver as plain wire payloads and are
//! cached behind `Arc`s. In-process consumers look regions up with the
//! local-only `EnvQuery` message and receive an `EnvSnapshot` carrying a
//! stable `Arc` — no copying, no coupling to this service, and structurally
//! impossible to route through the bridge. Updates swap the `Arc`, so a
//! snapshot already handed out stays internally consistent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use sitl_bus::{capabilities, Component, Handle, MessageBus, TypedPublisher};
use sitl_core::messages::{
    EnvQueryPayload, EnvSnapshotPayload, EnvironmentAckPayload, EnvironmentPayload,
    EnvironmentRequestPayload, Point2,
};

/// Cache misses trigger at most one external request per this interval.
const REQUEST_THROTTLE: Duration = Duration::from_millis(500);

pub struct EnvironmentService {
    bus: TypedPublisher<EnvironmentService>,
    inner: Mutex<EnvState>,
}

struct EnvState {
    cache: Vec<Arc<EnvironmentPayload>>,
    last_request: Option<Instant>,
}

capabilities! {
    EnvironmentService {
        publishes: [EnvironmentAckPayload, EnvironmentRequestPayload],
        subscribes: [EnvironmentPayload],
        publishes_local: [EnvSnapshotPayload],
        subscribes_local: [EnvQueryPayload],
    }
}

impl EnvironmentService {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let svc = Arc::new(Self {
            bus: TypedPublisher::new(bus.clone()),
            inner: Mutex::new(EnvState {
                cache: Vec::new(),
                last_request: None,
            }),
        });
        EnvironmentService::bind_subscriptions(&svc, &bus);
        svc
    }

    pub fn cached_regions(&self) -> usize {
        self.inner.lock().cache.len()
    }
}

impl Handle<EnvironmentPayload> for EnvironmentService {
    fn handle(&self, env: &EnvironmentPayload) {
        let region_id = env.region_id;
        let ambient_temp_c = env.ambient_temp_c;
        {
            let mut inner = self.inner.lock();
            let existing = inner.cache.iter().position(|r| {
                let id = r.region_id;
                id == region_id
            });
            match existing {
                Some(i) => inner.cache[i] = Arc::new(*env),
                None => inner.cache.push(Arc::new(*env)),
            }
        }
        tracing::info!(region_id, ambient_temp_c, "environment region updated");
        self.bus.publish(&EnvironmentAckPayload { region_id });
    }
}

impl Handle<EnvQueryPayload> for EnvironmentService {
    fn handle(&self, query: &EnvQueryPayload) {
        let hit = {
            let inner = self.inner.lock();
            inner
                .cache
                .iter()
                .find(|r| {
                    let bounds = r.bounds;
                    bounds.contains(query.x, query.y)
                })
                .cloned()
        };

        if let Some(region) = hit {
            let region_id = region.region_id;
            tracing::debug!(region_id, "environment cache hit");
            self.bus.publish_local(&EnvSnapshotPayload { region });
            return;
        }

        // Miss: fetch from the driver, throttled.
        let should_request = {
            let mut inner = self.inner.lock();
            match inner.last_request {
                Some(at) if at.elapsed() < REQUEST_THROTTLE => false,
                _ => {
                    inner.last_request = Some(Instant::now());
                    true
                }
            }
        };
        if should_request {
            tracing::debug!(x = query.x, y = query.y, "environment miss, requesting region");
            self.bus.publish(&EnvironmentRequestPayload {
                target_location: Point2 {
                    x: query.x,
                    y: query.y,
                },
            });
        }
    }
}
