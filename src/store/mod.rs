use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::DispatchError;
use crate::models::request::{GeoPoint, RequestStatus, ServiceRequest};

/// Recorded when a request is cancelled.
#[derive(Debug, Clone)]
pub struct Cancellation {
    pub by: Uuid,
    pub reason: Option<String>,
}

/// In-process durable record of every request, plus an index of which
/// provider currently holds which active assignment. Records are inserted
/// once and mutated in place under their shard guard; they are never removed.
pub struct RequestStore {
    requests: DashMap<Uuid, ServiceRequest>,
    active_by_provider: DashMap<Uuid, Uuid>,
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStore {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
            active_by_provider: DashMap::new(),
        }
    }

    pub fn insert(&self, request: ServiceRequest) {
        self.requests.insert(request.id, request);
    }

    pub fn get(&self, id: Uuid) -> Option<ServiceRequest> {
        self.requests.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn list_open(&self) -> Vec<ServiceRequest> {
        self.requests
            .iter()
            .filter(|entry| entry.value().status == RequestStatus::Requested)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn active_for_provider(&self, provider_id: Uuid) -> Option<ServiceRequest> {
        let request_id = *self.active_by_provider.get(&provider_id)?;
        self.get(request_id)
    }

    /// Most recently created wins when a requester has several live
    /// requests, so repeated polls see the same record.
    pub fn active_for_requester(&self, requester_id: Uuid) -> Option<ServiceRequest> {
        self.requests
            .iter()
            .filter(|entry| {
                let req = entry.value();
                req.requester_id == requester_id
                    && (req.status == RequestStatus::Requested || req.status.is_active())
            })
            .max_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.value().clone())
    }

    /// The acceptance race is decided here. The provider's slot in
    /// `active_by_provider` is claimed through the entry API; while that
    /// guard is held the request is flipped under its own shard guard, and
    /// only if its status is still `Requested`. Concurrent accepts of the
    /// same request serialize on the request guard and all but the first
    /// observe a non-`Requested` status; concurrent accepts by the same
    /// provider serialize on the slot. No read-then-write gap in either case.
    pub fn try_accept(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<ServiceRequest, DispatchError> {
        match self.active_by_provider.entry(provider_id) {
            Entry::Occupied(_) => Err(DispatchError::AlreadyAssigned),
            Entry::Vacant(slot) => {
                let mut request = self.requests.get_mut(&request_id).ok_or_else(|| {
                    DispatchError::NotFound(format!("request {request_id} not found"))
                })?;

                if request.status != RequestStatus::Requested {
                    return Err(DispatchError::AlreadyTaken);
                }

                request.provider_id = Some(provider_id);
                request.status = RequestStatus::Accepted;
                request.accepted_at = Some(Utc::now());
                slot.insert(request_id);

                Ok(request.clone())
            }
        }
    }

    /// Advance a request along the lifecycle graph. Authorization and edge
    /// validation happen under the request's shard guard, so a transition
    /// racing an accept (or another transition) sees a settled status. When
    /// a terminal status is reached the provider's slot is released after
    /// the guard is dropped.
    pub fn transition(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
        target: RequestStatus,
        cancellation: Option<Cancellation>,
    ) -> Result<ServiceRequest, DispatchError> {
        let (snapshot, released_provider) = {
            let mut request = self.requests.get_mut(&request_id).ok_or_else(|| {
                DispatchError::NotFound(format!("request {request_id} not found"))
            })?;

            lifecycle::authorize(&request, caller_id, target)?;
            lifecycle::check_edge(request.status, target)?;

            let now = Utc::now();
            request.status = target;
            match target {
                RequestStatus::Arrived => request.arrived_at = Some(now),
                RequestStatus::Started => request.started_at = Some(now),
                RequestStatus::Completed => request.completed_at = Some(now),
                RequestStatus::Cancelled => {
                    request.cancelled_at = Some(now);
                    if let Some(cancel) = cancellation {
                        request.cancelled_by = Some(cancel.by);
                        request.cancellation_reason = cancel.reason;
                    }
                }
                // Unreachable once check_edge has passed.
                RequestStatus::Requested | RequestStatus::Accepted => {}
            }

            let released = if target.is_terminal() {
                request.provider_id
            } else {
                None
            };

            (request.clone(), released)
        };

        if let Some(provider_id) = released_provider {
            self.active_by_provider
                .remove_if(&provider_id, |_, held| *held == request_id);
        }

        Ok(snapshot)
    }

    /// Overwrite the live position of an active request. Binding and status
    /// are checked under the request's shard guard, so a sample racing a
    /// terminal transition cannot land after the request settles. The
    /// `on_commit` callback runs while the guard is still held; the tracker
    /// appends its history sample there, keeping `current_point` and the
    /// history tail in lockstep under concurrent samplers.
    pub fn record_position<T>(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        point: GeoPoint,
        on_commit: impl FnOnce(&ServiceRequest) -> T,
    ) -> Result<(ServiceRequest, T), DispatchError> {
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| DispatchError::NotFound(format!("request {request_id} not found")))?;

        if request.provider_id != Some(provider_id) {
            return Err(DispatchError::NotAuthorized(
                "only the bound provider may report a position".to_string(),
            ));
        }
        if !request.status.is_active() {
            return Err(DispatchError::InvalidTransition(format!(
                "request is {:?}, not active",
                request.status
            )));
        }

        request.current_point = Some(point);
        let out = on_commit(&request);
        Ok((request.clone(), out))
    }

    /// Rating is write-once, post-completion, requester only.
    pub fn rate(
        &self,
        request_id: Uuid,
        requester_id: Uuid,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<ServiceRequest, DispatchError> {
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| DispatchError::NotFound(format!("request {request_id} not found")))?;

        if request.requester_id != requester_id {
            return Err(DispatchError::NotAuthorized(
                "only the requester may rate".to_string(),
            ));
        }
        if request.status != RequestStatus::Completed {
            return Err(DispatchError::InvalidTransition(
                "request is not completed".to_string(),
            ));
        }
        if request.rating.is_some() {
            return Err(DispatchError::Validation(
                "request already rated".to_string(),
            ));
        }
        if !(1..=5).contains(&rating) {
            return Err(DispatchError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        request.rating = Some(rating);
        request.feedback = feedback;
        Ok(request.clone())
    }
}
