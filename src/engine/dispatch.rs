//! Orchestration of the dispatch lifecycle: every public operation mutates
//! the store first and broadcasts afterwards. A broadcast failure can never
//! fail or roll back the mutation that triggered it.

use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::event::{DispatchEvent, Topic};
use crate::models::location::LocationAck;
use crate::models::request::{GeoPoint, RequestStatus, ServiceRequest};
use crate::state::AppState;
use crate::store::Cancellation;

pub struct CreateRequest {
    pub requester_id: Uuid,
    pub pickup: GeoPoint,
    pub dropoff: Option<GeoPoint>,
    pub fare: Option<f64>,
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
}

pub struct OpenRequests {
    pub offline_warning: bool,
    pub requests: Vec<ServiceRequest>,
}

/// Deliver an availability event to the open pool and to every provider
/// currently flagged online. Presence decides who is included; offline
/// providers simply never see it.
fn publish_to_open_pool(state: &AppState, event: DispatchEvent) {
    state
        .broadcaster
        .publish(Topic::OpenRequests, event.clone());
    for provider_id in state.presence.online_providers() {
        state
            .broadcaster
            .publish(Topic::Party(provider_id), event.clone());
    }
}

fn publish_to_parties(state: &AppState, request: &ServiceRequest, event: DispatchEvent) {
    state
        .broadcaster
        .publish(Topic::Party(request.requester_id), event.clone());
    if let Some(provider_id) = request.provider_id {
        state.broadcaster.publish(Topic::Party(provider_id), event);
    }
}

pub fn create(state: &AppState, input: CreateRequest) -> Result<ServiceRequest, DispatchError> {
    if !input.pickup.is_valid() {
        return Err(DispatchError::Validation(
            "pickup coordinates out of range".to_string(),
        ));
    }
    if let Some(dropoff) = &input.dropoff {
        if !dropoff.is_valid() {
            return Err(DispatchError::Validation(
                "dropoff coordinates out of range".to_string(),
            ));
        }
    }
    for (name, value) in [
        ("fare", input.fare),
        ("distance_km", input.distance_km),
        ("duration_min", input.duration_min),
    ] {
        if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
            return Err(DispatchError::Validation(format!(
                "{name} must be a non-negative number"
            )));
        }
    }

    let request = ServiceRequest::new(
        input.requester_id,
        input.pickup,
        input.dropoff,
        input.fare,
        input.distance_km,
        input.duration_min,
    );
    state.store.insert(request.clone());

    state.metrics.requests_created_total.inc();
    state.metrics.open_requests.inc();

    publish_to_open_pool(
        state,
        DispatchEvent::RequestCreated {
            request: request.clone(),
        },
    );

    info!(request_id = %request.id, requester_id = %request.requester_id, "request created");
    Ok(request)
}

/// Open requests visible to a provider. An offline provider is warned, not
/// blocked; the warning travels back in the response and into the log.
pub fn list_open(state: &AppState, provider_id: Uuid) -> OpenRequests {
    let offline_warning = !state.presence.is_online(provider_id);
    if offline_warning {
        warn!(%provider_id, "offline provider listing open requests");
    }

    OpenRequests {
        offline_warning,
        requests: state.store.list_open(),
    }
}

/// First acceptor wins. The pre-check against an existing active assignment
/// is a fast-path rejection only; the store's conditional write is the
/// authoritative arbiter of the race. A loser gets a definitive error and
/// must re-list open requests rather than retry.
pub fn accept(
    state: &AppState,
    request_id: Uuid,
    provider_id: Uuid,
) -> Result<ServiceRequest, DispatchError> {
    let start = Instant::now();

    let result = if state.store.active_for_provider(provider_id).is_some() {
        Err(DispatchError::AlreadyAssigned)
    } else {
        state.store.try_accept(request_id, provider_id)
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(DispatchError::AlreadyTaken) => "already_taken",
        Err(DispatchError::AlreadyAssigned) => "already_assigned",
        Err(DispatchError::NotFound(_)) => "not_found",
        Err(_) => "error",
    };
    state
        .metrics
        .accept_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state.metrics.accepts_total.with_label_values(&[outcome]).inc();

    let request = result?;
    state.metrics.open_requests.dec();

    state.broadcaster.publish(
        Topic::Party(request.requester_id),
        DispatchEvent::RequestAccepted {
            request: request.clone(),
        },
    );
    publish_to_open_pool(
        state,
        DispatchEvent::RequestUnavailable {
            request_id: request.id,
        },
    );

    info!(request_id = %request.id, %provider_id, "request accepted");
    Ok(request)
}

/// Forward lifecycle advance: arrived, started, completed. Cancellation has
/// its own operation so a reason can be recorded.
pub fn update_status(
    state: &AppState,
    request_id: Uuid,
    caller_id: Uuid,
    target: RequestStatus,
) -> Result<ServiceRequest, DispatchError> {
    if target == RequestStatus::Cancelled {
        return Err(DispatchError::Validation(
            "use the cancel operation to cancel a request".to_string(),
        ));
    }

    let request = state.store.transition(request_id, caller_id, target, None)?;

    state
        .metrics
        .transitions_total
        .with_label_values(&[status_label(target)])
        .inc();

    publish_to_parties(
        state,
        &request,
        DispatchEvent::StatusChanged {
            request: request.clone(),
        },
    );

    info!(request_id = %request.id, status = ?request.status, "status advanced");
    Ok(request)
}

pub fn cancel(
    state: &AppState,
    request_id: Uuid,
    caller_id: Uuid,
    reason: Option<String>,
) -> Result<ServiceRequest, DispatchError> {
    let request = state.store.transition(
        request_id,
        caller_id,
        RequestStatus::Cancelled,
        Some(Cancellation {
            by: caller_id,
            reason,
        }),
    )?;

    state
        .metrics
        .transitions_total
        .with_label_values(&["cancelled"])
        .inc();

    publish_to_parties(
        state,
        &request,
        DispatchEvent::RequestCancelled {
            request: request.clone(),
        },
    );

    // A request cancelled before acceptance was still visible in provider
    // views; tell the pool to drop it.
    if request.provider_id.is_none() {
        state.metrics.open_requests.dec();
        publish_to_open_pool(
            state,
            DispatchEvent::RequestUnavailable {
                request_id: request.id,
            },
        );
    }

    info!(request_id = %request.id, cancelled_by = %caller_id, "request cancelled");
    Ok(request)
}

pub fn update_location(
    state: &AppState,
    request_id: Uuid,
    provider_id: Uuid,
    point: GeoPoint,
) -> Result<LocationAck, DispatchError> {
    if !point.is_valid() {
        return Err(DispatchError::Validation(
            "coordinates out of range".to_string(),
        ));
    }

    // The history append happens under the request's shard guard, so the
    // history tail can never disagree with `current_point`.
    let (request, ack) = state
        .store
        .record_position(request_id, provider_id, point, |request| {
            state.tracker.record(request, point)
        })?;

    state.metrics.location_samples_total.inc();

    publish_to_parties(
        state,
        &request,
        DispatchEvent::LocationUpdated { update: ack.clone() },
    );

    Ok(ack)
}

pub fn rate(
    state: &AppState,
    request_id: Uuid,
    requester_id: Uuid,
    rating: u8,
    feedback: Option<String>,
) -> Result<ServiceRequest, DispatchError> {
    let request = state.store.rate(request_id, requester_id, rating, feedback)?;
    info!(request_id = %request.id, rating, "request rated");
    Ok(request)
}

pub fn active_for_provider(state: &AppState, provider_id: Uuid) -> Option<ServiceRequest> {
    state.store.active_for_provider(provider_id)
}

pub fn active_for_requester(state: &AppState, requester_id: Uuid) -> Option<ServiceRequest> {
    state.store.active_for_requester(requester_id)
}

fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Requested => "requested",
        RequestStatus::Accepted => "accepted",
        RequestStatus::Arrived => "arrived",
        RequestStatus::Started => "started",
        RequestStatus::Completed => "completed",
        RequestStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{accept, cancel, create, list_open, rate, update_location, update_status};
    use super::CreateRequest;
    use crate::config::Config;
    use crate::error::DispatchError;
    use crate::models::event::{DispatchEvent, Topic};
    use crate::models::request::{GeoPoint, RequestStatus};
    use crate::state::AppState;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(&Config::default()))
    }

    fn pickup() -> GeoPoint {
        GeoPoint {
            lat: 28.60,
            lng: 77.10,
        }
    }

    fn dropoff() -> GeoPoint {
        GeoPoint {
            lat: 28.70,
            lng: 77.20,
        }
    }

    fn new_request(state: &AppState, requester: Uuid) -> Uuid {
        create(
            state,
            CreateRequest {
                requester_id: requester,
                pickup: pickup(),
                dropoff: Some(dropoff()),
                fare: Some(120.0),
                distance_km: Some(9.5),
                duration_min: Some(24.0),
            },
        )
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_coordinates() {
        let state = state();
        let err = create(
            &state,
            CreateRequest {
                requester_id: Uuid::new_v4(),
                pickup: GeoPoint {
                    lat: 91.0,
                    lng: 0.0,
                },
                dropoff: None,
                fare: None,
                distance_km: None,
                duration_min: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn concurrent_accepts_on_one_request_have_one_winner() {
        let state = state();
        let request_id = new_request(&state, Uuid::new_v4());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                tokio::task::spawn_blocking(move || accept(&state, request_id, Uuid::new_v4()))
            })
            .collect();

        let mut winners = 0;
        let mut taken = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(request) => {
                    winners += 1;
                    assert_eq!(request.status, RequestStatus::Accepted);
                    assert!(request.provider_id.is_some());
                }
                Err(DispatchError::AlreadyTaken) => taken += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(taken, 7);
    }

    #[tokio::test]
    async fn acceptance_notifies_requester_and_open_pool() {
        let state = state();
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let other_provider = Uuid::new_v4();
        state.presence.set_online(other_provider, true, None);

        let mut requester_rx = state.broadcaster.subscribe(Topic::Party(requester));
        let mut pool_rx = state.broadcaster.subscribe(Topic::Party(other_provider));

        let request_id = new_request(&state, requester);
        accept(&state, request_id, provider).unwrap();

        match requester_rx.recv().await.unwrap() {
            DispatchEvent::RequestAccepted { request } => {
                assert_eq!(request.provider_id, Some(provider));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The online bystander first saw the creation, then the removal.
        assert!(matches!(
            pool_rx.recv().await.unwrap(),
            DispatchEvent::RequestCreated { .. }
        ));
        assert!(matches!(
            pool_rx.recv().await.unwrap(),
            DispatchEvent::RequestUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn cancel_before_acceptance_keeps_provider_null() {
        let state = state();
        let requester = Uuid::new_v4();
        let request_id = new_request(&state, requester);

        let cancelled = cancel(&state, request_id, requester, Some("typo".to_string())).unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(requester));
        assert!(cancelled.provider_id.is_none());
    }

    #[tokio::test]
    async fn unbound_provider_cannot_advance_status() {
        let state = state();
        let request_id = new_request(&state, Uuid::new_v4());
        accept(&state, request_id, Uuid::new_v4()).unwrap();

        let err =
            update_status(&state, request_id, Uuid::new_v4(), RequestStatus::Arrived).unwrap_err();
        assert!(matches!(err, DispatchError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn update_status_refuses_cancelled_target() {
        let state = state();
        let requester = Uuid::new_v4();
        let request_id = new_request(&state, requester);

        let err =
            update_status(&state, request_id, requester, RequestStatus::Cancelled).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn full_trip_with_location_history() {
        let state = state();
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();

        let request_id = new_request(&state, requester);
        accept(&state, request_id, provider).unwrap();

        let samples = [
            GeoPoint {
                lat: 28.62,
                lng: 77.12,
            },
            GeoPoint {
                lat: 28.65,
                lng: 77.15,
            },
            GeoPoint {
                lat: 28.69,
                lng: 77.19,
            },
        ];
        for point in samples {
            let ack = update_location(&state, request_id, provider, point).unwrap();
            assert_eq!(ack.point, point);
        }

        update_status(&state, request_id, provider, RequestStatus::Arrived).unwrap();
        update_status(&state, request_id, provider, RequestStatus::Started).unwrap();
        let done =
            update_status(&state, request_id, provider, RequestStatus::Completed).unwrap();

        assert_eq!(done.status, RequestStatus::Completed);
        assert!(done.completed_at.is_some());

        let history = state.tracker.history(request_id);
        assert_eq!(history.len(), 3);
        assert_eq!(done.current_point, Some(samples[2]));
        assert_eq!(history[2].point, samples[2]);

        let rated = rate(&state, request_id, requester, 5, Some("great".to_string())).unwrap();
        assert_eq!(rated.rating, Some(5));
        assert!(matches!(
            rate(&state, request_id, requester, 5, None),
            Err(DispatchError::Validation(_))
        ));
    }

    #[test]
    fn concurrent_samples_keep_current_point_and_history_aligned() {
        let state = state();
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();

        let request_id = new_request(&state, requester);
        accept(&state, request_id, provider).unwrap();

        let rounds = 200usize;
        let barrier = std::sync::Barrier::new(2);
        std::thread::scope(|scope| {
            for offset in [0.0, 0.001] {
                let state = &state;
                let barrier = &barrier;
                scope.spawn(move || {
                    for round in 0..rounds {
                        barrier.wait();
                        let point = GeoPoint {
                            lat: 28.62 + round as f64 * 1e-4 + offset,
                            lng: 77.12,
                        };
                        update_location(state, request_id, provider, point).unwrap();
                    }
                });
            }
        });

        let request = state.store.get(request_id).unwrap();
        let history = state.tracker.history(request_id);
        assert_eq!(history.len(), rounds * 2);
        assert_eq!(
            request.current_point,
            Some(history.last().unwrap().point)
        );
    }

    #[tokio::test]
    async fn location_updates_rejected_outside_active_statuses() {
        let state = state();
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let request_id = new_request(&state, requester);

        // Still requested: no provider is bound yet.
        assert!(matches!(
            update_location(&state, request_id, provider, pickup()),
            Err(DispatchError::NotAuthorized(_))
        ));

        accept(&state, request_id, provider).unwrap();
        cancel(&state, request_id, requester, None).unwrap();

        assert!(matches!(
            update_location(&state, request_id, provider, pickup()),
            Err(DispatchError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn offline_provider_is_warned_not_blocked() {
        let state = state();
        let provider = Uuid::new_v4();
        new_request(&state, Uuid::new_v4());

        let listing = list_open(&state, provider);
        assert!(listing.offline_warning);
        assert_eq!(listing.requests.len(), 1);

        state.presence.set_online(provider, true, None);
        let listing = list_open(&state, provider);
        assert!(!listing.offline_warning);
        assert_eq!(listing.requests.len(), 1);
    }
}
