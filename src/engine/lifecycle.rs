//! Legal status transitions and who may invoke them.
//!
//! The graph is `requested → accepted → arrived → started → completed`,
//! with `cancelled` reachable from every non-terminal status. Acceptance
//! never goes through here; it is owned by the acceptance path in the store.

use crate::error::DispatchError;
use crate::models::request::{RequestStatus, ServiceRequest};

/// Whether `target` is a legal next status from `current`.
pub fn check_edge(current: RequestStatus, target: RequestStatus) -> Result<(), DispatchError> {
    use RequestStatus::*;

    let legal = match target {
        Arrived => current == Accepted,
        Started => current == Arrived,
        Completed => current == Started,
        Cancelled => !current.is_terminal(),
        // `Requested` is only ever an initial status and `Accepted` is
        // reserved for the acceptance coordinator.
        Requested | Accepted => false,
    };

    if legal {
        Ok(())
    } else {
        Err(DispatchError::InvalidTransition(format!(
            "{current:?} -> {target:?}"
        )))
    }
}

/// Forward advances belong to the bound provider; cancellation belongs to
/// either party. Anyone else is rejected regardless of the target status.
pub fn authorize(
    request: &ServiceRequest,
    caller_id: uuid::Uuid,
    target: RequestStatus,
) -> Result<(), DispatchError> {
    if !request.is_party(caller_id) {
        return Err(DispatchError::NotAuthorized(format!(
            "caller {caller_id} is not a party to request {}",
            request.id
        )));
    }

    match target {
        RequestStatus::Cancelled => Ok(()),
        _ if request.provider_id == Some(caller_id) => Ok(()),
        _ => Err(DispatchError::NotAuthorized(
            "only the bound provider may advance the request".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{authorize, check_edge};
    use crate::error::DispatchError;
    use crate::models::request::RequestStatus::*;
    use crate::models::request::{GeoPoint, ServiceRequest};

    #[test]
    fn forward_edges_follow_the_graph() {
        assert!(check_edge(Accepted, Arrived).is_ok());
        assert!(check_edge(Arrived, Started).is_ok());
        assert!(check_edge(Started, Completed).is_ok());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        assert!(check_edge(Accepted, Started).is_err());
        assert!(check_edge(Accepted, Completed).is_err());
        assert!(check_edge(Arrived, Completed).is_err());
        assert!(check_edge(Requested, Arrived).is_err());
    }

    #[test]
    fn cancel_reachable_from_every_non_terminal_status() {
        for current in [Requested, Accepted, Arrived, Started] {
            assert!(check_edge(current, Cancelled).is_ok(), "{current:?}");
        }
        for current in [Completed, Cancelled] {
            assert!(check_edge(current, Cancelled).is_err(), "{current:?}");
        }
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for current in [Completed, Cancelled] {
            for target in [Requested, Accepted, Arrived, Started, Completed, Cancelled] {
                assert!(check_edge(current, target).is_err());
            }
        }
    }

    #[test]
    fn requested_and_accepted_are_never_targets() {
        for current in [Requested, Accepted, Arrived, Started] {
            assert!(check_edge(current, Requested).is_err());
            assert!(check_edge(current, Accepted).is_err());
        }
    }

    #[test]
    fn only_the_bound_provider_advances() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let point = GeoPoint {
            lat: 28.6139,
            lng: 77.2090,
        };
        let mut request = ServiceRequest::new(requester, point, None, None, None, None);
        request.provider_id = Some(provider);
        request.status = Accepted;

        assert!(authorize(&request, provider, Arrived).is_ok());
        assert!(matches!(
            authorize(&request, requester, Arrived),
            Err(DispatchError::NotAuthorized(_))
        ));
        assert!(matches!(
            authorize(&request, stranger, Arrived),
            Err(DispatchError::NotAuthorized(_))
        ));

        assert!(authorize(&request, requester, Cancelled).is_ok());
        assert!(authorize(&request, provider, Cancelled).is_ok());
        assert!(authorize(&request, stranger, Cancelled).is_err());
    }
}
