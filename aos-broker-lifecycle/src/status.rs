//! Projection of backend observations onto the broker poll contract
//!
//! Query errors never produce `failed`: the platform keeps polling, so an
//! unreachable backend reads as still in progress.

use aos_broker_models::PollState;

use crate::error::GatewayError;
use crate::types::BackendState;

/// Poll state of a create or update, from a status query
pub fn progress_state(observed: &Result<BackendState, GatewayError>) -> PollState {
    match observed {
        Ok(BackendState::Running) => PollState::Succeeded,
        Ok(BackendState::Abnormal) => PollState::Failed,
        Ok(_) | Err(_) => PollState::InProgress,
    }
}

/// Poll state of a delete, from a delete confirmation
pub fn deletion_state(confirmed: &Result<bool, GatewayError>) -> PollState {
    match confirmed {
        Ok(true) => PollState::Succeeded,
        Ok(false) | Err(_) => PollState::InProgress,
    }
}
