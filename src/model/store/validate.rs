//! Checks shared by the role and user stores.

use tracing::warn;

use crate::cancel::CancellationToken;
use crate::data::id::Identifier;
use crate::model::claim::Claim;
use crate::model::store::error::{IdentityError, IdentityResult};
use crate::store::{Document, DocumentSession, StoreResult};

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), IdentityError> {
    if cancel.is_cancelled() {
        return Err(IdentityError::Cancelled);
    }
    Ok(())
}

/// Rejects blank required arguments.
pub(crate) fn require(name: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.trim().is_empty() {
        return Err(IdentityError::MissingArgument { name });
    }
    Ok(())
}

pub(crate) fn require_id<D: Document>(document: &D) -> Result<Identifier, IdentityError> {
    document
        .id()
        .ok_or(IdentityError::MissingIdentifier { entity: D::COLLECTION })
}

pub(crate) fn require_claim(claim: &Claim) -> Result<(), IdentityError> {
    if claim.claim_type.trim().is_empty() {
        return Err(IdentityError::InvalidClaim);
    }
    Ok(())
}

/// Converts the outcome of a staged write and its flush into a result.
pub(crate) fn into_result(operation: &'static str, outcome: StoreResult<()>) -> IdentityResult {
    match outcome {
        Ok(()) => IdentityResult::Success,
        Err(err) => {
            warn!(operation, code = err.code(), error = %err, "persistence failure");
            IdentityResult::failed(&err)
        }
    }
}

/// Flushes the session once the staging step succeeded.
pub(crate) async fn flush_staged<S: DocumentSession>(
    session: &mut S,
    staged: StoreResult<()>,
    cancel: &CancellationToken,
) -> StoreResult<()> {
    staged?;
    session.save_changes(cancel).await
}
