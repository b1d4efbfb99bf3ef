//! Resolving which learner an operation acts for.

use uuid::Uuid;

use owlet_db::models::Learner;
use owlet_db::store::EngineStore;

use crate::error::ApiError;

/// Resolve the learner an authenticated guardian is acting as: themselves,
/// or — with an explicit `child_id` — one of their child profiles.
///
/// Fails NotFound for an unknown child and Auth when the caller is not
/// that child's guardian.
pub async fn resolve(
    store: &dyn EngineStore,
    caller: Uuid,
    child_id: Option<Uuid>,
) -> Result<Learner, ApiError> {
    match child_id {
        None => Ok(Learner::Account(caller)),
        Some(child) => {
            let guardian = store
                .child_guardian(child)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("child profile {child} does not exist")))?;

            if guardian != caller {
                return Err(ApiError::Auth(
                    "You are not the guardian of this child profile".to_string(),
                ));
            }

            Ok(Learner::Child(child))
        }
    }
}
