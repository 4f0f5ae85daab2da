//! Operator claims on leads.

use std::sync::Arc;

use tracing::info;

use super::model::{Lead, LeadStatus, OperatorId};
use super::store::LeadStore;
use crate::error::ClaimError;
use crate::notify::OperatorRoster;

/// Assigns leads to operators, first claim wins.
pub struct ClaimService {
    store: Arc<dyn LeadStore>,
    roster: Arc<OperatorRoster>,
}

impl ClaimService {
    pub fn new(store: Arc<dyn LeadStore>, roster: Arc<OperatorRoster>) -> Self {
        Self { store, roster }
    }

    /// Claim `lead_id` for `operator_id`.
    ///
    /// Only roster members may claim. The store serializes concurrent claims,
    /// so exactly one of several racing operators succeeds.
    pub async fn claim(&self, lead_id: u64, operator_id: OperatorId) -> Result<Lead, ClaimError> {
        if !self.roster.contains(operator_id) {
            return Err(ClaimError::NotAuthorized { operator_id });
        }

        let claimed = self
            .store
            .set_status(lead_id, LeadStatus::Claimed, Some(operator_id))
            .await?;

        let lead = self
            .store
            .get(lead_id)
            .await?
            .ok_or(ClaimError::NotFound { lead_id })?;

        if !claimed {
            return Err(ClaimError::AlreadyClaimed {
                lead_id,
                claimed_by: lead.claimed_by.unwrap_or_default(),
            });
        }

        info!(lead_id, operator_id, "Lead claimed");
        Ok(lead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::model::LeadFields;
    use crate::leads::store::JsonFileLeadStore;

    async fn setup(tmp: &tempfile::TempDir) -> ClaimService {
        let store = Arc::new(JsonFileLeadStore::new(tmp.path().join("leads.json")));
        store
            .append(LeadFields {
                user_id: 5,
                username: None,
                name: "Ivan".into(),
                phone: "+79991234567".into(),
                service: "SMM".into(),
                business: "Coffee shop with 3 locations".into(),
                budget: "50k-100k".into(),
                contact_preference: "Telegram".into(),
            })
            .await
            .unwrap();
        ClaimService::new(store, Arc::new(OperatorRoster::new(vec![100, 200])))
    }

    #[tokio::test]
    async fn first_claim_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let claims = setup(&tmp).await;

        let lead = claims.claim(1, 100).await.unwrap();
        assert_eq!(lead.status, LeadStatus::Claimed);
        assert_eq!(lead.claimed_by, Some(100));

        let err = claims.claim(1, 200).await.unwrap_err();
        assert!(matches!(
            err,
            ClaimError::AlreadyClaimed { lead_id: 1, claimed_by: 100 }
        ));

        // Same operator again is also rejected.
        assert!(claims.claim(1, 100).await.is_err());
    }

    #[tokio::test]
    async fn non_roster_operator_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let claims = setup(&tmp).await;

        let err = claims.claim(1, 999).await.unwrap_err();
        assert!(matches!(err, ClaimError::NotAuthorized { operator_id: 999 }));

        // Lead is still claimable.
        assert!(claims.claim(1, 200).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_lead_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let claims = setup(&tmp).await;

        let err = claims.claim(42, 100).await.unwrap_err();
        assert!(matches!(err, ClaimError::NotFound { lead_id: 42 }));
    }
}
