//! Makes sure every configured blackout exists on the alert service.

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    alerta::{AlertService, Blackout},
    metrics,
    store::BlackoutDefinition,
    Result,
};

pub struct BlackoutSynchronizer {
    alerta: Arc<dyn AlertService>,
}

impl BlackoutSynchronizer {
    pub fn new(alerta: Arc<dyn AlertService>) -> Self {
        Self { alerta }
    }

    /// A live blackout covers a desired one when it is active for the same
    /// environment and service list. Other fields are not compared.
    fn is_covered(desired: &BlackoutDefinition, live: &[Blackout]) -> bool {
        live.iter().any(|blackout| {
            blackout.is_active()
                && blackout.environment == desired.environment
                && blackout.service == desired.service
        })
    }

    /// Create every desired blackout that is not already active. Returns the
    /// number created; the first failed creation aborts the sync.
    pub async fn sync(&self, desired: &[BlackoutDefinition]) -> Result<usize> {
        if desired.is_empty() {
            debug!("No blackouts configured");
            return Ok(0);
        }

        let live = self.alerta.list_blackouts().await?;
        let mut created = 0;

        for blackout in desired {
            if Self::is_covered(blackout, &live) {
                debug!(
                    "Blackout for {} {:?} is already active",
                    blackout.environment, blackout.service
                );
                continue;
            }

            let id = self.alerta.create_blackout(blackout).await?;
            info!(
                "Created blackout {} for {} {:?}",
                id.as_deref().unwrap_or("<unknown>"),
                blackout.environment,
                blackout.service
            );
            metrics::BLACKOUTS_CREATED_TOTAL.inc();
            created += 1;
        }

        Ok(created)
    }
}
