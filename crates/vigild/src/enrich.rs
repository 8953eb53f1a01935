use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use vigil_core::{FaceResult, FrameResult};
use vigil_store::{FaceStore, Reservation, StoreError};

/// A face result as sent to clients, optionally carrying the guest's
/// reservations.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedFace {
    #[serde(flatten)]
    pub face: FaceResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservations: Option<Vec<Reservation>>,
}

/// Where reservations for a contact come from.
pub trait ReservationLookup: Clone + Send + Sync + 'static {
    fn reservations(&self, contact: &str) -> impl Future<Output = Result<Vec<Reservation>, StoreError>> + Send;
}

impl ReservationLookup for FaceStore {
    fn reservations(&self, contact: &str) -> impl Future<Output = Result<Vec<Reservation>, StoreError>> + Send {
        self.reservations_for_contact(contact)
    }
}

/// Attaches reservation records to faces that carry a contact.
///
/// Enrichment never fails a frame: a slow or broken lookup drops the
/// `reservations` field for that face and nothing else.
#[derive(Clone)]
pub struct Enricher<L = FaceStore> {
    lookup: Option<L>,
    timeout: Duration,
}

impl Enricher {
    pub fn new(store: FaceStore, timeout: Duration) -> Self {
        Self::with_lookup(store, timeout)
    }

    pub fn disabled() -> Self {
        Self {
            lookup: None,
            timeout: Duration::ZERO,
        }
    }
}

impl<L: ReservationLookup> Enricher<L> {
    pub fn with_lookup(lookup: L, timeout: Duration) -> Self {
        Self {
            lookup: Some(lookup),
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lookup.is_some()
    }

    pub async fn enrich(&self, result: FrameResult) -> Vec<EnrichedFace> {
        let mut faces = Vec::with_capacity(result.len());
        for face in result.faces {
            let reservations = match (&self.lookup, face.contact.as_deref()) {
                (Some(lookup), Some(contact)) => self.lookup(lookup, contact).await,
                _ => None,
            };
            faces.push(EnrichedFace { face, reservations });
        }
        faces
    }

    async fn lookup(&self, lookup: &L, contact: &str) -> Option<Vec<Reservation>> {
        match tokio::time::timeout(self.timeout, lookup.reservations(contact)).await {
            Ok(Ok(reservations)) => Some(reservations),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "reservation lookup failed");
                None
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "reservation lookup timed out");
                None
            }
        }
    }
}
