//! Vitals aggregator
//!
//! Owns the dashboard state and applies the two kinds of update to it:
//! - Patient loads, which merge server observations into the snapshot
//! - Drift ticks, which advance the simulation between loads
//!
//! Fetch and parse failures never touch the vitals; they only flip the
//! connectivity flag to disconnected.

pub mod drift;

pub use drift::{DriftHandle, DriftTask};

use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::fhir::loinc::{DIASTOLIC_PRESSURE, SYSTOLIC_PRESSURE};
use crate::fhir::{
    resolve_channel, Channel, FhirError, FhirSource, ObservationRecord, ObservationValue,
    PatientRecord,
};
use crate::storage::{
    to_channel_unit, Connectivity, DashboardState, SnapshotStore, VitalsSnapshot,
};

/// Result of a patient load that reached the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Snapshot replaced; lists the channels that took a server value
    Applied { revision: u64, channels: Vec<Channel> },
    /// A newer load started before this one finished; response dropped
    Stale,
}

pub struct Aggregator {
    source: Arc<dyn FhirSource>,
    store: SnapshotStore,
    sequence: AtomicU64,
}

impl Aggregator {
    pub fn new(source: Arc<dyn FhirSource>) -> Self {
        Self::with_snapshot(source, VitalsSnapshot::initial())
    }

    pub fn with_snapshot(source: Arc<dyn FhirSource>, initial: VitalsSnapshot) -> Self {
        Aggregator {
            source,
            store: SnapshotStore::new(initial),
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> Arc<VitalsSnapshot> {
        self.store.snapshot().await
    }

    pub async fn patient(&self) -> Option<Arc<PatientRecord>> {
        self.store.patient().await
    }

    pub async fn connectivity(&self) -> Connectivity {
        self.store.connectivity().await
    }

    pub async fn state(&self) -> DashboardState {
        self.store.state().await
    }

    /// Search patients by name. Touches connectivity only.
    pub async fn search_patients(&self, name: &str) -> Result<Vec<PatientRecord>, FhirError> {
        match self.source.search_patients(name).await {
            Ok(patients) => {
                self.store.set_connectivity(Connectivity::Connected).await;
                debug!("Search {:?} matched {} patients", name, patients.len());
                Ok(patients)
            }
            Err(e) => {
                warn!("Patient search failed: {}", e);
                self.store.set_connectivity(Connectivity::Disconnected).await;
                Err(e)
            }
        }
    }

    /// Fetch a patient and their vital signs and merge them in.
    ///
    /// Each call takes a fresh sequence number; if another load was started
    /// in the meantime, this response is discarded as stale.
    pub async fn load_patient(&self, patient_id: &str) -> Result<LoadOutcome, FhirError> {
        let ticket = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Loading patient {} (request {})", patient_id, ticket);

        let fetched = async {
            let patient = self.source.fetch_patient(patient_id).await?;
            let observations = self.source.fetch_vital_signs(patient_id).await?;
            Ok::<_, FhirError>((patient, observations))
        }
        .await;

        let is_current = || self.sequence.load(Ordering::SeqCst) == ticket;

        let (patient, observations) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                if is_current() {
                    warn!("Loading patient {} failed: {}", patient_id, e);
                    self.store.set_connectivity(Connectivity::Disconnected).await;
                } else {
                    debug!("Superseded load of {} failed: {}", patient_id, e);
                }
                return Err(e);
            }
        };

        let mut channels = Vec::new();
        let committed = self
            .store
            .commit_patient(is_current, patient, |snapshot| {
                channels = merge_observations(snapshot, &mut rand::thread_rng(), &observations);
            })
            .await;

        match committed {
            Some(snapshot) => {
                info!(
                    "Patient {} loaded: {} observations, channels {:?}",
                    patient_id,
                    observations.len(),
                    channels
                );
                Ok(LoadOutcome::Applied {
                    revision: snapshot.revision,
                    channels,
                })
            }
            None => {
                warn!("Discarding stale response for patient {} (request {})", patient_id, ticket);
                Ok(LoadOutcome::Stale)
            }
        }
    }

    /// Advance the simulation by one tick
    pub async fn drift(&self) -> Arc<VitalsSnapshot> {
        let snapshot = self
            .store
            .update(|snapshot| snapshot.drift(&mut rand::thread_rng()))
            .await;
        debug!("Drift tick, revision {}", snapshot.revision);
        snapshot
    }
}

/// Merge observations into `snapshot`, newest first.
///
/// The first usable observation per channel wins; later ones for the same
/// channel are older readings and are skipped. Unknown codes and shapes
/// that do not fit their channel are ignored. Returns the updated channels.
pub fn merge_observations<R: Rng + ?Sized>(
    snapshot: &mut VitalsSnapshot,
    rng: &mut R,
    observations: &[ObservationRecord],
) -> Vec<Channel> {
    let mut scalars_done: HashSet<Channel> = HashSet::new();
    let mut systolic_done = false;
    let mut diastolic_done = false;
    let mut updated = Vec::new();

    for observation in observations {
        let Some(channel) = resolve_channel(&observation.code) else {
            debug!("Ignoring observation with code {:?}", observation.code);
            continue;
        };

        let applied = match (&observation.value, channel) {
            (ObservationValue::Scalar { value, unit }, channel) => {
                match to_channel_unit(channel, *value, unit.as_deref()) {
                    None => {
                        warn!("Ignoring {} reading {} with unit {:?}", channel, value, unit);
                        false
                    }
                    Some(value) if channel == Channel::Bp => {
                        let (systolic, diastolic) = match observation.code.as_str() {
                            SYSTOLIC_PRESSURE => (Some(value), None),
                            DIASTOLIC_PRESSURE => (None, Some(value)),
                            _ => (None, None),
                        };
                        apply_pressure(
                            snapshot,
                            systolic,
                            diastolic,
                            &mut systolic_done,
                            &mut diastolic_done,
                        )
                    }
                    Some(_) if scalars_done.contains(&channel) => false,
                    Some(value) => {
                        let applied = snapshot.set_scalar(rng, channel, value);
                        if applied {
                            scalars_done.insert(channel);
                        }
                        applied
                    }
                }
            }
            (ObservationValue::Panel { systolic, diastolic }, Channel::Bp) => apply_pressure(
                snapshot,
                *systolic,
                *diastolic,
                &mut systolic_done,
                &mut diastolic_done,
            ),
            (ObservationValue::Panel { .. }, channel) => {
                debug!("Ignoring component observation for {}", channel);
                false
            }
            (ObservationValue::Unrecognized, channel) => {
                debug!("Ignoring {} observation without a value", channel);
                false
            }
        };

        if applied && !updated.contains(&channel) {
            updated.push(channel);
        }
    }

    updated
}

fn apply_pressure(
    snapshot: &mut VitalsSnapshot,
    systolic: Option<f64>,
    diastolic: Option<f64>,
    systolic_done: &mut bool,
    diastolic_done: &mut bool,
) -> bool {
    let systolic = systolic.filter(|_| !*systolic_done);
    let diastolic = diastolic.filter(|_| !*diastolic_done);
    if !snapshot.set_blood_pressure(systolic, diastolic) {
        return false;
    }
    *systolic_done |= systolic.is_some();
    *diastolic_done |= diastolic.is_some();
    true
}
