//! In-memory dashboard state
//!
//! Holds the one live vitals snapshot together with the selected patient
//! and the connectivity flag. Nothing is persisted.
//! - Readers get a cheap `Arc` clone of the current snapshot
//! - Writers build a complete new snapshot and swap it in under one lock

mod snapshot;
pub use snapshot::{
    profile, to_channel_unit, ChannelProfile, PanelChannel, Provenance, ScalarChannel,
    VitalsSnapshot, BP_UNIT,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::fhir::PatientRecord;

/// Reachability of the FHIR server as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// No request has completed yet
    Idle,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub snapshot: Arc<VitalsSnapshot>,
    pub patient: Option<Arc<PatientRecord>>,
    pub connectivity: Connectivity,
}

#[derive(Debug)]
pub struct SnapshotStore {
    state: RwLock<DashboardState>,
}

impl SnapshotStore {
    pub fn new(initial: VitalsSnapshot) -> Self {
        SnapshotStore {
            state: RwLock::new(DashboardState {
                snapshot: Arc::new(initial),
                patient: None,
                connectivity: Connectivity::Idle,
            }),
        }
    }

    pub async fn snapshot(&self) -> Arc<VitalsSnapshot> {
        Arc::clone(&self.state.read().await.snapshot)
    }

    pub async fn patient(&self) -> Option<Arc<PatientRecord>> {
        self.state.read().await.patient.clone()
    }

    pub async fn connectivity(&self) -> Connectivity {
        self.state.read().await.connectivity
    }

    /// Consistent copy of everything at once
    pub async fn state(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    pub async fn set_connectivity(&self, connectivity: Connectivity) {
        self.state.write().await.connectivity = connectivity;
    }

    /// Derive a new snapshot from the current one.
    ///
    /// `update` works on a private copy; the result replaces the live
    /// snapshot with a bumped revision in a single step.
    pub async fn update<F>(&self, update: F) -> Arc<VitalsSnapshot>
    where
        F: FnOnce(&mut VitalsSnapshot),
    {
        let mut state = self.state.write().await;
        let mut next = VitalsSnapshot::clone(&state.snapshot);
        update(&mut next);
        next.stamp();
        state.snapshot = Arc::new(next);
        Arc::clone(&state.snapshot)
    }

    /// Like [`update`](Self::update), but only while `guard` holds, checked
    /// under the write lock. Also replaces the patient and marks the server
    /// reachable. Returns `None` when the guard rejected the write.
    pub async fn commit_patient<G, F>(
        &self,
        guard: G,
        patient: PatientRecord,
        update: F,
    ) -> Option<Arc<VitalsSnapshot>>
    where
        G: FnOnce() -> bool,
        F: FnOnce(&mut VitalsSnapshot),
    {
        let mut state = self.state.write().await;
        if !guard() {
            return None;
        }
        let mut next = VitalsSnapshot::clone(&state.snapshot);
        update(&mut next);
        next.stamp();
        state.snapshot = Arc::new(next);
        state.patient = Some(Arc::new(patient));
        state.connectivity = Connectivity::Connected;
        Some(Arc::clone(&state.snapshot))
    }
}
