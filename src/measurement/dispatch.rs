//! Routes probe progress/result messages into the store.
//!
//! All messages go through one task, so streaming chunks from a probe are
//! applied in the order they arrived.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{MeasurementProgressMessage, MeasurementResultMessage, MeasurementStore};
use crate::db::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeMessage {
    Progress(MeasurementProgressMessage),
    Result(MeasurementResultMessage),
}

impl ProbeMessage {
    fn ids(&self) -> (&str, &str) {
        match self {
            ProbeMessage::Progress(m) => (m.measurement_id.as_str(), m.test_id.as_str()),
            ProbeMessage::Result(m) => (m.measurement_id.as_str(), m.test_id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Stored,
    /// The result completed the measurement.
    Finished(String),
    /// Sender is not the probe assigned to this test, or the test is over.
    Rejected,
}

/// Handle to the dispatcher task.
#[derive(Clone)]
pub struct ResultDispatcher {
    tx: mpsc::Sender<(String, ProbeMessage)>,
}

impl ResultDispatcher {
    pub fn spawn(store: Arc<MeasurementStore>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_dispatcher(rx, store));
        Self { tx }
    }

    /// Queue a message from `probe_uuid`. `false` if the dispatcher is gone.
    pub async fn dispatch(&self, probe_uuid: String, message: ProbeMessage) -> bool {
        self.tx.send((probe_uuid, message)).await.is_ok()
    }
}

async fn run_dispatcher(mut rx: mpsc::Receiver<(String, ProbeMessage)>, store: Arc<MeasurementStore>) {
    while let Some((probe_uuid, message)) = rx.recv().await {
        if let Err(e) = handle_message(&store, &probe_uuid, message).await {
            tracing::warn!("Dispatcher: message from probe {} failed: {}", probe_uuid, e);
        }
    }
    tracing::info!("Dispatcher: channel closed, exiting");
}

/// Check the sender against the test correlation map, then store.
pub async fn handle_message(
    store: &MeasurementStore,
    probe_uuid: &str,
    message: ProbeMessage,
) -> Result<DispatchOutcome, StoreError> {
    let (measurement_id, test_id) = message.ids();
    let assigned = store.get_test_probe(measurement_id, test_id).await?;
    if assigned.as_deref() != Some(probe_uuid) {
        tracing::warn!(
            "Dispatcher: dropping message for {}/{} from unexpected probe {}",
            measurement_id,
            test_id,
            probe_uuid
        );
        return Ok(DispatchOutcome::Rejected);
    }

    match message {
        ProbeMessage::Progress(progress) => {
            store.store_measurement_progress(&progress).await?;
            Ok(DispatchOutcome::Stored)
        }
        ProbeMessage::Result(result) => match store.store_measurement_result(&result).await? {
            Some(record) => {
                tracing::debug!("Dispatcher: measurement {} finished", record.id);
                Ok(DispatchOutcome::Finished(record.id))
            }
            None => Ok(DispatchOutcome::Stored),
        },
    }
}
