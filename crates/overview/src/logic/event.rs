use tokio::sync::broadcast;

use super::aggregate::FetchKind;
use super::mutation::MutationKind;
use super::secret::SecretRecord;

/// Overview change events
#[derive(Clone, Debug)]
pub enum OverviewChangeEvt {
    /// A new view was started for `secret_path`, every environment pending
    Rebuilt { epoch: u64, secret_path: String },
    EnvironmentResolved {
        epoch: u64,
        environment: String,
        kind: FetchKind,
        failed: bool,
    },
    SecretCreated(SecretRecord),
    SecretUpdated(SecretRecord),
    SecretDeleted {
        environment: String,
        path: String,
        key: String,
    },
    MutationFailed {
        environment: String,
        key: String,
        kind: MutationKind,
        reason: String,
    },
}

/// Type aliases for the overview event broadcast channel
pub type OverviewChangeTx = broadcast::Sender<OverviewChangeEvt>;
pub type OverviewChangeRx = broadcast::Receiver<OverviewChangeEvt>;

/// Creates a new OverviewChange broadcast channel
pub fn create_overview_change_channel(capacity: usize) -> (OverviewChangeTx, OverviewChangeRx) {
    broadcast::channel(capacity)
}
