use jobboard::board::memory::InMemoryBoardRepository;
use jobboard::board::notifications::LogMailer;
use jobboard::board::payments::InMemoryPaymentGateway;
use jobboard::board::service::{BoardDependencies, JobBoardService, ServiceSettings};
use jobboard::board::workflow::InMemoryWorkflowStore;
use jobboard::config::AppConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local collaborators. Emails are logged rather than delivered and
/// checkout sessions live in memory until a payment provider is wired in.
pub(crate) fn in_memory_dependencies(config: &AppConfig) -> BoardDependencies {
    BoardDependencies {
        repository: Arc::new(InMemoryBoardRepository::default()),
        payments: Arc::new(InMemoryPaymentGateway::default()),
        mailer: Arc::new(LogMailer::new(config.email.from_address.clone())),
        workflow_store: Arc::new(InMemoryWorkflowStore::default()),
    }
}

pub(crate) fn build_service(config: &AppConfig) -> Arc<JobBoardService> {
    Arc::new(JobBoardService::new(
        in_memory_dependencies(config),
        ServiceSettings::from_config(config),
    ))
}
