//! Scriptable transport for deterministic engine tests, no remote calls.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use convoy_core::errors::SessionError;
use convoy_core::ids::WorkerId;
use convoy_core::transport::{ActionRequest, TransportEvent, TransportFactory, WorkerTransport};

/// How `perform` behaves across calls.
#[derive(Clone, Debug)]
pub enum PerformBehavior {
    /// Every call succeeds.
    AlwaysOk,
    /// Every call fails with the given message.
    AlwaysFail(String),
    /// The first `n` calls succeed, the rest fail.
    FailAfter(usize, String),
}

/// A transport that plays a scripted event sequence on `connect` and answers
/// `perform` according to a configured behavior. Counters expose what the
/// engine actually did.
pub struct MockTransport {
    events: Mutex<Vec<TransportEvent>>,
    connect_error: Mutex<Option<SessionError>>,
    behavior: Mutex<PerformBehavior>,
    connect_calls: AtomicUsize,
    perform_calls: AtomicUsize,
    released: AtomicBool,
    /// Keeps the event channel open after the script ends, so the session
    /// does not observe a synthetic disconnect.
    hold_open: AtomicBool,
}

impl MockTransport {
    pub fn new(events: Vec<TransportEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            connect_error: Mutex::new(None),
            behavior: Mutex::new(PerformBehavior::AlwaysOk),
            connect_calls: AtomicUsize::new(0),
            perform_calls: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            hold_open: AtomicBool::new(true),
        }
    }

    /// A transport whose script runs straight to `Ready`.
    pub fn ready() -> Self {
        Self::new(vec![
            TransportEvent::PairingCode("123456".into()),
            TransportEvent::Authenticated,
            TransportEvent::Ready,
        ])
    }

    /// A transport whose `connect` fails outright.
    pub fn connect_failure(error: SessionError) -> Self {
        let mock = Self::new(Vec::new());
        *mock.connect_error.lock() = Some(error);
        mock
    }

    pub fn with_behavior(self, behavior: PerformBehavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    /// Let the event channel close once the script is exhausted, which the
    /// session treats as a disconnect.
    pub fn with_channel_close(self) -> Self {
        self.hold_open.store(false, Ordering::Relaxed);
        self
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::Relaxed)
    }

    pub fn perform_calls(&self) -> usize {
        self.perform_calls.load(Ordering::Relaxed)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WorkerTransport for MockTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, SessionError> {
        self.connect_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(err) = self.connect_error.lock().clone() {
            return Err(err);
        }

        let events: Vec<TransportEvent> = self.events.lock().clone();
        let hold_open = self.hold_open.load(Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if hold_open {
                tx.closed().await;
            }
        });

        Ok(rx)
    }

    async fn perform(&self, _action: &ActionRequest) -> Result<(), SessionError> {
        let call = self.perform_calls.fetch_add(1, Ordering::Relaxed);
        match &*self.behavior.lock() {
            PerformBehavior::AlwaysOk => Ok(()),
            PerformBehavior::AlwaysFail(reason) => Err(SessionError::ActionFailed(reason.clone())),
            PerformBehavior::FailAfter(n, reason) => {
                if call < *n {
                    Ok(())
                } else {
                    Err(SessionError::ActionFailed(reason.clone()))
                }
            }
        }
    }

    async fn release(&self) {
        self.released.store(true, Ordering::Relaxed);
    }
}

/// Factory that scripts every created transport identically and keeps the
/// instances around for assertions.
pub struct MockFactory {
    template: Box<dyn Fn(&WorkerId) -> MockTransport + Send + Sync>,
    created: Mutex<Vec<(WorkerId, Arc<MockTransport>)>>,
}

impl MockFactory {
    /// Every created transport authenticates straight to `Ready`.
    pub fn all_ready() -> Self {
        Self::with_template(|_| MockTransport::ready())
    }

    pub fn with_template(
        template: impl Fn(&WorkerId) -> MockTransport + Send + Sync + 'static,
    ) -> Self {
        Self {
            template: Box::new(template),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Transports created for a given identity, oldest first.
    pub fn created_for(&self, worker_id: &WorkerId) -> Vec<Arc<MockTransport>> {
        self.created
            .lock()
            .iter()
            .filter(|(id, _)| id == worker_id)
            .map(|(_, t)| Arc::clone(t))
            .collect()
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, worker_id: &WorkerId) -> Arc<dyn WorkerTransport> {
        let transport = Arc::new((self.template)(worker_id));
        self.created
            .lock()
            .push((worker_id.clone(), Arc::clone(&transport)));
        transport
    }
}
