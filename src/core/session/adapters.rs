//! Adapter construction and the per-session adapter set.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::core::emotion::EmotionSource;
use crate::core::ingress::{
    BoxedAdapter, CaptureInput, DemoAdapter, FacialAdapter, FacialConfig, IngressError,
    IngressEvent, VocalAdapter, VocalConfig,
};

/// Builds adapters for a session.
pub trait AdapterFactory: Send + Sync {
    /// The live vendor adapter for `source`.
    fn create(&self, source: EmotionSource) -> BoxedAdapter;

    /// The synthetic stand-in used after an authentication failure.
    fn demo(&self, source: EmotionSource) -> BoxedAdapter;
}

/// Factory producing Hume adapters from server configuration.
#[derive(Debug, Clone)]
pub struct VendorAdapterFactory {
    pub facial: FacialConfig,
    pub vocal: VocalConfig,
    pub demo_interval: Duration,
}

impl AdapterFactory for VendorAdapterFactory {
    fn create(&self, source: EmotionSource) -> BoxedAdapter {
        match source {
            EmotionSource::Facial => Box::new(FacialAdapter::new(self.facial.clone())),
            EmotionSource::Vocal => Box::new(VocalAdapter::new(self.vocal.clone())),
        }
    }

    fn demo(&self, source: EmotionSource) -> BoxedAdapter {
        Box::new(DemoAdapter::with_interval(source, self.demo_interval))
    }
}

/// How a channel came up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Live,
    /// Running on synthetic data; carries the reason.
    Demo(String),
    /// Could not start at all.
    Unavailable(String),
}

/// The adapters owned by one session, all feeding one ingress channel.
pub(crate) struct AdapterSet {
    factory: Arc<dyn AdapterFactory>,
    adapters: Vec<BoxedAdapter>,
    ingress_tx: mpsc::Sender<IngressEvent>,
}

impl AdapterSet {
    pub(crate) fn new(factory: Arc<dyn AdapterFactory>, ingress_tx: mpsc::Sender<IngressEvent>) -> Self {
        Self {
            factory,
            adapters: Vec::new(),
            ingress_tx,
        }
    }

    /// Start the live adapter for `source`, falling back to demo data when
    /// credentials are missing or rejected.
    pub(crate) async fn connect(&mut self, source: EmotionSource) -> ConnectOutcome {
        self.remove(source).await;

        let mut adapter = self.factory.create(source);
        match adapter.connect(self.ingress_tx.clone()).await {
            Ok(()) => {
                info!("{source} adapter started");
                self.adapters.push(adapter);
                ConnectOutcome::Live
            }
            Err(IngressError::AuthenticationFailed(reason)) => {
                self.use_demo(source, reason).await
            }
            Err(e) => {
                error!("{source} adapter failed to start: {e}");
                ConnectOutcome::Unavailable(e.to_string())
            }
        }
    }

    /// Replace the adapter for `source` with synthetic data.
    pub(crate) async fn use_demo(&mut self, source: EmotionSource, reason: String) -> ConnectOutcome {
        warn!("{source} switching to demo data: {reason}");
        self.remove(source).await;

        let mut demo = self.factory.demo(source);
        if let Err(e) = demo.connect(self.ingress_tx.clone()).await {
            error!("{source} demo adapter failed to start: {e}");
            return ConnectOutcome::Unavailable(e.to_string());
        }
        self.adapters.push(demo);
        ConnectOutcome::Demo(reason)
    }

    pub(crate) fn is_demo(&self, source: EmotionSource) -> bool {
        self.adapters
            .iter()
            .any(|a| a.source() == source && a.is_demo())
    }

    pub(crate) fn accept(&mut self, input: &CaptureInput) {
        for adapter in self.adapters.iter_mut() {
            adapter.accept(input);
        }
    }

    pub(crate) async fn dispose_all(&mut self) {
        for mut adapter in self.adapters.drain(..) {
            adapter.dispose().await;
        }
    }

    async fn remove(&mut self, source: EmotionSource) {
        loop {
            // The position must not borrow `adapters` across the dispose await
            let pos = self.adapters.iter().position(|a| a.source() == source);
            let Some(pos) = pos else { break };
            let mut adapter = self.adapters.swap_remove(pos);
            adapter.dispose().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured_factory() -> Arc<dyn AdapterFactory> {
        Arc::new(VendorAdapterFactory {
            facial: FacialConfig::default(),
            vocal: VocalConfig::default(),
            demo_interval: Duration::from_millis(20),
        })
    }

    #[tokio::test]
    async fn test_missing_credentials_fall_back_to_demo() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut set = AdapterSet::new(unconfigured_factory(), tx);

        let outcome = set.connect(EmotionSource::Facial).await;
        assert!(matches!(outcome, ConnectOutcome::Demo(_)));
        assert!(set.is_demo(EmotionSource::Facial));
        assert!(!set.is_demo(EmotionSource::Vocal));

        // Demo data flows
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, IngressEvent::Status { .. } | IngressEvent::Reading { .. }));

        set.dispose_all().await;
        assert!(!set.is_demo(EmotionSource::Facial));
    }

    #[tokio::test]
    async fn test_reconnect_replaces_existing_adapter() {
        let (tx, _rx) = mpsc::channel(16);
        let mut set = AdapterSet::new(unconfigured_factory(), tx);
        set.connect(EmotionSource::Vocal).await;
        set.connect(EmotionSource::Vocal).await;
        assert_eq!(set.adapters.len(), 1);
        set.dispose_all().await;
    }

    #[test]
    fn test_session_run_futures_are_send() {
        use crate::core::session::{
            CallCommand, CallOrchestrator, CheckinOrchestrator, SessionCommand, SessionOptions,
        };
        use crate::core::storage::CheckinRepository;

        fn assert_send<T: Send>(_: T) {}

        let (events, _rx) = mpsc::channel(1);
        let checkin = CheckinOrchestrator::new(
            SessionOptions::default(),
            unconfigured_factory(),
            Arc::new(CheckinRepository::in_memory()),
            events.clone(),
        );
        let (_checkin_tx, commands) = mpsc::channel::<SessionCommand>(1);
        assert_send(checkin.run(commands));

        let call = CallOrchestrator::new(SessionOptions::default(), unconfigured_factory(), events);
        let (_call_tx, commands) = mpsc::channel::<CallCommand>(1);
        assert_send(call.run(commands));
    }
}
