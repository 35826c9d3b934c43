use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use hostbridge_core::{
    CommandProber, FeedbackError, FeedbackSender, UpdateDelivery, UpdateEvent, UpdateListener,
};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::lifecycle::{AppLifecycle, UiSink};
use crate::reply::{PushMessage, Reply, UpdateStatus};
use crate::request::Request;
use crate::state::UpdateState;

pub struct Collaborators {
    pub prober: Arc<dyn CommandProber>,
    pub feedback: Arc<dyn FeedbackSender>,
    pub updates: Arc<dyn UpdateDelivery>,
    pub lifecycle: Arc<dyn AppLifecycle>,
    pub ui: Arc<dyn UiSink>,
}

/// A request as it arrives from the transport, with the slot its reply goes to.
pub struct Invocation {
    pub channel: String,
    pub args: Vec<Value>,
    pub reply: oneshot::Sender<Result<Value, BridgeError>>,
}

/// Result of handling a request on the bridge loop.
pub enum Handled {
    Ready(Reply),
    /// Stateless work that suspends on I/O and completes off the loop.
    Deferred(BoxFuture<'static, Reply>),
}

pub struct HostBridge {
    state: UpdateState,
    collaborators: Collaborators,
    update_events: mpsc::UnboundedReceiver<UpdateEvent>,
    os: &'static str,
    terminated: bool,
}

impl HostBridge {
    /// Build the bridge and subscribe it to update-delivery events.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        let (listener, update_events) = UpdateListener::channel();
        collaborators.updates.subscribe(listener);
        Self {
            state: UpdateState::default(),
            collaborators,
            update_events,
            os: std::env::consts::OS,
            terminated: false,
        }
    }

    /// Report `os` instead of the compile-time target OS from `getPlatform`.
    #[must_use]
    pub fn with_os(mut self, os: &'static str) -> Self {
        self.os = os;
        self
    }

    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.state
    }

    #[must_use]
    pub fn install_in_progress(&self) -> bool {
        self.state.install_in_progress()
    }

    /// `true` once a quit has been issued; the bridge serves nothing after that.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn handle(&mut self, request: Request) -> Handled {
        debug!("Handling {}", request.channel());
        match request {
            Request::GetPlatform => Handled::Ready(self.get_platform()),
            Request::CommandExists { command } => Handled::Deferred(self.command_exists(command)),
            Request::SubmitFeedback { feedback } => {
                Handled::Deferred(self.submit_feedback(feedback))
            }
            Request::CheckForUpdates => Handled::Ready(self.check_for_updates()),
            Request::InstallUpdate => Handled::Ready(self.install_update()),
            Request::RestartApp => Handled::Ready(self.restart_app()),
        }
    }

    /// Handle a request and wait for its reply in place.
    pub async fn call(&mut self, request: Request) -> Reply {
        match self.handle(request) {
            Handled::Ready(reply) => reply,
            Handled::Deferred(pending) => pending.await,
        }
    }

    pub fn handle_update_event(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::Downloaded { version } => {
                info!("Update {version} downloaded and ready to install");
                self.state.mark_downloaded();
                self.collaborators
                    .ui
                    .push(PushMessage::UpdateDownloaded(true));
            }
            UpdateEvent::Error(message) => self.degrade_updates(&message),
        }
    }

    /// Apply every update event delivered so far. Returns how many were applied.
    pub fn pump_update_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.update_events.try_recv() {
            self.handle_update_event(event);
            applied += 1;
        }
        applied
    }

    /// Route one invocation and send its reply. Deferred replies are sent from
    /// a spawned task.
    pub fn dispatch(&mut self, invocation: Invocation) {
        let Invocation {
            channel,
            args,
            reply,
        } = invocation;

        let request = match Request::parse(&channel, &args) {
            Ok(request) => request,
            Err(error) => {
                warn!("Rejected request: {error}");
                let _ = reply.send(Err(error));
                return;
            }
        };

        match self.handle(request) {
            Handled::Ready(value) => {
                let _ = reply.send(Ok(value.into_value()));
            }
            Handled::Deferred(pending) => {
                tokio::spawn(async move {
                    let value = pending.await;
                    let _ = reply.send(Ok(value.into_value()));
                });
            }
        }
    }

    /// Serve invocations and update events until a quit is issued, `shutdown`
    /// fires, or the request channel closes.
    pub async fn run(mut self, mut requests: mpsc::Receiver<Invocation>, shutdown: CancellationToken) {
        info!("Host bridge serving requests");
        while !self.terminated {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                Some(event) = self.update_events.recv() => self.handle_update_event(event),
                invocation = requests.recv() => {
                    let Some(invocation) = invocation else {
                        debug!("Request channel closed");
                        break;
                    };
                    self.dispatch(invocation);
                }
            }
        }
        info!(
            "Host bridge stopped (install in progress: {})",
            self.state.install_in_progress()
        );
    }

    fn get_platform(&self) -> Reply {
        Reply::Text(hostbridge_platform::platform_identifier(self.os).into_owned())
    }

    fn command_exists(&self, command: String) -> BoxFuture<'static, Reply> {
        let prober = Arc::clone(&self.collaborators.prober);
        async move { Reply::Bool(prober.command_exists(&command).await) }.boxed()
    }

    fn submit_feedback(&self, feedback: String) -> BoxFuture<'static, Reply> {
        let sender = Arc::clone(&self.collaborators.feedback);
        async move { Reply::Bool(deliver_feedback(sender.as_ref(), &feedback).await) }.boxed()
    }

    fn check_for_updates(&self) -> Reply {
        Reply::UpdateStatus(UpdateStatus {
            update_available: self.state.update_available(),
        })
    }

    fn install_update(&mut self) -> Reply {
        if !self.state.begin_install() {
            debug!("Install requested with no downloaded update");
            return Reply::Bool(false);
        }

        info!("Installing downloaded update");
        if let Err(error) = self.collaborators.updates.install_and_relaunch() {
            self.degrade_updates(&error.to_string());
        }
        self.quit();
        Reply::Bool(true)
    }

    fn restart_app(&mut self) -> Reply {
        self.quit();
        Reply::Bool(true)
    }

    fn quit(&mut self) {
        self.terminated = true;
        self.collaborators.lifecycle.quit();
    }

    fn degrade_updates(&mut self, message: &str) {
        warn!("Auto update unavailable: {message}");
        self.state.reset();
    }
}

async fn deliver_feedback(sender: &dyn FeedbackSender, feedback: &str) -> bool {
    match sender.send(feedback).await {
        Ok(status) if status.is_success() => true,
        Ok(status) => {
            warn!("Feedback rejected with HTTP {status}");
            false
        }
        Err(error) => {
            log::log!(feedback_failure_level(&error), "Failed to submit feedback: {error}");
            false
        }
    }
}

fn feedback_failure_level(error: &FeedbackError) -> log::Level {
    match error {
        FeedbackError::NotConfigured => log::Level::Warn,
        FeedbackError::Request(_) => log::Level::Error,
    }
}

#[cfg(test)]
mod tests {
    use hostbridge_core::UpdateEvent;
    use serde_json::json;
    use tokio::sync::{mpsc, oneshot};
    use tokio_util::sync::CancellationToken;

    use super::{HostBridge, Invocation, feedback_failure_level};
    use crate::error::BridgeError;
    use crate::reply::{PushMessage, Reply, UpdateStatus};
    use crate::request::Request;
    use crate::test_support::{FeedbackOutcome, Harness};

    fn status(update_available: bool) -> Reply {
        Reply::UpdateStatus(UpdateStatus { update_available })
    }

    #[tokio::test]
    async fn get_platform_maps_target_os() {
        let harness = Harness::new();
        let mut bridge = harness.bridge().with_os("macos");

        assert_eq!(
            bridge.call(Request::GetPlatform).await,
            Reply::Text("darwin".to_string())
        );
    }

    #[tokio::test]
    async fn get_platform_reports_unknown_without_os() {
        let harness = Harness::new();
        let mut bridge = harness.bridge().with_os("");

        assert_eq!(
            bridge.call(Request::GetPlatform).await,
            Reply::Text("unknown".to_string())
        );
    }

    #[tokio::test]
    async fn command_exists_delegates_to_prober() {
        let harness = Harness::new().with_known_commands(&["git"]);
        let mut bridge = harness.bridge();

        let found = bridge
            .call(Request::CommandExists {
                command: "git".to_string(),
            })
            .await;
        let missing = bridge
            .call(Request::CommandExists {
                command: "hg".to_string(),
            })
            .await;

        assert_eq!(found, Reply::Bool(true));
        assert_eq!(missing, Reply::Bool(false));
        assert_eq!(harness.prober.probed(), vec!["git", "hg"]);
    }

    #[tokio::test]
    async fn submit_feedback_is_true_only_for_success_status() {
        for (outcome, expected) in [
            (FeedbackOutcome::Status(200), true),
            (FeedbackOutcome::Status(204), true),
            (FeedbackOutcome::Status(500), false),
            (FeedbackOutcome::Status(404), false),
            (FeedbackOutcome::NotConfigured, false),
        ] {
            let harness = Harness::new().with_feedback(outcome);
            let mut bridge = harness.bridge();

            let reply = bridge
                .call(Request::SubmitFeedback {
                    feedback: "x".to_string(),
                })
                .await;

            assert_eq!(reply, Reply::Bool(expected), "outcome {outcome:?}");
            assert_eq!(harness.feedback.sent(), vec!["x"]);
        }
    }

    #[test]
    fn missing_feedback_endpoint_is_only_a_warning() {
        assert_eq!(
            feedback_failure_level(&hostbridge_core::FeedbackError::NotConfigured),
            log::Level::Warn
        );
    }

    #[tokio::test]
    async fn check_for_updates_follows_update_events() {
        let harness = Harness::new();
        let mut bridge = harness.bridge();

        assert_eq!(bridge.call(Request::CheckForUpdates).await, status(false));

        harness.delivery.emit(UpdateEvent::Downloaded {
            version: "2.0.0".to_string(),
        });
        assert_eq!(bridge.pump_update_events(), 1);
        assert_eq!(bridge.call(Request::CheckForUpdates).await, status(true));
        assert_eq!(harness.ui.pushed(), vec![PushMessage::UpdateDownloaded(true)]);

        harness
            .delivery
            .emit(UpdateEvent::Error("code signature invalid".to_string()));
        bridge.pump_update_events();
        assert_eq!(bridge.call(Request::CheckForUpdates).await, status(false));
    }

    #[tokio::test]
    async fn install_without_update_has_no_side_effects() {
        let harness = Harness::new();
        let mut bridge = harness.bridge();

        assert_eq!(bridge.call(Request::InstallUpdate).await, Reply::Bool(false));

        assert!(!bridge.install_in_progress());
        assert!(!bridge.is_terminated());
        assert_eq!(harness.delivery.installs(), 0);
        assert_eq!(harness.lifecycle.quits(), 0);
    }

    #[tokio::test]
    async fn install_with_update_installs_and_quits() {
        let harness = Harness::new();
        let mut bridge = harness.bridge();
        bridge.handle_update_event(UpdateEvent::Downloaded {
            version: "2.0.0".to_string(),
        });

        assert_eq!(bridge.call(Request::InstallUpdate).await, Reply::Bool(true));

        assert!(bridge.install_in_progress());
        assert!(bridge.is_terminated());
        assert_eq!(harness.delivery.installs(), 1);
        assert_eq!(harness.lifecycle.quits(), 1);
    }

    #[tokio::test]
    async fn failed_install_still_quits_but_resets_state() {
        let harness = Harness::new().with_failing_install();
        let mut bridge = harness.bridge();
        bridge.handle_update_event(UpdateEvent::Downloaded {
            version: "2.0.0".to_string(),
        });

        assert_eq!(bridge.call(Request::InstallUpdate).await, Reply::Bool(true));

        assert!(!bridge.install_in_progress());
        assert!(!bridge.state().update_available());
        assert_eq!(harness.lifecycle.quits(), 1);
    }

    #[tokio::test]
    async fn error_event_resets_install_in_progress() {
        let harness = Harness::new();
        let mut bridge = harness.bridge();
        bridge.handle_update_event(UpdateEvent::Downloaded {
            version: "2.0.0".to_string(),
        });
        let _ = bridge.call(Request::InstallUpdate).await;
        assert!(bridge.install_in_progress());

        bridge.handle_update_event(UpdateEvent::Error("late failure".to_string()));

        assert!(!bridge.install_in_progress());
    }

    #[tokio::test]
    async fn restart_app_only_quits() {
        let harness = Harness::new();
        let mut bridge = harness.bridge();

        assert_eq!(bridge.call(Request::RestartApp).await, Reply::Bool(true));

        assert!(bridge.is_terminated());
        assert_eq!(harness.lifecycle.quits(), 1);
        assert_eq!(harness.delivery.installs(), 0);
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_channel() {
        let harness = Harness::new();
        let mut bridge = harness.bridge();
        let (reply, rx) = oneshot::channel();

        bridge.dispatch(Invocation {
            channel: "system:nope".to_string(),
            args: vec![],
            reply,
        });

        assert_eq!(
            rx.await.expect("reply should be sent"),
            Err(BridgeError::UnknownChannel("system:nope".to_string()))
        );
    }

    #[tokio::test]
    async fn run_loop_applies_events_and_stops_after_restart() {
        let harness = Harness::new().with_known_commands(&["node"]);
        let bridge: HostBridge = harness.bridge();
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(bridge.run(rx, CancellationToken::new()));

        harness.delivery.emit(UpdateEvent::Downloaded {
            version: "2.0.0".to_string(),
        });

        let exists = invoke(&tx, "system:commandExists", vec![json!("node")]).await;
        assert_eq!(exists, Ok(json!(true)));

        let status = invoke(&tx, "system:checkForUpdates", vec![]).await;
        assert_eq!(status, Ok(json!({ "updateAvailable": true })));

        let restarted = invoke(&tx, "system:restartApp", vec![]).await;
        assert_eq!(restarted, Ok(json!(true)));

        task.await.expect("bridge loop should finish after restart");
        assert_eq!(harness.lifecycle.quits(), 1);
    }

    async fn invoke(
        tx: &mpsc::Sender<Invocation>,
        channel: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, BridgeError> {
        let (reply, rx) = oneshot::channel();
        tx.send(Invocation {
            channel: channel.to_string(),
            args,
            reply,
        })
        .await
        .expect("bridge should accept invocation");
        rx.await.expect("bridge should reply")
    }
}
