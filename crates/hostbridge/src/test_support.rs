use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hostbridge_core::{
    CommandProber, FeedbackError, FeedbackSender, UpdateDelivery, UpdateDeliveryError,
    UpdateEvent, UpdateListener,
};

use crate::bridge::{Collaborators, HostBridge};
use crate::lifecycle::{AppLifecycle, UiSink};
use crate::reply::PushMessage;

#[derive(Default)]
pub(crate) struct FakeProber {
    known: Vec<String>,
    probed: Mutex<Vec<String>>,
}

impl FakeProber {
    pub(crate) fn probed(&self) -> Vec<String> {
        self.probed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CommandProber for FakeProber {
    async fn command_exists(&self, command: &str) -> bool {
        self.probed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());
        self.known.iter().any(|known| known == command)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum FeedbackOutcome {
    Status(u16),
    NotConfigured,
}

pub(crate) struct FakeFeedback {
    outcome: FeedbackOutcome,
    delay: Duration,
    sent: Mutex<Vec<String>>,
}

impl FakeFeedback {
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FeedbackSender for FakeFeedback {
    async fn send(&self, feedback: &str) -> Result<reqwest::StatusCode, FeedbackError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(feedback.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.outcome {
            FeedbackOutcome::Status(code) => Ok(reqwest::StatusCode::from_u16(code)
                .expect("test status code should be valid")),
            FeedbackOutcome::NotConfigured => Err(FeedbackError::NotConfigured),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeDelivery {
    listeners: Mutex<Vec<UpdateListener>>,
    installs: AtomicUsize,
    fail_install: bool,
}

impl FakeDelivery {
    pub(crate) fn emit(&self, event: UpdateEvent) {
        for listener in self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            listener.notify(event.clone());
        }
    }

    pub(crate) fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

impl UpdateDelivery for FakeDelivery {
    fn subscribe(&self, listener: UpdateListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn install_and_relaunch(&self) -> Result<(), UpdateDeliveryError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        if self.fail_install {
            Err(UpdateDeliveryError::NothingStaged)
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeLifecycle {
    quits: AtomicUsize,
}

impl FakeLifecycle {
    pub(crate) fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }
}

impl AppLifecycle for FakeLifecycle {
    fn quit(&self) {
        self.quits.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pushed: Mutex<Vec<PushMessage>>,
}

impl RecordingSink {
    pub(crate) fn pushed(&self) -> Vec<PushMessage> {
        self.pushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UiSink for RecordingSink {
    fn push(&self, message: PushMessage) {
        self.pushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

pub(crate) struct Harness {
    pub(crate) prober: Arc<FakeProber>,
    pub(crate) feedback: Arc<FakeFeedback>,
    pub(crate) delivery: Arc<FakeDelivery>,
    pub(crate) lifecycle: Arc<FakeLifecycle>,
    pub(crate) ui: Arc<RecordingSink>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            prober: Arc::default(),
            feedback: Arc::new(FakeFeedback {
                outcome: FeedbackOutcome::Status(200),
                delay: Duration::ZERO,
                sent: Mutex::default(),
            }),
            delivery: Arc::default(),
            lifecycle: Arc::default(),
            ui: Arc::default(),
        }
    }

    pub(crate) fn with_known_commands(mut self, commands: &[&str]) -> Self {
        self.prober = Arc::new(FakeProber {
            known: commands.iter().map(ToString::to_string).collect(),
            probed: Mutex::default(),
        });
        self
    }

    pub(crate) fn with_feedback(mut self, outcome: FeedbackOutcome) -> Self {
        self.feedback = Arc::new(FakeFeedback {
            outcome,
            delay: Duration::ZERO,
            sent: Mutex::default(),
        });
        self
    }

    pub(crate) fn with_slow_feedback(mut self, delay: Duration) -> Self {
        self.feedback = Arc::new(FakeFeedback {
            outcome: FeedbackOutcome::Status(200),
            delay,
            sent: Mutex::default(),
        });
        self
    }

    pub(crate) fn with_failing_install(mut self) -> Self {
        self.delivery = Arc::new(FakeDelivery {
            fail_install: true,
            ..FakeDelivery::default()
        });
        self
    }

    pub(crate) fn bridge(&self) -> HostBridge {
        HostBridge::new(Collaborators {
            prober: self.prober.clone(),
            feedback: self.feedback.clone(),
            updates: self.delivery.clone(),
            lifecycle: self.lifecycle.clone(),
            ui: self.ui.clone(),
        })
    }
}
