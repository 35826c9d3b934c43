/// Update availability as seen by the bridge.
///
/// `idle -> available` on download, `available -> installing` on install, and
/// any state back to idle on a delivery error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateState {
    update_available: bool,
    install_in_progress: bool,
}

impl UpdateState {
    #[must_use]
    pub fn update_available(&self) -> bool {
        self.update_available
    }

    #[must_use]
    pub fn install_in_progress(&self) -> bool {
        self.install_in_progress
    }

    pub fn mark_downloaded(&mut self) {
        self.update_available = true;
    }

    /// Enter the installing state. Returns `false` and leaves the state alone
    /// when no update is available.
    pub fn begin_install(&mut self) -> bool {
        if !self.update_available {
            return false;
        }
        self.install_in_progress = true;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
