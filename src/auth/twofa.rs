use crate::models::user;

/// Tri-state 2FA status carried on a user.
///
/// A generated secret stays `Pending` until a correct code confirms it;
/// only an `Enabled` secret authorizes login-time challenges, and only a
/// `Pending` one may be confirmed. Disabling clears the secret entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFaState {
    Disabled,
    Pending(String),
    Enabled(String),
}

impl TwoFaState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, TwoFaState::Enabled(_))
    }
}

impl user::Model {
    /// Derive the 2FA state from the persisted columns.
    ///
    /// `totp_enabled` without a secret cannot be produced by any transition;
    /// treat it as disabled rather than panicking on a corrupt row.
    pub fn twofa_state(&self) -> TwoFaState {
        match (&self.totp_secret, self.totp_enabled) {
            (None, _) => TwoFaState::Disabled,
            (Some(secret), false) => TwoFaState::Pending(secret.clone()),
            (Some(secret), true) => TwoFaState::Enabled(secret.clone()),
        }
    }
}
