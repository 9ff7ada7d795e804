use anyhow::Result;

/// Device biometric challenge (fingerprint, face unlock)
///
/// The hardware prompt belongs to the host platform. The session only asks
/// it for a yes/no after checking the stored biometric flag.
pub trait BiometricPrompt {
    /// Returns Ok(true) if the user passed the challenge, Ok(false) if it
    /// failed, was cancelled, or is unavailable.
    fn authenticate(&self) -> Result<bool>;
}

/// Prompt for hosts without biometric hardware; always declines
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailablePrompt;

impl BiometricPrompt for UnavailablePrompt {
    fn authenticate(&self) -> Result<bool> {
        log::debug!("Biometric prompt requested but no hardware is available");
        Ok(false)
    }
}

impl<F> BiometricPrompt for F
where
    F: Fn() -> Result<bool>,
{
    fn authenticate(&self) -> Result<bool> {
        self()
    }
}
