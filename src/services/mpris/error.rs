/// Errors that can occur while serving the MPRIS player
#[derive(thiserror::Error, Debug)]
pub enum MprisError {
    /// D-Bus communication error
    #[error("D-Bus operation failed: {0}")]
    DbusError(#[from] zbus::Error),

    /// Metadata could not be encoded as D-Bus values
    #[error("Metadata encoding failed: {0}")]
    Encoding(#[from] zbus::zvariant::Error),

    /// Another process already owns the bus name
    #[error("Bus name {0} is already taken")]
    NameTaken(String),

    /// Failed to initialize the MPRIS server
    #[error("Failed to initialize MPRIS server: {0}")]
    InitializationFailed(String),

    /// Failed to control the player
    #[error("Failed to control player: {0}")]
    ControlFailed(String),

    /// Loop status string outside the MPRIS vocabulary
    #[error("Invalid loop status: {0}")]
    InvalidLoopStatus(String),
}

impl From<MprisError> for zbus::fdo::Error {
    fn from(error: MprisError) -> Self {
        match error {
            MprisError::InvalidLoopStatus(status) => {
                Self::InvalidArgs(format!("invalid loop status: {status}"))
            }
            other => Self::Failed(other.to_string()),
        }
    }
}
