use strum::{Display, IntoStaticStr};

/// In-memory actuation state of one door asset.
///
/// `Idle -> Opening -> Open -> Closing -> Idle`. Any command failure falls
/// back to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DoorState {
    #[default]
    Idle,
    Opening,
    Open,
    Closing,
}

/// Values of the `openable` input attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Openable {
    Closed,
    Opened,
    Failed,
}

impl Openable {
    pub fn code(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Opened => 1,
            Self::Failed => 2,
        }
    }
}
