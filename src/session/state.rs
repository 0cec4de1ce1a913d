/// Render session lifecycle.
///
/// `Idle -> Starting -> Rendering <-> Paused -> Exiting -> Idle`, with `Rendering -> Error` on an
/// engine fault and any state `-> Exiting` on stop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No engine context held.
    #[default]
    Idle,
    /// Context creation and the initial full resync are in progress.
    Starting,
    /// The worker loop issues render iterations.
    Rendering,
    /// The worker loop only services commands.
    Paused,
    /// Stop requested; the worker is winding down.
    Exiting,
    /// An engine fault ended the loop. Only `stop` is valid.
    Error,
}

impl SessionState {
    /// `true` while a worker loop owns the engine context.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Rendering | Self::Paused)
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        match (self, to) {
            (_, Exiting) => !matches!(self, Idle | Exiting),
            (Idle, Starting) => true,
            (Starting, Rendering | Idle | Error) => true,
            (Rendering, Paused | Error) => true,
            (Paused, Rendering | Error) => true,
            (Exiting | Error, Idle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Rendering => "rendering",
            Self::Paused => "paused",
            Self::Exiting => "exiting",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}
