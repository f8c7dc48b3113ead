//! Operating modes deciding who answers client requests.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Routing policy applied to every request on a connection.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Mode {
    /// Requests are handled locally; no mirror is contacted.
    #[default]
    LocalOnly,
    /// Requests are relayed to the mirror and its answer is returned.
    MirrorOnly,
    /// Both sides answer; the local response is returned.
    DualPreferLocal,
    /// Both sides answer; the mirror response is returned.
    DualPreferMirror,
}

impl Mode {
    /// Whether requests must be relayed to the mirror.
    #[must_use]
    pub const fn uses_mirror(self) -> bool {
        !matches!(self, Self::LocalOnly)
    }

    /// Whether requests must be handled by the local engine.
    #[must_use]
    pub const fn handles_locally(self) -> bool {
        !matches!(self, Self::MirrorOnly)
    }

    /// Whether both sides answer and their responses are compared.
    #[must_use]
    pub const fn is_dual(self) -> bool {
        matches!(self, Self::DualPreferLocal | Self::DualPreferMirror)
    }
}

/// Errors encountered while parsing a [`Mode`] from text.
pub type ModeParseError = strum::ParseError;
