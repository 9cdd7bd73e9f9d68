//! Action enum — all user-initiated intents and internal events.

use nowplaying_proto::protocol::SeekDirection;

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    StationList,
    NowPlaying,
    InfoOverlay,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Screen lifecycle ─────────────────────────────────────────────────────
    EnterStation(usize), // enter the now-playing screen for a station index
    LeaveScreen,

    // ── Transport ────────────────────────────────────────────────────────────
    Play,
    Pause,
    SeekPress(SeekDirection),
    SeekRelease,
    VolumeStep(f32),

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleInfo,
    FocusPane(ComponentId),

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
}
