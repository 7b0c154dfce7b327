//! Session state: status machine, region set and the last surfaced error.
//!
//! [`Session`] is owned by exactly one [`SessionController`]; presentation
//! code only ever sees [`SessionSnapshot`]s.
//!
//! [`SessionController`]: super::SessionController

use std::fmt;

use crate::audio::PlaybackError;
use crate::region::{overlay, Overlay, Region};
use crate::service::{ErrorKind, ServiceError, TranslationMode};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Phase of the current image session.
///
/// ```text
/// Idle ──image selected──▶ Uploading ──bytes ok──▶ Detecting ──regions──▶ Ready
///                              │                       │
///                              └──bad image──▶ Error ◀─┘ detection failed
///
/// Ready ──tap (original)──▶ Speaking ──playback ended──▶ Ready
/// Ready ──tap (translate)─▶ Translating ──ok──▶ Speaking
///                               └──failed──▶ Ready (error set)
/// Translating / Speaking ──tap──▶ new flow, old one superseded
/// any ──clear──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Idle,
    Uploading,
    Detecting,
    Ready,
    Translating,
    Speaking,
    Error,
}

impl Status {
    /// `true` in the states where a tap starts a new utterance.
    pub fn accepts_taps(&self) -> bool {
        matches!(self, Status::Ready | Status::Translating | Status::Speaking)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Idle => "Idle",
            Status::Uploading => "Uploading",
            Status::Detecting => "Detecting text",
            Status::Ready => "Ready",
            Status::Translating => "Translating",
            Status::Speaking => "Speaking",
            Status::Error => "Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// A classified failure recorded on the session.
///
/// `message` is the stable text shown to the user; `detail` keeps the raw
/// cause for logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

impl SessionError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&ServiceError> for SessionError {
    fn from(e: &ServiceError) -> Self {
        SessionError::new(e.kind(), e.to_string())
    }
}

impl From<&PlaybackError> for SessionError {
    fn from(e: &PlaybackError) -> Self {
        SessionError::new(ErrorKind::Service, e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The single mutable session for the loaded image.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub status: Status,
    /// Regions in detection order.  Replaced wholesale per image.
    pub regions: Vec<Region>,
    /// Region whose utterance is in flight.
    pub active_region: Option<Region>,
    /// Position of `active_region` in `regions`, when it came from there.
    pub active_index: Option<usize>,
    pub translation_mode: TranslationMode,
    pub last_error: Option<SessionError>,
}

impl Session {
    pub fn new(translation_mode: TranslationMode) -> Self {
        Self {
            translation_mode,
            ..Self::default()
        }
    }

    /// Discard everything tied to the current image.  The translation mode
    /// is a user preference and survives.
    pub fn reset(&mut self) {
        *self = Self::new(self.translation_mode);
    }

    pub fn set_active(&mut self, region: Region, index: Option<usize>) {
        self.active_region = Some(region);
        self.active_index = index;
    }

    pub fn clear_active(&mut self) {
        self.active_region = None;
        self.active_index = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            regions: self.regions.clone(),
            active_region: self.active_region.clone(),
            translation_mode: self.translation_mode,
            last_error: self.last_error.clone(),
            overlays: overlay::layout(&self.regions, self.active_index),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Read-only copy of the session handed to presentation code.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub status: Status,
    pub regions: Vec<Region>,
    pub active_region: Option<Region>,
    pub translation_mode: TranslationMode,
    pub last_error: Option<SessionError>,
    /// One rectangle per region, in percent of the rendered image.
    pub overlays: Vec<Overlay>,
}

impl SessionSnapshot {
    /// Error message to display, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|e| e.message.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
