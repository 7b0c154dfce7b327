//! Interaction state machine for one loaded image.
//!
//! # Architecture
//!
//! ```text
//! UserInput (mpsc) ─────────────┐
//!                               ▼
//!                 SessionController::run()  ← single tokio task
//!                   │        ▲       │
//!   spawn detect /  │        │       └─▶ PlaybackController ─▶ AudioOutput
//!   translate /     ▼        │                    │
//!   synthesize   Completion (mpsc) ◀── end of stream (PlaybackHandle)
//!
//! SessionSnapshot (watch) ──▶ presentation layer
//! ```

pub mod event;
pub mod runner;
pub mod state;

pub use event::{Completion, TapTarget, UserInput};
pub use runner::{Collaborators, SessionController};
pub use state::{Session, SessionError, SessionSnapshot, Status};
