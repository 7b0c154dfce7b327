//! Point Reader: tap text in a photo and hear it read aloud.
//!
//! | Module      | Role                                                    |
//! |-------------|---------------------------------------------------------|
//! | [`region`]  | normalised geometry, tap → region hit testing           |
//! | [`service`] | detection / translation / speech collaborators (Gemini) |
//! | [`audio`]   | PCM decoding and single-stream playback                 |
//! | [`session`] | the interaction state machine                           |
//! | [`config`]  | `settings.toml` loading and saving                      |

pub mod audio;
pub mod config;
pub mod region;
pub mod service;
pub mod session;
