//! Platform-specific audio backend implementations using CPAL
//!
//! CPAL abstracts the platform audio APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio

pub mod cpal_backend;
pub mod stream;

pub use cpal_backend::*;
pub use stream::*;
