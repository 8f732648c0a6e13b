//! Core domain of bluecast: device selection and multi-device playback
//!
//! Everything here is platform-agnostic. Hardware and OS integrations live in
//! `bluecast-infra` behind the traits of [`domain::audio`].

pub mod domain;
