//! micpulse - microphone recording with a live amplitude meter
//!
//! Records an audio input to a file (AAC/M4A, MP3, Opus, FLAC or WAV) while
//! a separate, independently controlled loop reports the input level about
//! twenty times per second.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects (destination, duration, amplitude), the session lifecycle and errors
//! - **Application**: Recording session, amplitude monitor, the command surface and port traits
//! - **Infrastructure**: Adapter implementations (cpal capture, tone generator, encoders, config file)
//! - **CLI**: Argument parsing, terminal output, signals, and the socket daemon (Unix only)

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod logging;
