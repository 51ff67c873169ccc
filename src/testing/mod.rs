//! Testing utilities for RoomCall
//!
//! Provides media devices that behave like a browser's `getUserMedia`
//! without touching hardware.

pub mod synthetic_media;

pub use synthetic_media::SyntheticMediaDevices;
