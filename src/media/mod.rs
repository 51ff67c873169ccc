//! Local media: capture constraints, streams and the device seam
//!
//! A `MediaStream` here is a handle describing captured tracks; the bytes
//! themselves are carried by the peer layer.

pub mod constraints;
pub mod devices;
pub mod stream;

pub use constraints::{MediaConstraints, VideoSize};
pub use devices::{MediaDevices, NativeMediaDevices};
pub use stream::{DeviceLease, MediaStream, MediaTrack, StreamInfo, TrackKind};
