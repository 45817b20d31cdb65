//! Sensors module.
//!
//! A camera is anything that hands out still frames as data URIs. The V4L implementation is only
//! available with the `v4l` feature.
use std::{fmt, str::FromStr};

use crate::error::CaptureError;

/// Which way the camera faces.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Facing {
    #[default]
    User,
    Environment,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::User => f.write_str("user"),
            Facing::Environment => f.write_str("environment"),
        }
    }
}

impl FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Facing::User),
            "environment" => Ok(Facing::Environment),
            other => Err(format!("unknown facing mode {other:?}")),
        }
    }
}

/// Requested properties of the video feed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptureConstraints {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub facing: Facing,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_owned(),
            width: 1280,
            height: 720,
            facing: Facing::User,
        }
    }
}

/// An opened camera. Dropping it releases the device.
pub trait CameraDevice {
    /// Capture a still frame encoded as data URI.
    fn snapshot(&mut self) -> Result<String, CaptureError>;
}

#[cfg(feature = "v4l")]
pub use self::v4l::V4lCamera;

#[cfg(feature = "v4l")]
mod v4l {
    use rscam::{Camera, Config};

    use super::{CameraDevice, CaptureConstraints};
    use crate::{error::CaptureError, source::encode_data_uri};

    /// Snapshots are taken as MJPG frames which are plain JPEG images.
    const FORMAT: &[u8] = b"MJPG";

    /// Video device on a Linux machine.
    pub struct V4lCamera {
        cam: Camera,
    }

    impl V4lCamera {
        /// Open and start the device named in `constraints`.
        ///
        /// The requested resolution is used if the device supports it, otherwise the largest
        /// available one. Facing mode cannot be negotiated with V4L, pick the device instead.
        pub fn open(constraints: &CaptureConstraints) -> Result<Self, CaptureError> {
            let mut cam = Camera::new(&constraints.device).map_err(device_err)?;
            log_supported_formats(&cam);

            log::info!(
                "Using camera {} (facing {})",
                &constraints.device,
                constraints.facing
            );

            let requested = (constraints.width, constraints.height);
            let resolution = match supports_resolution(&cam, requested)? {
                true => requested,
                false => get_max_resolution(&cam)?,
            };
            let frame_rate = get_max_frame_rate(&cam, resolution)?;

            cam.start(&Config {
                interval: frame_rate,
                resolution,
                format: FORMAT,
                ..Default::default()
            })
            .map_err(device_err)?;

            Ok(Self { cam })
        }
    }

    impl CameraDevice for V4lCamera {
        fn snapshot(&mut self) -> Result<String, CaptureError> {
            let frame = self.cam.capture().map_err(|err| {
                log::error!("Error capturing frame: {}", err);
                CaptureError::NoFrame
            })?;
            log::debug!("Captured frame ({} bytes)", frame.len());

            Ok(encode_data_uri("image/jpeg", &frame[..]))
        }
    }

    fn device_err(err: impl std::fmt::Display) -> CaptureError {
        CaptureError::Device(err.to_string())
    }

    fn supports_resolution(cam: &Camera, resolution: (u32, u32)) -> Result<bool, CaptureError> {
        let supported = match cam.resolutions(FORMAT).map_err(device_err)? {
            rscam::ResolutionInfo::Discretes(resolutions) => resolutions.contains(&resolution),
            rscam::ResolutionInfo::Stepwise { min, max, step: _ } => {
                (min.0..=max.0).contains(&resolution.0) && (min.1..=max.1).contains(&resolution.1)
            }
        };
        Ok(supported)
    }

    /// Get the maximum supported resolution.
    fn get_max_resolution(cam: &Camera) -> Result<(u32, u32), CaptureError> {
        let resolution_info = cam.resolutions(FORMAT).map_err(device_err)?;
        log::debug!("Found resolutions: {:?}", &resolution_info);
        match resolution_info {
            rscam::ResolutionInfo::Discretes(resolutions) => resolutions
                .iter()
                // Highest resolution in terms of number of pixels
                .max_by_key(|res| res.0 * res.1)
                .copied(),
            rscam::ResolutionInfo::Stepwise {
                min: _,
                max,
                step: _,
            } => Some(max),
        }
        .ok_or_else(|| CaptureError::Device("no resolution found".into()))
    }

    /// Get the maximum supported frame rate for the given resolution.
    fn get_max_frame_rate(cam: &Camera, resolution: (u32, u32)) -> Result<(u32, u32), CaptureError> {
        let interval_info = cam.intervals(FORMAT, resolution).map_err(device_err)?;
        log::debug!("Found frame rates: {:?}", &interval_info);
        match interval_info {
            rscam::IntervalInfo::Discretes(frame_rates) => frame_rates
                .iter()
                // Intervals are (numerator, denominator) in seconds per frame
                .max_by_key(|(numerator, denominator)| denominator / numerator.max(&1))
                .copied(),
            rscam::IntervalInfo::Stepwise {
                min: _,
                max,
                step: _,
            } => Some(max),
        }
        .ok_or_else(|| CaptureError::Device("no frame rate found".into()))
    }

    fn log_supported_formats(cam: &Camera) {
        let formats: Vec<_> = cam.formats().filter_map(Result::ok).collect();
        log::debug!("Supported formats: {:?}", formats);
    }

}
