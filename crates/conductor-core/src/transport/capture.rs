//! Capture source resolution

use super::types::VideoSource;

/// Resolves a configured device index to a capturable video source
pub trait CaptureSourceProvider: Send + Sync {
    /// `None` when the index does not name a usable device
    fn open_video_source(&self, device_index: i32) -> Option<VideoSource>;
}

/// Capture provider backed by a fixed, already enumerated device list
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceList {
    devices: Vec<String>,
}

impl StaticDeviceList {
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            devices: devices.into_iter().map(Into::into).collect(),
        }
    }

    /// A provider with no devices; every lookup fails
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }
}

impl CaptureSourceProvider for StaticDeviceList {
    fn open_video_source(&self, device_index: i32) -> Option<VideoSource> {
        let index = usize::try_from(device_index).ok()?;
        let name = self.devices.get(index)?;
        tracing::debug!("Opening video capture device {} ({})", device_index, name);
        Some(VideoSource {
            device_index,
            device_name: name.clone(),
        })
    }
}
