use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Media type the recorder selects by default.
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

/// One output format a camera can stream in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub media_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
}

impl Capability {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            width: None,
            height: None,
            fps: None,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32, fps: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self.fps = Some(fps);
        self
    }
}

/// A camera discovered at startup. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<Capability>,
}

impl Camera {
    /// First capability whose media type matches, in declaration order.
    pub fn find_capability(&self, media_type: &str) -> Option<&Capability> {
        self.capabilities
            .iter()
            .find(|cap| cap.media_type == media_type)
    }
}

/// Opaque token returned by the camera collaborator for an active stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamToken(pub String);

/// An active camera→file recording.
///
/// Not `Clone`: a handle is consumed when its stream is stopped, so it can
/// never be stopped twice.
#[derive(Debug)]
pub struct StreamHandle {
    pub camera: Camera,
    pub capability: Capability,
    pub token: StreamToken,
    pub started_at: Instant,
}

/// A camera that was not recorded, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCamera {
    pub camera_id: String,
    pub reason: String,
}

/// Identity-only view of a camera, used in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSummary {
    pub id: String,
    pub name: String,
}

impl From<&Camera> for CameraSummary {
    fn from(camera: &Camera) -> Self {
        Self {
            id: camera.id.clone(),
            name: camera.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_capability_takes_first_match() {
        let camera = Camera {
            id: "cam0".into(),
            name: "Left".into(),
            capabilities: vec![
                Capability::new("video/x-raw"),
                Capability::new(JPEG_MEDIA_TYPE).with_resolution(1280, 720, 30),
                Capability::new(JPEG_MEDIA_TYPE).with_resolution(640, 480, 60),
            ],
        };

        let cap = camera.find_capability(JPEG_MEDIA_TYPE).unwrap();
        assert_eq!(cap.width, Some(1280));
        assert!(camera.find_capability("video/h264").is_none());
    }
}
