//! Captured surfaces and the conversion seam between capture and GPU memory.

use std::time::Duration;

/// A producer-delivered image buffer for one captured window frame.
///
/// Tightly packed RGBA8, row-major, no padding. The capture feed hands these
/// off by value and does not retain them afterwards.
#[derive(Debug, Clone)]
pub struct CapturedSurface {
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixel data, `width * height * 4` bytes.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp, relative to the capture source's epoch.
    pub timestamp: Duration,
}

impl CapturedSurface {
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp: Duration) -> Self {
        Self {
            width,
            height,
            data,
            timestamp,
        }
    }

    /// Byte length a well-formed surface of this extent must have.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Check that the surface can be uploaded as an RGBA8 texture.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConvertError::ZeroExtent {
                width: self.width,
                height: self.height,
            });
        }
        if self.data.len() != self.expected_len() {
            return Err(ConvertError::SizeMismatch {
                width: self.width,
                height: self.height,
                expected: self.expected_len(),
                got: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Errors turning a delivered surface into a GPU texture.
///
/// These are recovered locally: the store keeps the previous texture and
/// logs, it never surfaces conversion failures to the UI.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("surface has zero extent ({width}x{height})")]
    ZeroExtent { width: u32, height: u32 },

    #[error("surface byte length {got} does not match {width}x{height} RGBA8 ({expected})")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
}

/// Conversion seam from captured surfaces to GPU-resident frames.
///
/// The store is generic over this trait so the mailbox and untrack semantics
/// can be exercised without a GPU device.
pub trait SurfaceConverter: Send + Sync {
    type Frame: Send + Sync;

    fn convert(&self, surface: &CapturedSurface) -> Result<Self::Frame, ConvertError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(width: u32, height: u32, len: usize) -> CapturedSurface {
        CapturedSurface::new(width, height, vec![0u8; len], Duration::from_millis(1))
    }

    #[test]
    fn test_valid_surface() {
        assert!(surface(4, 2, 32).validate().is_ok());
    }

    #[test]
    fn test_zero_extent_rejected() {
        let result = surface(0, 2, 0).validate();
        assert!(matches!(result, Err(ConvertError::ZeroExtent { .. })));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let result = surface(4, 2, 31).validate();
        assert!(matches!(result, Err(ConvertError::SizeMismatch { got: 31, .. })));
    }
}
