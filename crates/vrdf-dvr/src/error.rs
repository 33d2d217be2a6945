//! Controller error types.

use thiserror::Error;
use vrdf_core::VolumeError;
use vrdf_gpu::GpuError;

/// Result type for controller operations.
pub type DvrResult<T> = Result<T, DvrError>;

/// Failure category reported to callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No file for the requested code, or the file vanished.
    FileNotFound,
    /// Container or header could not be parsed.
    MalformedContainer,
    /// Payload size disagrees with the grid.
    CorruptVolume,
    /// Shader or texture format not available on this target.
    ShaderOrPlatformUnsupported,
    /// Texture allocation failed.
    ResourceExhaustion,
    /// Anything else (I/O, loader thread).
    Other,
}

/// Errors from the volume controller.
#[derive(Debug, Error)]
pub enum DvrError {
    /// Decode failure.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// Texture failure.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// Volume shader missing; rendering disabled.
    #[error("shader '{0}' is not available, volume rendering disabled")]
    ShaderUnsupported(String),

    /// Operation needs a loaded volume.
    #[error("no volume loaded")]
    NotLoaded,

    /// Loader thread could not be started or has exited.
    #[error("volume loader thread is gone")]
    LoaderGone,

    /// Config file unreadable or invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl DvrError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Volume(VolumeError::FileNotFound(_)) => ErrorKind::FileNotFound,
            Self::Volume(VolumeError::MalformedContainer(_)) => ErrorKind::MalformedContainer,
            Self::Volume(VolumeError::CorruptVolume { .. }) => ErrorKind::CorruptVolume,
            Self::Volume(VolumeError::Io(_)) => ErrorKind::Other,
            Self::Gpu(GpuError::CorruptVolume { .. }) => ErrorKind::CorruptVolume,
            Self::Gpu(GpuError::InvalidVolume(_)) => ErrorKind::MalformedContainer,
            Self::Gpu(GpuError::ResourceExhaustion(_)) => ErrorKind::ResourceExhaustion,
            Self::Gpu(
                GpuError::Unsupported(_)
                | GpuError::NoAdapter
                | GpuError::BackendNotAvailable(_)
                | GpuError::DeviceCreation(_),
            ) => ErrorKind::ShaderOrPlatformUnsupported,
            Self::Gpu(GpuError::UnknownTexture(_) | GpuError::OutOfBounds { .. }) => ErrorKind::Other,
            Self::ShaderUnsupported(_) => ErrorKind::ShaderOrPlatformUnsupported,
            Self::NotLoaded | Self::LoaderGone | Self::Config(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_mapping() {
        let e: DvrError = VolumeError::FileNotFound(PathBuf::from("x.vrdf")).into();
        assert_eq!(e.kind(), ErrorKind::FileNotFound);

        let e: DvrError = VolumeError::malformed("bad magic").into();
        assert_eq!(e.kind(), ErrorKind::MalformedContainer);

        let e: DvrError = GpuError::CorruptVolume { what: "labels", expected: 8, actual: 7 }.into();
        assert_eq!(e.kind(), ErrorKind::CorruptVolume);

        let e: DvrError = GpuError::ResourceExhaustion("budget".into()).into();
        assert_eq!(e.kind(), ErrorKind::ResourceExhaustion);

        assert_eq!(
            DvrError::ShaderUnsupported("Custom/VolumeDVR_URP".into()).kind(),
            ErrorKind::ShaderOrPlatformUnsupported
        );
    }
}
