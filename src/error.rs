// error.rs — the error a whole run can end with.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::gpu::GpuError;
use crate::loader::LoadError;

#[derive(Debug, thiserror::Error)]
pub enum EqualizeError {
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot write image {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot write {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("display failed: {0}")]
    Display(#[from] minifb::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_pass_through() {
        let err = EqualizeError::from(GpuError::PlatformOutOfRange { index: 3, count: 1 });
        assert_eq!(err.to_string(), "platform index 3 out of range (1 platform(s) available)");

        let err = EqualizeError::from(ConfigError::PromptClosed);
        assert_eq!(err.to_string(), "no bin count given before end of input");
    }
}
