/// Default photo upload limit: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Static, per-request admission threshold for photo uploads.
///
/// Enforced twice: against the declared request length before the body is
/// read, and against the running byte count while the file is streamed to
/// staging, so an undeclared or lying length cannot grow storage past the
/// limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimit {
    max_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("upload of {size} bytes exceeds the {limit} byte limit")]
pub struct UploadTooLarge {
    pub size: u64,
    pub limit: u64,
}

impl Default for UploadLimit {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadLimit {
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Checks a header-declared length. An absent length is admitted here
    /// and bounded later by [`UploadLimit::admit_received`].
    pub fn admit_declared(&self, declared: Option<u64>) -> Result<(), UploadTooLarge> {
        match declared {
            Some(size) => self.admit_received(size),
            None => Ok(()),
        }
    }

    /// Checks the number of bytes actually received so far.
    pub fn admit_received(&self, received: u64) -> Result<(), UploadTooLarge> {
        if received > self.max_bytes {
            return Err(UploadTooLarge {
                size: received,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit() {
        assert_eq!(UploadLimit::default().max_bytes(), 5_242_880);
    }

    #[test]
    fn test_admit_declared() {
        let limit = UploadLimit::new(100);
        assert!(limit.admit_declared(Some(100)).is_ok());
        assert!(limit.admit_declared(None).is_ok());
        assert_eq!(
            limit.admit_declared(Some(101)),
            Err(UploadTooLarge {
                size: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn test_admit_received() {
        let limit = UploadLimit::new(10);
        assert!(limit.admit_received(0).is_ok());
        assert!(limit.admit_received(10).is_ok());
        assert!(limit.admit_received(11).is_err());
    }
}
