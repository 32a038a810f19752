use super::Error;

/// Error from the database engine or its client library.
#[derive(Debug)]
pub(super) struct DriverError {
    pub(super) inner: Box<dyn std::error::Error + Send + Sync>,
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl core::fmt::Display for DriverError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.inner, f)?;
        let mut source = self.inner.source();
        while let Some(err) = source {
            write!(f, ": {}", err)?;
            source = err.source();
        }
        Ok(())
    }
}

impl Error {
    /// Wraps an engine or client-library error.
    pub fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::from(super::ErrorKind::Driver(DriverError {
            inner: Box::new(err),
        }))
    }

    /// Returns `true` if this error is a driver error.
    pub fn is_driver(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Driver(_))
    }

    /// The wrapped engine error, searched through the context chain.
    ///
    /// Drivers downcast this to their client library's error type to apply
    /// engine-specific recovery policies.
    pub fn driver_source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::Driver(driver) => {
                Some(driver.inner.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        })
    }
}
