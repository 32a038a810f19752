use super::Error;

/// Degenerate input the engine cannot represent, such as a polygon with
/// fewer than three distinct vertices.
#[derive(Debug)]
pub(super) struct ServerError {
    message: Box<str>,
}

impl ServerError {
    pub(super) const CODE: u32 = 1;
}

impl std::error::Error for ServerError {}

impl core::fmt::Display for ServerError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn internal_server_error(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InternalServerError(ServerError {
            message: message.into().into(),
        }))
    }

    pub fn is_internal_server_error(&self) -> bool {
        self.chain()
            .any(|err| matches!(err.kind(), super::ErrorKind::InternalServerError(_)))
    }
}
