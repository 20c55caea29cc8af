// FTP access to the IBGE catalog

use crate::config::RemoteConfig;
use crate::error::{CatalogError, Result};
use crate::sync::RemoteCatalog;
use std::io::{self, Write};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info};

/// Map a suppaftp failure on `path`; any 5xx reply is a permanent refusal
fn classify(path: &str, error: FtpError) -> CatalogError {
    match error {
        FtpError::UnexpectedResponse(response) if (500..600).contains(&response.status.code()) => {
            CatalogError::permission_denied(
                path,
                format!(
                    "{} {}",
                    response.status.code(),
                    String::from_utf8_lossy(&response.body).trim()
                ),
            )
        }
        other => CatalogError::transport(path, other.to_string()),
    }
}

/// Interpret a SIZE reply; servers without SIZE support answer with an
/// error code, which means "unknown" rather than a failure
fn size_reply(
    path: &str,
    reply: std::result::Result<usize, FtpError>,
) -> std::result::Result<Option<u64>, CatalogError> {
    match reply {
        Ok(size) => Ok(Some(size as u64)),
        Err(FtpError::UnexpectedResponse(_)) => Ok(None),
        Err(e) => Err(classify(path, e)),
    }
}

/// Live FTP session implementing [`RemoteCatalog`]
///
/// The session is not shared between threads; open one per worker.
pub struct FtpCatalog {
    stream: FtpStream,
}

impl FtpCatalog {
    /// Connect, log in and switch to binary transfers
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let address = config.address();
        info!("Connecting to FTP server: {}", address);

        let mut stream = FtpStream::connect(&address).map_err(|e| classify(&address, e))?;
        stream
            .login(&config.user, &config.password)
            .map_err(|e| classify(&address, e))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| classify(&address, e))?;

        debug!("FTP session ready on {}", address);
        Ok(Self { stream })
    }

    /// Close the session politely
    pub fn quit(mut self) -> Result<()> {
        self.stream.quit().map_err(|e| classify("QUIT", e))?;
        Ok(())
    }
}

impl RemoteCatalog for FtpCatalog {
    fn list_directory(&mut self, path: &str) -> std::result::Result<Vec<String>, CatalogError> {
        debug!("Listing {}", path);
        // IBGE refuses CWD into years it has not published; the listing
        // itself is taken relative to the new working directory.
        self.stream.cwd(path).map_err(|e| classify(path, e))?;
        self.stream.list(None).map_err(|e| classify(path, e))
    }

    fn retrieve(
        &mut self,
        remote_path: &str,
        sink: &mut dyn Write,
    ) -> std::result::Result<u64, CatalogError> {
        debug!("Retrieving file: {}", remote_path);
        self.stream
            .retr(remote_path, |reader| {
                io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
            })
            .map_err(|e| classify(remote_path, e))
    }

    fn size_of(&mut self, remote_path: &str) -> std::result::Result<Option<u64>, CatalogError> {
        size_reply(remote_path, self.stream.size(remote_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use suppaftp::Status;
    use suppaftp::types::Response;

    fn unexpected(status: Status, body: &[u8]) -> FtpError {
        FtpError::UnexpectedResponse(Response::new(status, body.to_vec()))
    }

    #[test]
    fn test_refused_year_directory_is_permission_denied() {
        let error = unexpected(Status::FileUnavailable, b"550 Failed to change directory.");
        let classified = classify("/Microdados/2031", error);
        assert!(classified.is_permission_denied());
        assert!(classified.to_string().contains("550"));
        assert!(classified.to_string().contains("/Microdados/2031"));
    }

    #[test]
    fn test_size_reply() {
        assert_eq!(size_reply("/a.zip", Ok(2048)).unwrap(), Some(2048));

        let unsupported = unexpected(Status::FileUnavailable, b"550 SIZE not allowed");
        assert_eq!(size_reply("/a.zip", Err(unsupported)).unwrap(), None);

        let reset = FtpError::ConnectionError(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        let err = size_reply("/a.zip", Err(reset)).unwrap_err();
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_connection_errors_are_transport_failures() {
        let error = FtpError::ConnectionError(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        let classified = classify("/Microdados/2012", error);
        assert!(!classified.is_permission_denied());
        assert!(classified.to_string().contains("/Microdados/2012"));
    }
}
