//! FTPS artifact upload.
//!
//! Printers expose an FTPS endpoint on port 990 authenticated with the
//! per-printer access code. The devices present self-signed certificates,
//! so peer and host verification are disabled.

use std::fs::File;
use std::path::Path;

use log::info;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{NativeTlsConnector, NativeTlsFtpStream};

use crate::config::PrinterDefinition;
use crate::error::TransportError;

use super::ArtifactUploader;

const FTPS_PORT: u16 = 990;
const FTPS_USER: &str = "bblp";

pub struct FtpsUploader;

impl ArtifactUploader for FtpsUploader {
    fn upload(
        &self,
        printer: &PrinterDefinition,
        local_path: &Path,
        remote_name: &str,
    ) -> Result<(), TransportError> {
        if printer.host.is_empty() || printer.access_code.is_empty() {
            return Err(TransportError::MissingCredentials(printer.key().to_string()));
        }

        let mut source = File::open(local_path).map_err(|e| TransportError::OpenSource {
            path: local_path.to_path_buf(),
            source: e,
        })?;

        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        let address = format!("{}:{}", printer.host, FTPS_PORT);
        let mut ftp = NativeTlsFtpStream::connect_secure_implicit(
            &address,
            NativeTlsConnector::from(connector),
            &printer.host,
        )
        .map_err(|e| TransportError::Ftps(e.to_string()))?;

        ftp.login(FTPS_USER, &printer.access_code)
            .map_err(|e| TransportError::Ftps(e.to_string()))?;
        ftp.transfer_type(FileType::Binary)
            .map_err(|e| TransportError::Ftps(e.to_string()))?;
        ftp.put_file(remote_name, &mut source)
            .map_err(|e| TransportError::Ftps(e.to_string()))?;
        let _ = ftp.quit();

        info!(
            "Uploaded {} to ftps://{}/{}",
            local_path.display(),
            printer.host,
            remote_name
        );
        Ok(())
    }
}
