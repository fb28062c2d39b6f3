//! `passage certificates` command implementation.

use std::time::SystemTime;

use clap::Args;
use passage_config::CertificatePaths;
use passage_oauth::{CertificateSet, PinnedCertificate};

use super::CommonArgs;
use crate::error::CliError;
use crate::output::{Output, Status};

const SECS_PER_DAY: u64 = 86_400;

/// Arguments for the certificates command.
#[derive(Args)]
pub(crate) struct CertificatesArgs {
    #[command(flatten)]
    pub(crate) common: CommonArgs,
}

impl CertificatesArgs {
    /// List the certificates RSA signatures are checked against.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.common.load_config()?;

        let mixi = config.mixi.unwrap_or_default();
        let certificates = CertificateSet::load(&mixi.certificates)?;
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());

        output.section("mixi signature certificates");
        for which in PinnedCertificate::ALL {
            let certificate = certificates.get(which);
            let line = format!(
                "{:<16} {:<10} notAfter={}",
                which.name(),
                source(&mixi.certificates, which),
                certificate.not_after_unix()
            );
            let remaining = certificate.not_after_unix().saturating_sub(now) / SECS_PER_DAY;
            if certificate.not_after_unix() > now {
                output.status(Status::Ok, &format!("{line}  {remaining} days left"));
            } else if mixi.allow_expired_certificates {
                output.status(Status::Warn, &format!("{line}  expired, accepted"));
            } else {
                output.status(Status::Fail, &format!("{line}  expired"));
            }
        }

        if mixi.allow_expired_certificates {
            output.warning("allow_expired_certificates is enabled");
        }
        Ok(())
    }
}

/// Where a certificate comes from: `built-in` or `configured`.
fn source(paths: &CertificatePaths, which: PinnedCertificate) -> &'static str {
    let configured = match which {
        PinnedCertificate::Pc => &paths.pc,
        PinnedCertificate::Touch => &paths.touch,
        PinnedCertificate::PhotoUpload => &paths.photo_upload,
        PinnedCertificate::LifecycleEvent => &paths.lifecycle_event,
    };
    if configured.is_some() {
        "configured"
    } else {
        "built-in"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source() {
        let paths = CertificatePaths {
            touch: Some("touch.pem".into()),
            ..CertificatePaths::default()
        };
        assert_eq!(source(&paths, PinnedCertificate::Pc), "built-in");
        assert_eq!(source(&paths, PinnedCertificate::Touch), "configured");
    }
}
