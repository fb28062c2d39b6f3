//! Public certificates used to verify RSA-SHA1 signed mixi requests.
//!
//! mixi signs PC, touch, photo upload and lifecycle event requests with
//! separate keys. The published certificates are compiled in; each can be
//! replaced by a PEM file from configuration.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

use passage_config::CertificatePaths;

use crate::error::CertificateError;

/// Compiled-in mixi signing certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinnedCertificate {
    /// PC mixi apps.
    Pc,
    /// Touch (smartphone) mixi apps.
    Touch,
    /// Photo upload callbacks.
    PhotoUpload,
    /// Lifecycle event notifications (install, remove, ...).
    LifecycleEvent,
}

impl PinnedCertificate {
    pub const ALL: [Self; 4] = [Self::Pc, Self::Touch, Self::PhotoUpload, Self::LifecycleEvent];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pc => "pc",
            Self::Touch => "touch",
            Self::PhotoUpload => "photo_upload",
            Self::LifecycleEvent => "lifecycle_event",
        }
    }

    /// PEM text of the published certificate.
    #[must_use]
    pub fn pem(self) -> &'static str {
        match self {
            Self::Pc => include_str!("../certs/mixi_pc.pem"),
            Self::Touch => include_str!("../certs/mixi_touch.pem"),
            Self::PhotoUpload => include_str!("../certs/mixi_photo_upload.pem"),
            Self::LifecycleEvent => include_str!("../certs/mixi_lifecycle_event.pem"),
        }
    }

    /// Parse the compiled-in certificate.
    pub fn load(self) -> Result<PublicCertificate, CertificateError> {
        PublicCertificate::from_pem(self.pem())
    }
}

/// RSA public key and expiry extracted from an X.509 certificate.
#[derive(Debug, Clone)]
pub struct PublicCertificate {
    public_key: RsaPublicKey,
    not_after: SystemTime,
}

impl PublicCertificate {
    /// Parse a PEM encoded certificate.
    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let certificate = Certificate::from_pem(pem.as_bytes())?;
        let tbs = &certificate.tbs_certificate;
        let spki = tbs.subject_public_key_info.to_der()?;
        let public_key = RsaPublicKey::from_public_key_der(&spki)?;
        let not_after = UNIX_EPOCH + tbs.validity.not_after.to_unix_duration();
        Ok(Self {
            public_key,
            not_after,
        })
    }

    /// Read and parse a PEM certificate file.
    pub fn from_file(path: &Path) -> Result<Self, CertificateError> {
        let pem = std::fs::read_to_string(path).map_err(|source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&pem)
    }

    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// End of the validity period.
    #[must_use]
    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    /// `notAfter` as seconds since the Unix epoch.
    #[must_use]
    pub fn not_after_unix(&self) -> u64 {
        self.not_after
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }

    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now > self.not_after
    }
}

/// The four verification certificates in effect.
#[derive(Debug, Clone)]
pub struct CertificateSet {
    pc: PublicCertificate,
    touch: PublicCertificate,
    photo_upload: PublicCertificate,
    lifecycle_event: PublicCertificate,
}

impl CertificateSet {
    /// Compiled-in certificates only.
    pub fn pinned() -> Result<Self, CertificateError> {
        Self::load(&CertificatePaths::default())
    }

    /// Compiled-in certificates, replaced by configured files where given.
    pub fn load(paths: &CertificatePaths) -> Result<Self, CertificateError> {
        let load = |pinned: PinnedCertificate, path: Option<&Path>| match path {
            Some(path) => PublicCertificate::from_file(path),
            None => pinned.load(),
        };
        Ok(Self {
            pc: load(PinnedCertificate::Pc, paths.pc.as_deref())?,
            touch: load(PinnedCertificate::Touch, paths.touch.as_deref())?,
            photo_upload: load(PinnedCertificate::PhotoUpload, paths.photo_upload.as_deref())?,
            lifecycle_event: load(
                PinnedCertificate::LifecycleEvent,
                paths.lifecycle_event.as_deref(),
            )?,
        })
    }

    #[must_use]
    pub fn get(&self, which: PinnedCertificate) -> &PublicCertificate {
        match which {
            PinnedCertificate::Pc => &self.pc,
            PinnedCertificate::Touch => &self.touch,
            PinnedCertificate::PhotoUpload => &self.photo_upload,
            PinnedCertificate::LifecycleEvent => &self.lifecycle_event,
        }
    }

    /// Replace one certificate.
    #[must_use]
    pub fn with(mut self, which: PinnedCertificate, certificate: PublicCertificate) -> Self {
        match which {
            PinnedCertificate::Pc => self.pc = certificate,
            PinnedCertificate::Touch => self.touch = certificate,
            PinnedCertificate::PhotoUpload => self.photo_upload = certificate,
            PinnedCertificate::LifecycleEvent => self.lifecycle_event = certificate,
        }
        self
    }
}
