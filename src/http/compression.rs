//! Response compression negotiation.
//!
//! # Responsibilities
//! - Pick a content coding from the client's `Accept-Encoding`
//! - Decide whether a response is worth compressing
//! - Gzip response bodies
//!
//! # Design Decisions
//! - gzip is the only coding produced; `identity` is never a compression
//! - MIME matching ignores parameters (`; charset=utf-8`) and case
//! - HTTPS responses are left alone unless explicitly enabled (BREACH-style oracles)

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};

use crate::config::CompressionConfig;

/// Content codings this service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Gzip,
    Identity,
}

impl ContentCoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Gzip => "gzip",
            ContentCoding::Identity => "identity",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressionNegotiator {
    enabled: bool,
    enable_for_https: bool,
    min_size: usize,
    mime_types: Vec<String>,
}

impl CompressionNegotiator {
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self {
            enabled: config.enabled,
            enable_for_https: config.enable_for_https,
            min_size: config.min_size_bytes,
            mime_types: config
                .mime_types
                .iter()
                .map(|mime| essence(mime).to_string())
                .collect(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the transport allows compression at all.
    pub fn allows_transport(&self, is_https: bool) -> bool {
        self.enabled && (!is_https || self.enable_for_https)
    }

    pub fn is_compressible(&self, content_type: &str) -> bool {
        let essence = essence(content_type);
        self.mime_types.iter().any(|mime| *mime == essence)
    }

    /// First coding in the client's list that we support and it did not refuse
    /// with `q=0`. `*` only stands for gzip when gzip is not refused explicitly.
    pub fn select_encoding(&self, accept_encoding: Option<&str>) -> ContentCoding {
        let Some(accept_encoding) = accept_encoding else {
            return ContentCoding::Identity;
        };

        let entries: Vec<(String, bool)> = accept_encoding
            .split(',')
            .map(|entry| {
                let mut parts = entry.split(';');
                let coding = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
                (coding, refused(parts))
            })
            .collect();
        let gzip_refused = entries
            .iter()
            .any(|(coding, refused)| *refused && is_gzip(coding));

        let accepted = entries
            .iter()
            .filter(|(_, refused)| !refused)
            .any(|(coding, _)| is_gzip(coding) || (coding == "*" && !gzip_refused));
        if accepted {
            ContentCoding::Gzip
        } else {
            ContentCoding::Identity
        }
    }

    pub fn should_compress(
        &self,
        content_type: Option<&str>,
        response_size: usize,
        is_https: bool,
        accept_encoding: Option<&str>,
    ) -> bool {
        self.allows_transport(is_https)
            && response_size >= self.min_size
            && content_type.is_some_and(|ct| self.is_compressible(ct))
            && self.select_encoding(accept_encoding) == ContentCoding::Gzip
    }

    pub fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
        encoder.write_all(body)?;
        encoder.finish()
    }
}

/// `Application/JSON; charset=utf-8` → `application/json`.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_gzip(coding: &str) -> bool {
    matches!(coding, "gzip" | "x-gzip")
}

fn refused<'a>(params: impl Iterator<Item = &'a str>) -> bool {
    params
        .filter_map(|param| param.trim().strip_prefix("q="))
        .any(|q| q.trim().parse::<f32>().map(|q| q <= 0.0).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn negotiator() -> CompressionNegotiator {
        CompressionNegotiator::from_config(&CompressionConfig::default())
    }

    #[test]
    fn test_select_encoding() {
        let n = negotiator();
        assert_eq!(n.select_encoding(Some("gzip, deflate")), ContentCoding::Gzip);
        assert_eq!(n.select_encoding(Some("br, GZIP;q=0.5")), ContentCoding::Gzip);
        assert_eq!(n.select_encoding(Some("*")), ContentCoding::Gzip);
        assert_eq!(n.select_encoding(Some("gzip;q=0")), ContentCoding::Identity);
        assert_eq!(n.select_encoding(Some("*, gzip;q=0")), ContentCoding::Identity);
        assert_eq!(n.select_encoding(Some("gzip;q=0, *")), ContentCoding::Identity);
        assert_eq!(n.select_encoding(Some("br;q=0, *")), ContentCoding::Gzip);
        assert_eq!(n.select_encoding(Some("identity")), ContentCoding::Identity);
        assert_eq!(n.select_encoding(Some("br")), ContentCoding::Identity);
        assert_eq!(n.select_encoding(None), ContentCoding::Identity);
    }

    #[test]
    fn test_should_compress_large_json() {
        let n = negotiator();
        assert!(n.should_compress(Some("application/json"), 5000, false, Some("gzip")));
        assert!(n.should_compress(
            Some("Application/JSON; charset=utf-8"),
            5000,
            false,
            Some("gzip")
        ));
    }

    #[test]
    fn test_should_not_compress() {
        let n = negotiator();
        // Too small.
        assert!(!n.should_compress(Some("application/json"), 10, false, Some("gzip")));
        // Not an eligible type.
        assert!(!n.should_compress(Some("image/png"), 5000, false, Some("gzip")));
        assert!(!n.should_compress(None, 5000, false, Some("gzip")));
        // HTTPS without opt-in.
        assert!(!n.should_compress(Some("application/json"), 5000, true, Some("gzip")));
        // Client does not accept gzip.
        assert!(!n.should_compress(Some("application/json"), 5000, false, Some("identity")));
        assert!(!n.should_compress(Some("application/json"), 5000, false, None));
    }

    #[test]
    fn test_https_opt_in() {
        let n = CompressionNegotiator::from_config(&CompressionConfig {
            enable_for_https: true,
            ..CompressionConfig::default()
        });
        assert!(n.should_compress(Some("application/json"), 5000, true, Some("gzip")));
    }

    #[test]
    fn test_disabled() {
        let n = CompressionNegotiator::from_config(&CompressionConfig {
            enabled: false,
            ..CompressionConfig::default()
        });
        assert!(!n.should_compress(Some("application/json"), 5000, false, Some("gzip")));
    }

    #[test]
    fn test_compress_produces_gzip() {
        let body = br#"{"value":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}"#.repeat(50);
        let compressed = negotiator().compress(&body).unwrap();
        assert!(compressed.len() < body.len());

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, body);
    }
}
