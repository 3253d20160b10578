use compression_codecs::{EncodeV2, deflate::DeflateEncoder, gzip::GzipEncoder};
use compression_core::Level;

/// Supported compression codecs, in server preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Gzip compression.
    Gzip,
    /// Deflate compression.
    Deflate,
}

impl Codec {
    /// Every codec this crate can produce, most preferred first.
    pub const SUPPORTED: [Codec; 2] = [Codec::Gzip, Codec::Deflate];

    /// Returns the Content-Encoding header value for this codec.
    pub fn content_encoding(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
        }
    }

    /// Looks up a codec by its content-coding token, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Codec> {
        Self::SUPPORTED
            .into_iter()
            .find(|codec| codec.content_encoding().eq_ignore_ascii_case(name))
    }

    /// Creates a new streaming encoder for this codec.
    pub fn encoder(&self) -> Box<dyn EncodeV2 + Send> {
        match self {
            Codec::Gzip => Box::new(GzipEncoder::new(Level::Default.into())),
            Codec::Deflate => Box::new(DeflateEncoder::new(Level::Default.into())),
        }
    }

    /// Parses the Accept-Encoding header and returns the best supported codec.
    ///
    /// `None` means identity: nothing acceptable to the client is supported
    /// here, and the response is sent uncompressed.
    pub fn from_accept_encoding(header: &str) -> Option<Codec> {
        AcceptEncoding::parse(header).negotiate()
    }

    fn priority(&self) -> usize {
        match self {
            Codec::Gzip => 0,
            Codec::Deflate => 1,
        }
    }
}

/// One entry of an `Accept-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preference<'a> {
    /// The content-coding token as written by the client.
    pub name: &'a str,
    /// The relative quality, in `0.0..=1.0`.
    pub quality: f32,
    /// Zero-based position of the entry in the header.
    pub position: usize,
}

/// The client's encoding preferences, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptEncoding<'a> {
    preferences: Vec<Preference<'a>>,
}

impl<'a> AcceptEncoding<'a> {
    /// Parses a header value such as `"gzip, deflate;q=0.5, br"`.
    ///
    /// Empty entries are skipped. A quality that cannot be parsed, or that
    /// lies outside `0.0..=1.0`, is taken as `0`.
    pub fn parse(header: &'a str) -> Self {
        let preferences = header
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .enumerate()
            .map(|(position, part)| {
                let (name, quality) = parse_encoding_with_quality(part);
                Preference {
                    name,
                    quality,
                    position,
                }
            })
            .collect();

        Self { preferences }
    }

    /// Returns the parsed entries in header order.
    pub fn preferences(&self) -> &[Preference<'a>] {
        &self.preferences
    }

    /// Selects the best supported codec.
    ///
    /// Highest quality wins; ties go to the entry listed first, then to the
    /// server's own preference order. Entries with quality `0` are refused.
    pub fn negotiate(&self) -> Option<Codec> {
        self.preferences
            .iter()
            .filter(|pref| pref.quality > 0.0)
            .filter_map(|pref| Codec::from_name(pref.name).map(|codec| (codec, pref)))
            .min_by(|(codec_a, a), (codec_b, b)| {
                b.quality
                    .total_cmp(&a.quality)
                    .then(a.position.cmp(&b.position))
                    .then(codec_a.priority().cmp(&codec_b.priority()))
            })
            .map(|(codec, _)| codec)
    }
}

/// Parses an encoding entry like "gzip" or "br;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.split(';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .map(str::trim)
        .find_map(|param| {
            param
                .strip_prefix("q=")
                .or_else(|| param.strip_prefix("Q="))
        })
        .map_or(1.0, |q| match q.trim().parse::<f32>() {
            Ok(q) if (0.0..=1.0).contains(&q) => q,
            _ => 0.0,
        });

    (encoding, quality)
}
