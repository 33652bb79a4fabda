//! DSpace 6 REST API payloads.

use serde::{Deserialize, Deserializer};
use std::fmt;
use uuid::Uuid;

/// Read `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// `GET /status` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default, deserialize_with = "null_as_default")]
    pub authenticated: bool,
}

/// An item, as returned with `expand=bitstreams,metadata`
///
/// Only the bitstreams are read; metadata and other fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "null_as_default")]
    pub bitstreams: Vec<Bitstream>,
}

impl Item {
    /// Bitstreams that belong to `bundle`
    pub fn bitstreams_in_bundle<'a>(
        &'a self,
        bundle: &'a str,
    ) -> impl Iterator<Item = &'a Bitstream> {
        self.bitstreams.iter().filter(move |b| b.bundle_name == bundle)
    }
}

/// A file attached to an item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bitstream {
    pub uuid: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bundle_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,
}

/// Bitstream formats that may be overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BitstreamFormat {
    #[value(name = "PNG")]
    Png,
    #[value(name = "JPEG")]
    Jpeg,
    #[value(name = "GIF")]
    Gif,
    #[value(name = "Adobe PDF")]
    AdobePdf,
}

impl BitstreamFormat {
    /// The format label DSpace reports for a bitstream.
    pub fn label(self) -> &'static str {
        match self {
            BitstreamFormat::Png => "PNG",
            BitstreamFormat::Jpeg => "JPEG",
            BitstreamFormat::Gif => "GIF",
            BitstreamFormat::AdobePdf => "Adobe PDF",
        }
    }

    /// Whether a bitstream's format label is one of `formats`.
    pub fn matches_any(formats: &[BitstreamFormat], label: &str) -> bool {
        formats.iter().any(|f| f.label() == label)
    }
}

impl fmt::Display for BitstreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_bundle_filter() {
        let body = r#"{
            "uuid": "804351af-64eb-4e4a-968f-4d3be61358a8",
            "name": "Annual report",
            "bitstreams": [
                {
                    "uuid": "fca0fd2a-630e-4a34-b260-f645c8f2b027",
                    "name": "report.pdf",
                    "bundleName": "ORIGINAL",
                    "format": "Adobe PDF"
                },
                {
                    "uuid": "0bdb2197-12f4-4f7d-8b60-55c1906f3e24",
                    "name": "report.pdf.jpg",
                    "bundleName": "THUMBNAIL",
                    "format": "JPEG"
                }
            ],
            "metadata": [{"key": "dc.title", "value": null}]
        }"#;
        let item: Item = serde_json::from_str(body).unwrap();

        let original: Vec<_> = item.bitstreams_in_bundle("ORIGINAL").collect();
        assert_eq!(original.len(), 1);
        assert_eq!(original[0].name, "report.pdf");
        assert_eq!(item.bitstreams_in_bundle("LICENSE").count(), 0);
    }

    #[test]
    fn test_null_fields_do_not_fail_decoding() {
        let body = r#"{
            "bitstreams": [
                {
                    "uuid": "fca0fd2a-630e-4a34-b260-f645c8f2b027",
                    "name": null,
                    "bundleName": "ORIGINAL",
                    "format": null
                }
            ],
            "metadata": [{"key": "dc.date", "value": 2021}, {"unexpected": true}]
        }"#;
        let item: Item = serde_json::from_str(body).unwrap();

        let original: Vec<_> = item.bitstreams_in_bundle("ORIGINAL").collect();
        assert_eq!(original.len(), 1);
        assert_eq!(original[0].name, "");
        assert_eq!(original[0].format, "");

        let item: Item = serde_json::from_str(r#"{"bitstreams": null}"#).unwrap();
        assert!(item.bitstreams.is_empty());

        let status: Status =
            serde_json::from_str(r#"{"okay": true, "authenticated": null}"#).unwrap();
        assert!(!status.authenticated);
    }

    #[test]
    fn test_format_labels() {
        let formats = [BitstreamFormat::AdobePdf, BitstreamFormat::Png];
        assert!(BitstreamFormat::matches_any(&formats, "Adobe PDF"));
        assert!(BitstreamFormat::matches_any(&formats, "PNG"));
        assert!(!BitstreamFormat::matches_any(&formats, "JPEG"));
        assert!(!BitstreamFormat::matches_any(&[], "PNG"));
    }

    #[test]
    fn test_format_parses_from_cli_value() {
        use clap::ValueEnum;
        let parsed = BitstreamFormat::from_str("Adobe PDF", false).unwrap();
        assert_eq!(parsed, BitstreamFormat::AdobePdf);
        assert!(BitstreamFormat::from_str("TIFF", false).is_err());
    }
}
