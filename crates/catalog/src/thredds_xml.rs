//! THREDDS `catalog.xml` parsing.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Url;

use crate::error::{CatalogError, CatalogResult};

/// HTTP file service base used when the catalog does not declare one.
pub const DEFAULT_FILE_SERVER_BASE: &str = "/thredds/fileServer/";

/// A dataset listed in a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub url_path: String,
}

/// Datasets of a catalog in document order, plus its HTTP file service base.
#[derive(Debug, Clone, Default)]
pub struct CatalogListing {
    pub entries: Vec<CatalogEntry>,
    pub file_server_base: Option<String>,
}

impl CatalogListing {
    /// The newest dataset: the last one listed.
    pub fn newest(&self) -> Option<&CatalogEntry> {
        self.entries.last()
    }
}

/// Parse a THREDDS catalog document.
///
/// Only `dataset` elements carrying a `urlPath` are entries; container
/// datasets are skipped.
pub fn parse_catalog(xml: &str) -> CatalogResult<CatalogListing> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut listing = CatalogListing::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"dataset" => {
                    let name = attribute(&e, b"name");
                    if let (Some(name), Some(url_path)) = (name, attribute(&e, b"urlPath")) {
                        listing.entries.push(CatalogEntry { name, url_path });
                    }
                }
                b"service" => {
                    let is_file_server = attribute(&e, b"serviceType")
                        .map(|t| t.eq_ignore_ascii_case("httpserver"))
                        .unwrap_or(false);
                    if is_file_server {
                        listing.file_server_base = attribute(&e, b"base");
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CatalogError::Xml(format!(
                    "at position {}: {:?}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(listing)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Absolute download URL for a dataset listed in `catalog_url`.
pub fn resolve_data_url(
    catalog_url: &str,
    file_server_base: Option<&str>,
    url_path: &str,
) -> CatalogResult<String> {
    let base = file_server_base.unwrap_or(DEFAULT_FILE_SERVER_BASE);
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };

    let catalog = Url::parse(catalog_url)
        .map_err(|e| CatalogError::InvalidUrl(format!("{}: {}", catalog_url, e)))?;
    let service = catalog
        .join(&base)
        .map_err(|e| CatalogError::InvalidUrl(format!("{}: {}", base, e)))?;
    let data = service
        .join(url_path.trim_start_matches('/'))
        .map_err(|e| CatalogError::InvalidUrl(format!("{}: {}", url_path, e)))?;
    Ok(data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0" xmlns:xlink="http://www.w3.org/1999/xlink" name="Channel01" version="1.0.1">
  <service name="DefaultServices" serviceType="Compound" base="">
    <service name="OPENDAP" serviceType="OPENDAP" base="/thredds/dodsC/" />
    <service name="HTTPServer" serviceType="HTTPServer" base="/thredds/fileServer/" />
  </service>
  <dataset name="Channel01" ID="goes/east/Channel01">
    <metadata inherited="true">
      <serviceName>DefaultServices</serviceName>
    </metadata>
    <dataset name="OR_ABI-L2-CMIPC-M6C01_G16_s20230861756170_e20230861758543_c20230861759003.nc" urlPath="satellite/goes/east/Channel01/current/OR_ABI-L2-CMIPC-M6C01_G16_s20230861756170_e20230861758543_c20230861759003.nc">
      <dataSize units="Mbytes">1.113</dataSize>
    </dataset>
    <dataset name="OR_ABI-L2-CMIPC-M6C01_G16_s20230861801170_e20230861803543_c20230861804003.nc" urlPath="satellite/goes/east/Channel01/current/OR_ABI-L2-CMIPC-M6C01_G16_s20230861801170_e20230861803543_c20230861804003.nc" />
  </dataset>
</catalog>"#;

    #[test]
    fn test_parse_catalog() {
        let listing = parse_catalog(CATALOG).unwrap();
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.file_server_base.as_deref(), Some("/thredds/fileServer/"));

        let newest = listing.newest().unwrap();
        assert!(newest.name.contains("s20230861801170"));
        assert!(newest.url_path.starts_with("satellite/goes/east/Channel01/current/"));
    }

    #[test]
    fn test_empty_catalog() {
        let xml = "<catalog><dataset name=\"folder\"></dataset></catalog>";
        let listing = parse_catalog(xml).unwrap();
        assert!(listing.newest().is_none());
    }

    #[test]
    fn test_malformed_catalog() {
        assert!(matches!(
            parse_catalog("<catalog><dataset></catalog>"),
            Err(CatalogError::Xml(_))
        ));
    }

    #[test]
    fn test_resolve_data_url() {
        let url = resolve_data_url(
            "https://thredds.ucar.edu/thredds/catalog/satellite/goes/east/Channel01/current/catalog.xml",
            Some("/thredds/fileServer/"),
            "satellite/goes/east/Channel01/current/a.nc",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://thredds.ucar.edu/thredds/fileServer/satellite/goes/east/Channel01/current/a.nc"
        );
    }

    #[test]
    fn test_resolve_data_url_default_base() {
        let catalog = "http://localhost:8080/thredds/catalog/x/catalog.xml";
        let url = resolve_data_url(catalog, None, "x/b.nc").unwrap();
        assert_eq!(url, "http://localhost:8080/thredds/fileServer/x/b.nc");
    }
}
