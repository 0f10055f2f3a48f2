// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Asset Map (ST 429-9) parsing: builds the flat UUID -> absolute URI table
//! the composition engine uses to resolve `TrackFileId` references.

use log::{error, warn};
use roxmltree::Document;

use crate::error::{invalid_data, Result};
use crate::model::{AssetLocator, AssetLocatorMap};
use crate::xml::{first_child_by_name, read_uuid};

/// Parses one Asset Map document and appends its locators to `out`.
///
/// `asset_map_url` is the Asset Map document's own URL; relative `Path`
/// entries are resolved against its directory component. Asset Maps
/// supplied by the caller are processed in declaration order and appended in
/// that order, so the first entry for a given UUID across every processed
/// Asset Map wins (`AssetLocatorMap::push_first_wins`).
pub fn parse_asset_map(xml: &str, asset_map_url: &str, out: &mut AssetLocatorMap) -> Result<()> {
    let doc = Document::parse(xml).map_err(|parse_err| {
        error!("imf: failed to parse asset map {}: {}", asset_map_url, parse_err);
    });
    let doc = match doc {
        Ok(doc) => doc,
        Err(()) => return invalid_data("imf: asset map is not well-formed XML"),
    };

    let root = doc.root_element();
    if root.tag_name().name() != "AssetMap" {
        error!("imf: {} root element is not AssetMap", asset_map_url);
        return invalid_data("imf: asset map root element is not AssetMap");
    }

    let asset_list = match first_child_by_name(root, "AssetList") {
        Some(node) => node,
        None => {
            error!("imf: {} is missing AssetList", asset_map_url);
            return invalid_data("imf: asset map is missing AssetList");
        }
    };

    let base_dir = directory_of(asset_map_url);

    for asset in asset_list.children().filter(|n| n.is_element() && n.tag_name().name() == "Asset")
    {
        let uuid = read_uuid(asset, "Id")?;

        let chunk_list = match first_child_by_name(asset, "ChunkList") {
            Some(node) => node,
            None => {
                error!("imf: asset {} in {} is missing ChunkList", uuid, asset_map_url);
                return invalid_data("imf: asset map entry is missing ChunkList");
            }
        };

        let mut chunks =
            chunk_list.children().filter(|n| n.is_element() && n.tag_name().name() == "Chunk");

        let chunk = match chunks.next() {
            Some(chunk) => chunk,
            None => {
                error!("imf: asset {} in {} has no Chunk", uuid, asset_map_url);
                return invalid_data("imf: asset map entry has no Chunk");
            }
        };

        if chunks.next().is_some() {
            warn!("imf: asset {} in {} has multiple chunks, ignoring all but the first", uuid, asset_map_url);
        }

        let path = match first_child_by_name(chunk, "Path").and_then(|n| n.text()) {
            Some(path) => path.trim(),
            None => {
                error!("imf: asset {} in {} has no Path", uuid, asset_map_url);
                return invalid_data("imf: asset map chunk has no Path");
            }
        };

        let absolute_uri = resolve_uri(path, base_dir);

        out.push_first_wins(AssetLocator { uuid, absolute_uri });
    }

    Ok(())
}

/// Resolves an Asset Map `Path` entry against the Asset Map's own directory,
/// per the URI classification in `imf_uri_is_url`/`imf_uri_is_unix_abs_path`/
/// `imf_uri_is_dos_abs_path`.
fn resolve_uri(path: &str, base_dir: &str) -> String {
    if is_url(path) || is_unix_absolute(path) || is_windows_absolute(path) {
        path.to_string()
    }
    else {
        format!("{}{}", base_dir, path)
    }
}

fn is_url(path: &str) -> bool {
    path.contains("://")
}

fn is_unix_absolute(path: &str) -> bool {
    path.starts_with('/')
}

fn is_windows_absolute(path: &str) -> bool {
    if path.starts_with("\\\\") {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Returns the directory component of `url`, including the trailing
/// separator, or an empty string if `url` has no separator.
pub(crate) fn directory_of(url: &str) -> &str {
    match url.rfind('/') {
        Some(pos) => &url[..=pos],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET_MAP: &str = r#"<?xml version="1.0"?>
<AssetMap xmlns="http://www.smpte-ra.org/schemas/429-9/2007/AM">
  <AssetList>
    <Asset>
      <Id>urn:uuid:f81d4fae-7dec-11d0-a765-00a0c91e6bf6</Id>
      <ChunkList>
        <Chunk>
          <Path>video.mxf</Path>
        </Chunk>
      </ChunkList>
    </Asset>
    <Asset>
      <Id>urn:uuid:11111111-1111-1111-1111-111111111111</Id>
      <ChunkList>
        <Chunk>
          <Path>/abs/audio.mxf</Path>
        </Chunk>
      </ChunkList>
    </Asset>
  </AssetList>
</AssetMap>
"#;

    #[test]
    fn relative_path_resolved_against_asset_map_directory() {
        let mut map = AssetLocatorMap::new();
        parse_asset_map(ASSET_MAP, "file:///package/ASSETMAP.xml", &mut map).unwrap();
        let uuid = crate::model::Uuid::parse_str("f81d4fae-7dec-11d0-a765-00a0c91e6bf6").unwrap();
        assert_eq!(map.find(&uuid).unwrap().absolute_uri, "file:///package/video.mxf");
    }

    #[test]
    fn absolute_posix_path_used_verbatim() {
        let mut map = AssetLocatorMap::new();
        parse_asset_map(ASSET_MAP, "file:///package/ASSETMAP.xml", &mut map).unwrap();
        let uuid = crate::model::Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        assert_eq!(map.find(&uuid).unwrap().absolute_uri, "/abs/audio.mxf");
    }

    #[test]
    fn missing_asset_list_is_invalid_data() {
        let mut map = AssetLocatorMap::new();
        let xml = "<AssetMap></AssetMap>";
        assert!(parse_asset_map(xml, "file:///x/ASSETMAP.xml", &mut map).is_err());
    }

    #[test]
    fn multi_chunk_asset_keeps_first_chunk_only() {
        let xml = r#"<AssetMap><AssetList><Asset>
            <Id>urn:uuid:22222222-2222-2222-2222-222222222222</Id>
            <ChunkList><Chunk><Path>first.mxf</Path></Chunk><Chunk><Path>second.mxf</Path></Chunk></ChunkList>
        </Asset></AssetList></AssetMap>"#;
        let mut map = AssetLocatorMap::new();
        parse_asset_map(xml, "file:///p/ASSETMAP.xml", &mut map).unwrap();
        let uuid = crate::model::Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap();
        assert_eq!(map.find(&uuid).unwrap().absolute_uri, "file:///p/first.mxf");
    }

    #[test]
    fn windows_and_url_style_paths_classified_absolute() {
        assert!(is_windows_absolute(r"C:\media\video.mxf"));
        assert!(is_windows_absolute("C:/media/video.mxf"));
        assert!(is_windows_absolute(r"\\server\share\video.mxf"));
        assert!(is_url("https://example.com/video.mxf"));
        assert!(!is_windows_absolute("media/video.mxf"));
    }

    #[test]
    fn duplicate_uuid_across_two_asset_maps_keeps_first() {
        let mut map = AssetLocatorMap::new();
        parse_asset_map(ASSET_MAP, "file:///package/ASSETMAP.xml", &mut map).unwrap();

        let second = r#"<AssetMap><AssetList><Asset>
            <Id>urn:uuid:f81d4fae-7dec-11d0-a765-00a0c91e6bf6</Id>
            <ChunkList><Chunk><Path>other.mxf</Path></Chunk></ChunkList>
        </Asset></AssetList></AssetMap>"#;
        parse_asset_map(second, "file:///other/ASSETMAP.xml", &mut map).unwrap();

        let uuid = crate::model::Uuid::parse_str("f81d4fae-7dec-11d0-a765-00a0c91e6bf6").unwrap();
        assert_eq!(map.find(&uuid).unwrap().absolute_uri, "file:///package/video.mxf");
    }
}
