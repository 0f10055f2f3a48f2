// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The URL/IO abstraction spec.md places out of scope as an external
//! collaborator. [`ResourceOpener`] is the seam an embedder implements to
//! open a CPL, an Asset Map, or a referenced track file from whatever
//! storage backs an absolute URI; [`FileResourceOpener`] is the bundled
//! default for local paths and `file://` URIs, mirroring how
//! `symphonia_core::io` treats `std::fs::File` as the baseline
//! `MediaSource`.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia_core::io::MediaSource;

use crate::error::Result;

/// Opens a byte stream for an absolute URI.
///
/// This is the crate's stand-in for the IO abstraction spec.md §1 places out
/// of scope: it does not itself resolve relative paths (that is
/// [`crate::assetmap`]'s job) or retry on failure. One `ResourceOpener` is
/// shared, by reference, across the CPL, every Asset Map, and every child
/// demuxer this crate opens.
pub trait ResourceOpener: Send + Sync {
    /// Opens `absolute_uri` for reading. Implementations should return an
    /// `IoError` (via the `?` operator on a `std::io::Error`) on failure
    /// rather than panicking.
    fn open(&self, absolute_uri: &str) -> Result<Box<dyn MediaSource>>;
}

/// The bundled default [`ResourceOpener`]: resolves `file://` URIs and bare
/// local paths (relative or absolute) via `std::fs::File`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileResourceOpener;

impl ResourceOpener for FileResourceOpener {
    fn open(&self, absolute_uri: &str) -> Result<Box<dyn MediaSource>> {
        let path = uri_to_path(absolute_uri);
        let file = File::open(&path)?;
        Ok(Box::new(file))
    }
}

/// Strips a `file://` scheme if present; otherwise treats the URI as a bare
/// filesystem path, which is how Asset Map `Path` entries that are not URLs
/// (per `imf_uri_is_url`) are written in practice.
fn uri_to_path(uri: &str) -> PathBuf {
    match uri.strip_prefix("file://") {
        Some(rest) => Path::new(rest).to_path_buf(),
        None => Path::new(uri).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_scheme_is_stripped() {
        assert_eq!(uri_to_path("file:///a/b.xml"), PathBuf::from("/a/b.xml"));
    }

    #[test]
    fn bare_path_is_used_verbatim() {
        assert_eq!(uri_to_path("/a/b.xml"), PathBuf::from("/a/b.xml"));
        assert_eq!(uri_to_path("relative/b.xml"), PathBuf::from("relative/b.xml"));
    }
}
