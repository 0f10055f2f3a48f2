// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lazily opens a child [`FormatReader`] for one resource's track file, the
//! way `imfdec.c`'s `open_track_resource_context` opens a fresh
//! `AVFormatContext` for each `IMFTrackFileResource`.
//!
//! A [`ChildDemuxer`] is never reopened once created: callers encode
//! `imfdec.c`'s `if (track_resource->ctx->iformat) ... return 0` guard in
//! the type system by holding it behind `Option<ChildDemuxer>`, populating it
//! once per open cycle.

use log::warn;

use symphonia_core::errors::Result;
use symphonia_core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia_core::io::MediaSourceStream;
use symphonia_core::meta::MetadataOptions;
use symphonia_core::probe::{Hint, Probe};
use symphonia_core::units::Time;

use crate::model::EditUnits;
use crate::rational::Rational;
use crate::source::ResourceOpener;

/// A child container opened on one resource's track file.
///
/// Holds the underlying `FormatReader` plus the track index within it that
/// this resource's content actually comes from (always the default track:
/// IMF track files are single-essence by construction).
pub struct ChildDemuxer {
    format: Box<dyn FormatReader>,
    track_id: u32,
}

impl ChildDemuxer {
    /// Opens `absolute_uri` through `opener`, probes it with `probe`, and
    /// seeks to `entry_point` (in the resource's `edit_rate` units) if it is
    /// non-zero.
    ///
    /// Mirrors `open_track_resource_context`: open, then
    /// `av_seek_frame(ctx, -1, entry_point_ts, AVSEEK_FLAG_ANY)` only when
    /// `entry_point != 0`. A seek failure closes the child and propagates the
    /// error; the caller never retains a half-seeked demuxer.
    pub fn open(
        probe: &Probe,
        opener: &dyn ResourceOpener,
        absolute_uri: &str,
        edit_rate: Rational,
        entry_point: EditUnits,
    ) -> Result<ChildDemuxer> {
        let source = opener.open(absolute_uri)?;
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension_of(absolute_uri) {
            hint.with_extension(extension);
        }

        let format_opts = FormatOptions::default();
        let metadata_opts = MetadataOptions::default();

        let probed = probe.format(&hint, mss, &format_opts, &metadata_opts)?;
        let mut format = probed.format;

        let track_id = match format.default_track() {
            Some(track) => track.id,
            None => return Err(symphonia_core::errors::Error::DecodeError(
                "imf: child demuxer has no tracks",
            )),
        };

        if let Some(track) = format.default_track() {
            if let Some(time_base) = track.codec_params.time_base {
                if time_base.numer != edit_rate.den() as u32
                    || time_base.denom != edit_rate.num() as u32
                {
                    warn!(
                        "imf: child demuxer time base {}/{} does not match resource edit rate {}",
                        time_base.numer, time_base.denom, edit_rate
                    );
                }
            }
        }

        if entry_point != 0 {
            let seconds = edit_rate
                .recip()
                .checked_mul_int(entry_point as i64)
                .ok_or(symphonia_core::errors::Error::DecodeError(
                    "imf: entry point overflows when converted to seconds",
                ))?;
            let time = Time::from(seconds.to_f64());

            let seek_to = SeekTo::Time { time, track_id: Some(track_id) };

            format.seek(SeekMode::Accurate, seek_to)?;
        }

        Ok(ChildDemuxer { format, track_id })
    }

    /// The track within the child container this resource's content is read
    /// from.
    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn format(&mut self) -> &mut dyn FormatReader {
        self.format.as_mut()
    }

    pub fn into_inner(self) -> Box<dyn FormatReader> {
        self.format
    }
}

/// Extracts a bare file extension from a URI, ignoring any query string or
/// fragment, for use as a probe [`Hint`].
fn extension_of(uri: &str) -> Option<&str> {
    let without_fragment = uri.split(['?', '#']).next().unwrap_or(uri);
    let file_name = without_fragment.rsplit('/').next().unwrap_or(without_fragment);
    let dot = file_name.rfind('.')?;
    if dot + 1 >= file_name.len() {
        None
    }
    else {
        Some(&file_name[dot + 1..])
    }
}
