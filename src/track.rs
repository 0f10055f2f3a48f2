// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Virtual track playback state: an ordered sequence of resource handles
//! with a cumulative duration, a current timestamp, a current-resource
//! cursor, and a last-emitted PTS, exactly as `imfdec.c`'s
//! `IMFVirtualTrackPlaybackCtx` tracks one main image or main audio track.

use log::error;

use symphonia_core::codecs::CodecParameters;
use symphonia_core::probe::Probe;
use symphonia_core::units::TimeBase;

use crate::child::ChildDemuxer;
use crate::error::{invalid_data, stream_not_found, Result};
use crate::model::{AssetLocatorMap, EditUnits, Timestamp, TrackFileResource};
use crate::rational::Rational;
use crate::source::ResourceOpener;

/// One playback instance of a `TrackFileResource`. `repeat_count > 1`
/// expands a single CPL resource entry into this many handles, each sharing
/// the same underlying `TrackFileResource` data.
pub struct ResourcePlaybackHandle {
    resource: TrackFileResource,
    absolute_uri: String,
    child: Option<ChildDemuxer>,
}

impl ResourcePlaybackHandle {
    /// Opens this handle's child demuxer if it is not already open.
    ///
    /// Mirrors `imfdec.c`'s `if (track_resource->ctx->iformat) ... return 0`
    /// guard: re-entry when a child is already open is a no-op.
    pub fn ensure_open(&mut self, probe: &Probe, opener: &dyn ResourceOpener) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        let child = ChildDemuxer::open(
            probe,
            opener,
            &self.absolute_uri,
            self.resource.base.edit_rate,
            self.resource.base.entry_point,
        )?;

        self.child = Some(child);
        Ok(())
    }

    /// Closes this handle's child demuxer, if open. A no-op otherwise.
    pub fn close(&mut self) {
        self.child = None;
    }

    pub fn child_mut(&mut self) -> Option<&mut ChildDemuxer> {
        self.child.as_mut()
    }

    pub fn resource(&self) -> &TrackFileResource {
        &self.resource
    }
}

/// The outcome of locating the resource covering a track's current
/// timestamp.
pub enum ResourceSelection {
    /// The index, within `VirtualTrackPlaybackState::resources`, of the
    /// resource covering the current timestamp.
    Resource(usize),
    /// The track has reached its declared duration (within one edit unit);
    /// no further resources need to be opened.
    EndOfStream,
}

/// Runtime playback state for one main image or main audio virtual track.
pub struct VirtualTrackPlaybackState {
    /// The outer stream index this track publishes as (image first, then
    /// audio tracks in CPL order).
    pub index: u32,
    /// Codec parameters copied from the first resource's first child stream
    /// when the track was opened.
    pub codec_params: CodecParameters,
    /// The outer timebase, set to the first child's timebase.
    pub time_base: TimeBase,
    /// Total track duration in seconds, the exact sum of every expanded
    /// resource's `duration / edit_rate`.
    pub duration: Timestamp,
    /// The track's current playback position in seconds.
    pub current_timestamp: Timestamp,
    pub resources: Vec<ResourcePlaybackHandle>,
    pub current_resource_index: usize,
    /// The timestamp (in the outer timebase's ticks) of the next packet this
    /// track will emit.
    pub last_pts: u64,
}

impl VirtualTrackPlaybackState {
    /// Expands `resources` by `repeat_count`, resolves every
    /// `track_file_uuid` through `locator_map`, eagerly opens the first
    /// resource to publish stream parameters, and returns the constructed
    /// playback state.
    ///
    /// Per `spec.md` §9 Open Question (b), only the first resource is opened
    /// here; the rest open lazily on cursor transition.
    pub fn open(
        index: u32,
        resources: &[TrackFileResource],
        locator_map: &AssetLocatorMap,
        probe: &Probe,
        opener: &dyn ResourceOpener,
    ) -> Result<VirtualTrackPlaybackState> {
        if resources.is_empty() {
            error!("imf: virtual track {} has no resources", index);
            return invalid_data("imf: virtual track has no resources");
        }

        let mut handles = Vec::new();
        let mut duration = Timestamp::zero();

        for resource in resources {
            let locator = match locator_map.find(&resource.track_file_uuid) {
                Some(locator) => locator,
                None => {
                    error!(
                        "imf: no asset map entry for track file {}",
                        resource.track_file_uuid
                    );
                    return invalid_data("imf: track file uuid not found in asset map");
                }
            };

            let eu = resource.base.edit_rate.recip();
            let per_repeat = match eu.checked_mul_int(resource.base.duration as i64) {
                Some(per_repeat) => per_repeat,
                None => {
                    error!("imf: resource duration overflows when converted to seconds");
                    return invalid_data("imf: resource duration overflows");
                }
            };

            for _ in 0..resource.base.repeat_count.max(1) {
                duration = match duration.checked_add(&per_repeat) {
                    Some(duration) => duration,
                    None => {
                        error!("imf: track duration overflows");
                        return invalid_data("imf: track duration overflows");
                    }
                };

                handles.push(ResourcePlaybackHandle {
                    resource: resource.clone(),
                    absolute_uri: locator.absolute_uri.clone(),
                    child: None,
                });
            }
        }

        handles[0].ensure_open(probe, opener)?;

        let (codec_params, time_base) = {
            let child = handles[0].child_mut().expect("just opened");
            let track_id = child.track_id();
            let track = child
                .format()
                .tracks()
                .iter()
                .find(|track| track.id == track_id)
                .expect("child demuxer reports its own default track");

            let time_base = track.codec_params.time_base.unwrap_or_else(|| {
                let edit_rate = handles[0].resource.base.edit_rate;
                TimeBase::new(edit_rate.den() as u32, edit_rate.num() as u32)
            });

            (track.codec_params.clone(), time_base)
        };

        Ok(VirtualTrackPlaybackState {
            index,
            codec_params,
            time_base,
            duration,
            current_timestamp: Timestamp::zero(),
            resources: handles,
            current_resource_index: 0,
            last_pts: 0,
        })
    }

    /// Locates the resource covering `self.current_timestamp`, per
    /// `spec.md` §4.7's resource-selection algorithm.
    pub fn select_resource(&self) -> Result<ResourceSelection> {
        let eu = self.resources[0].resource.base.edit_rate.recip();

        let mut cumulated = Timestamp::zero();

        for (i, handle) in self.resources.iter().enumerate() {
            let contributed = match eu.checked_mul_int(handle.resource.base.duration as i64) {
                Some(contributed) => contributed,
                None => {
                    error!("imf: resource duration overflows during selection");
                    return stream_not_found("imf: resource duration overflows");
                }
            };

            cumulated = match cumulated.checked_add(&contributed) {
                Some(cumulated) => cumulated,
                None => return stream_not_found("imf: cumulative duration overflows"),
            };

            let probe_end = match self.current_timestamp.checked_add(&eu) {
                Some(probe_end) => probe_end,
                None => return stream_not_found("imf: current timestamp overflows"),
            };

            if probe_end <= cumulated {
                return Ok(ResourceSelection::Resource(i));
            }
        }

        let remaining = match self.duration.checked_sub(&self.current_timestamp) {
            Some(remaining) => remaining,
            None => return stream_not_found("imf: remaining duration underflows"),
        };

        if remaining < eu {
            Ok(ResourceSelection::EndOfStream)
        }
        else {
            stream_not_found("imf: no resource covers the current timestamp")
        }
    }

    /// If the covering resource differs from `current_resource_index`,
    /// closes the old resource's child and opens the new one.
    pub fn cross_boundary(
        &mut self,
        target: usize,
        probe: &Probe,
        opener: &dyn ResourceOpener,
    ) -> Result<()> {
        if target != self.current_resource_index {
            self.resources[self.current_resource_index].close();
            self.current_resource_index = target;
        }

        self.resources[target].ensure_open(probe, opener)
    }

    /// Advances `current_timestamp` and `last_pts` by one packet's
    /// duration, expressed in the outer timebase.
    pub fn advance(&mut self, packet_duration: EditUnits) -> Result<()> {
        let tb = Rational::new(self.time_base.numer as i64, self.time_base.denom as i64);
        let advance_secs = match tb.checked_mul_int(packet_duration as i64) {
            Some(advance_secs) => advance_secs,
            None => {
                error!("imf: packet duration overflows when converted to seconds");
                return invalid_data("imf: packet duration overflows");
            }
        };

        self.current_timestamp = match self.current_timestamp.checked_add(&advance_secs) {
            Some(ts) => ts,
            None => return invalid_data("imf: current timestamp overflows"),
        };

        self.last_pts = self.last_pts.saturating_add(packet_duration);

        Ok(())
    }

    /// Closes every open child demuxer, in declaration order.
    pub fn close_all(&mut self) {
        for handle in &mut self.resources {
            handle.close();
        }
    }
}
