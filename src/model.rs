// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The IMF Composition Playlist data model: the parsed, owned representation
//! of a CPL and its Asset Map, independent of the XML documents they were
//! read from.

use crate::rational::Rational;

/// A 16-byte UUID, as referenced by `Id`, `TrackId`, and `TrackFileId`
/// elements throughout a CPL and Asset Map.
pub type Uuid = uuid::Uuid;

/// A count of edit units: an integer tick on a resource's `EditRate` clock.
pub type EditUnits = u64;

/// A resource or track-level point in time, expressed in seconds as an
/// exact rational rather than a float.
pub type Timestamp = Rational;

/// Fields common to every kind of CPL resource, taken from `BaseResourceType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseResource {
    /// The resource's native tick rate (`BaseResourceType/EditRate`).
    pub edit_rate: Rational,
    /// `BaseResourceType/EntryPoint`, defaults to 0.
    pub entry_point: EditUnits,
    /// `BaseResourceType/SourceDuration`, always > 0.
    pub duration: EditUnits,
    /// `BaseResourceType/RepeatCount`, always >= 1.
    pub repeat_count: EditUnits,
}

/// A resource whose essence is sourced from a referenced track file
/// (`TrackFileResourceType`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFileResource {
    pub base: BaseResource,
    /// `TrackFileResourceType/TrackFileId`, resolved via the Asset Map.
    pub track_file_uuid: Uuid,
}

/// A single `Marker` element: a labelled point inside a `MarkerResource`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    pub label: String,
    pub scope: Option<String>,
    pub offset: EditUnits,
}

/// A resource of a `MarkerSequence`, carrying zero or more `Marker`s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerResource {
    pub base: BaseResource,
    pub markers: Vec<Marker>,
}

/// A time-ordered sequence of resources representing one logical stream of
/// the composed program.
#[derive(Clone, Debug)]
pub enum VirtualTrack {
    /// A main image or main audio virtual track.
    TrackFile { id: Uuid, resources: Vec<TrackFileResource> },
    /// A marker virtual track: parsed for structural validity only, never
    /// fed to the packet pump.
    Marker { id: Uuid, resources: Vec<MarkerResource> },
}

impl VirtualTrack {
    /// The `TrackId` this virtual track was declared under.
    pub fn id(&self) -> Uuid {
        match self {
            VirtualTrack::TrackFile { id, .. } => *id,
            VirtualTrack::Marker { id, .. } => *id,
        }
    }
}

/// The parsed Composition Playlist: everything the composition engine needs
/// to assemble the program, independent of the XML DOM it was read from.
#[derive(Clone, Debug)]
pub struct Cpl {
    pub id: Uuid,
    pub content_title: String,
    pub edit_rate: Rational,
    pub main_markers: Option<VirtualTrack>,
    pub main_image_2d: Option<VirtualTrack>,
    pub main_audio: Vec<VirtualTrack>,
}

/// One `Asset` entry of an Asset Map, resolved to an absolute URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetLocator {
    pub uuid: Uuid,
    pub absolute_uri: String,
}

/// The combined UUID -> URI table built from every Asset Map the caller
/// supplied (or the default `ASSETMAP.xml` next to the CPL).
#[derive(Clone, Debug, Default)]
pub struct AssetLocatorMap(Vec<AssetLocator>);

impl AssetLocatorMap {
    pub fn new() -> Self {
        AssetLocatorMap(Vec::new())
    }

    /// Appends a locator unless its UUID is already present, in which case
    /// the existing entry wins. Asset Maps are combined in declaration
    /// order, so callers should push in that order.
    pub fn push_first_wins(&mut self, locator: AssetLocator) {
        if !self.0.iter().any(|existing| existing.uuid == locator.uuid) {
            self.0.push(locator);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Linear lookup by UUID (N is small in practice).
    pub fn find(&self, uuid: &Uuid) -> Option<&AssetLocator> {
        self.0.iter().find(|locator| &locator.uuid == uuid)
    }
}
