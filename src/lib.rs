// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Symphonia crates. Please see clippy.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

//! SMPTE IMF (Interoperable Master Format, ST 2067) package demuxer.
//!
//! An IMF package has no single bitstream: a Composition Playlist (CPL)
//! references "virtual tracks" made of one or more track-file resources,
//! each resolved through an Asset Map to an actual MXF (or other container)
//! file elsewhere in the package. [`ImfReader`] does not decode any essence
//! itself; it orchestrates a pool of child [`FormatReader`](symphonia_core::formats::FormatReader)s,
//! one per currently-open resource, and composes their packets into a single
//! monotonic stream per virtual track.
//!
//! Because opening a CPL requires resolving sibling documents (the Asset
//! Map) and cannot proceed from a bare byte stream, `ImfReader` is not
//! constructed through the usual [`Probe`](symphonia_core::probe::Probe)
//! `try_new` path; open a package with [`ImfReader::open`] instead.

mod assetmap;
mod child;
mod cpl;
mod error;
mod model;
mod rational;
mod source;
mod track;
mod xml;

mod demuxer;

pub use demuxer::{ImfReader, ImfReaderOptions};
pub use model::{AssetLocator, AssetLocatorMap, Cpl, Marker, VirtualTrack};
pub use rational::Rational;
pub use source::{FileResourceOpener, ResourceOpener};
