// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Maps this crate's error taxonomy onto `symphonia_core::errors::Error`.
//!
//! There is no dedicated "stream not found" error kind upstream;
//! `Unsupported` is reserved for unsupported container/codec *features*, so
//! the internal-inconsistency case (cursor inside the declared duration but
//! no resource covers it) goes through `Error::Other` instead, same as
//! `imfdec.c` returning `AVERROR_STREAM_NOT_FOUND` for the analogous case.

use symphonia_core::errors::Error;

pub use symphonia_core::errors::{decode_error, end_of_stream_error, unsupported_error, Result};

/// A CPL/AssetMap structural or semantic violation: missing required
/// children, unparseable scalars, a referenced UUID with no Asset Map
/// entry.
pub fn invalid_data<T>(msg: &'static str) -> Result<T> {
    decode_error(msg)
}

/// Internal inconsistency: the engine's own invariants (a cursor inside a
/// track's declared duration must always have a covering resource) failed
/// to hold, indicating a CPL that escaped validation.
pub fn stream_not_found<T>(msg: &'static str) -> Result<T> {
    Err(Error::Other(msg))
}
