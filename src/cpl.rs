// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composition Playlist (ST 2067-3) parsing: walks the CPL DOM into the
//! owned [`Cpl`](crate::model::Cpl) model.

use log::{error, warn};
use roxmltree::{Document, Node};

use crate::error::{invalid_data, Result};
use crate::model::{BaseResource, Cpl, Marker, MarkerResource, TrackFileResource, VirtualTrack};
use crate::xml::{child_text, first_child_by_name, read_rational, read_uint, read_uuid};

/// Parses a `CompositionPlaylist` document into a [`Cpl`].
pub fn parse_cpl(xml: &str) -> Result<Cpl> {
    let doc = Document::parse(xml).map_err(|parse_err| {
        error!("imf: failed to parse CPL: {}", parse_err);
    });
    let doc = match doc {
        Ok(doc) => doc,
        Err(()) => return invalid_data("imf: CPL is not well-formed XML"),
    };

    let root = doc.root_element();
    if root.tag_name().name() != "CompositionPlaylist" {
        error!("imf: CPL root element is not CompositionPlaylist");
        return invalid_data("imf: CPL root element is not CompositionPlaylist");
    }

    let id = read_uuid(root, "Id")?;
    let content_title = child_text(root, "ContentTitle").unwrap_or_default().to_string();
    let edit_rate = read_rational(root, "EditRate")?;

    let mut cpl = Cpl {
        id,
        content_title,
        edit_rate,
        main_markers: None,
        main_image_2d: None,
        main_audio: Vec::new(),
    };

    let segment_list = match first_child_by_name(root, "SegmentList") {
        Some(node) => node,
        None => {
            error!("imf: CPL {} is missing SegmentList", id);
            return invalid_data("imf: CPL is missing SegmentList");
        }
    };

    for segment in segment_list.children().filter(|n| n.is_element() && n.tag_name().name() == "Segment")
    {
        let sequence_list = match first_child_by_name(segment, "SequenceList") {
            Some(node) => node,
            None => continue,
        };

        for sequence in sequence_list.children().filter(|n| n.is_element()) {
            match sequence.tag_name().name() {
                "MainImageSequence" => {
                    let vt = parse_track_file_sequence(sequence)?;
                    merge_main_image(&mut cpl, vt)?;
                }
                "MainAudioSequence" => {
                    let vt = parse_track_file_sequence(sequence)?;
                    merge_main_audio(&mut cpl, vt);
                }
                "MarkerSequence" => {
                    let vt = parse_marker_sequence(sequence)?;
                    merge_main_markers(&mut cpl, vt);
                }
                other => {
                    warn!("imf: ignoring unknown sequence kind <{}>", other);
                }
            }
        }
    }

    Ok(cpl)
}

/// Reads `TrackId` and the list of track-file resources under
/// `ResourceList` for a `MainImageSequence`/`MainAudioSequence`.
fn parse_track_file_sequence(sequence: Node<'_, '_>) -> Result<VirtualTrack> {
    let track_id = read_uuid(sequence, "TrackId")?;

    let resource_list = match first_child_by_name(sequence, "ResourceList") {
        Some(node) => node,
        None => {
            error!("imf: sequence for track {} is missing ResourceList", track_id);
            return invalid_data("imf: sequence is missing ResourceList");
        }
    };

    let mut resources = Vec::new();
    for resource in resource_list.children().filter(|n| n.is_element()) {
        let base = parse_base_resource(resource)?;
        let track_file_uuid = read_uuid(resource, "TrackFileId")?;
        resources.push(TrackFileResource { base, track_file_uuid });
    }

    Ok(VirtualTrack::TrackFile { id: track_id, resources })
}

/// Reads `TrackId` and the list of marker resources under `ResourceList`
/// for a `MarkerSequence`.
fn parse_marker_sequence(sequence: Node<'_, '_>) -> Result<VirtualTrack> {
    let track_id = read_uuid(sequence, "TrackId")?;

    let resource_list = match first_child_by_name(sequence, "ResourceList") {
        Some(node) => node,
        None => {
            error!("imf: marker sequence for track {} is missing ResourceList", track_id);
            return invalid_data("imf: marker sequence is missing ResourceList");
        }
    };

    let mut resources = Vec::new();
    for resource in resource_list.children().filter(|n| n.is_element()) {
        let base = parse_base_resource(resource)?;

        let marker_list = match first_child_by_name(resource, "MarkerList") {
            Some(node) => node,
            None => {
                error!("imf: marker resource for track {} has no MarkerList", track_id);
                return invalid_data("imf: marker resource has no MarkerList");
            }
        };

        let mut markers = Vec::new();
        for marker_node in marker_list.children().filter(|n| n.is_element() && n.tag_name().name() == "Marker")
        {
            let label_node = first_child_by_name(marker_node, "Label");
            let label = label_node.and_then(|n| n.text()).unwrap_or_default().trim().to_string();
            let scope = label_node.and_then(|n| n.attribute("scope")).map(str::to_string);
            let offset = read_uint(marker_node, "Offset")?;
            markers.push(Marker { label, scope, offset });
        }

        resources.push(MarkerResource { base, markers });
    }

    Ok(VirtualTrack::Marker { id: track_id, resources })
}

/// Reads the fields common to every resource kind: `EditRate`,
/// `IntrinsicDuration`, optional `EntryPoint`/`SourceDuration`/`RepeatCount`,
/// validating every cross-field constraint spec.md §4.2 lists.
fn parse_base_resource(resource: Node<'_, '_>) -> Result<BaseResource> {
    let edit_rate = read_rational(resource, "EditRate")?;
    let intrinsic_duration = read_uint(resource, "IntrinsicDuration")?;
    let entry_point = optional_uint(resource, "EntryPoint")?.unwrap_or(0);
    let default_source_duration = intrinsic_duration.saturating_sub(entry_point);
    let source_duration = optional_uint(resource, "SourceDuration")?.unwrap_or(default_source_duration);
    let repeat_count = optional_uint(resource, "RepeatCount")?.unwrap_or(1);

    if source_duration == 0 {
        error!("imf: resource has zero SourceDuration");
        return invalid_data("imf: resource SourceDuration must be greater than zero");
    }
    if entry_point.checked_add(source_duration).map(|end| end > intrinsic_duration).unwrap_or(true) {
        error!(
            "imf: resource EntryPoint ({}) + SourceDuration ({}) exceeds IntrinsicDuration ({})",
            entry_point, source_duration, intrinsic_duration
        );
        return invalid_data("imf: resource EntryPoint + SourceDuration exceeds IntrinsicDuration");
    }
    if repeat_count < 1 {
        error!("imf: resource has RepeatCount 0");
        return invalid_data("imf: resource RepeatCount must be at least 1");
    }

    Ok(BaseResource { edit_rate, entry_point, duration: source_duration, repeat_count })
}

/// Reads an optional unsigned integer child element: `Ok(None)` if absent,
/// propagating the same parse errors as [`read_uint`] if present but
/// malformed.
fn optional_uint(parent: Node<'_, '_>, name: &str) -> Result<Option<u64>> {
    if first_child_by_name(parent, name).is_some() {
        Ok(Some(read_uint(parent, name)?))
    }
    else {
        Ok(None)
    }
}

fn track_file_resources_mut(vt: &mut VirtualTrack) -> &mut Vec<TrackFileResource> {
    match vt {
        VirtualTrack::TrackFile { resources, .. } => resources,
        VirtualTrack::Marker { .. } => unreachable!("only called on TrackFile virtual tracks"),
    }
}

/// Installs or merges a parsed `MainImageSequence` into `cpl.main_image_2d`.
/// The first occurrence of a `TrackId` wins; a second sequence with the same
/// `TrackId` has its resources appended; a differing `TrackId` is
/// *InvalidData* (only a single main image track is supported).
fn merge_main_image(cpl: &mut Cpl, parsed: VirtualTrack) -> Result<()> {
    match &mut cpl.main_image_2d {
        None => {
            cpl.main_image_2d = Some(parsed);
        }
        Some(existing) => {
            if existing.id() != parsed.id() {
                error!(
                    "imf: CPL declares a second MainImageSequence with a different TrackId ({} vs {})",
                    existing.id(),
                    parsed.id()
                );
                return invalid_data("imf: CPL declares more than one main image TrackId");
            }
            track_file_resources_mut(existing).extend(track_file_resources_into(parsed));
        }
    }
    Ok(())
}

/// Appends a parsed `MainAudioSequence` to `cpl.main_audio`, merging into an
/// existing entry that shares its `TrackId`.
fn merge_main_audio(cpl: &mut Cpl, parsed: VirtualTrack) {
    if let Some(existing) = cpl.main_audio.iter_mut().find(|vt| vt.id() == parsed.id()) {
        track_file_resources_mut(existing).extend(track_file_resources_into(parsed));
    }
    else {
        cpl.main_audio.push(parsed);
    }
}

/// Installs or merges a parsed `MarkerSequence` into `cpl.main_markers`.
/// The first `TrackId` wins; later sequences that share it merge their
/// resources; a differing `TrackId` is logged and ignored, since the CPL
/// model supports only a single main markers track.
fn merge_main_markers(cpl: &mut Cpl, parsed: VirtualTrack) {
    match &mut cpl.main_markers {
        None => cpl.main_markers = Some(parsed),
        Some(VirtualTrack::Marker { id, resources }) => {
            if *id == parsed.id() {
                if let VirtualTrack::Marker { resources: parsed_resources, .. } = parsed {
                    resources.extend(parsed_resources);
                }
            }
            else {
                warn!(
                    "imf: ignoring MarkerSequence with TrackId {} distinct from the installed main markers track {}",
                    parsed.id(),
                    id
                );
            }
        }
        Some(VirtualTrack::TrackFile { .. }) => unreachable!("main_markers only ever holds Marker"),
    }
}

fn track_file_resources_into(vt: VirtualTrack) -> Vec<TrackFileResource> {
    match vt {
        VirtualTrack::TrackFile { resources, .. } => resources,
        VirtualTrack::Marker { .. } => unreachable!("only called on TrackFile virtual tracks"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpl_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<CompositionPlaylist xmlns="http://www.smpte-ra.org/schemas/2067-3/2016">
  <Id>urn:uuid:f81d4fae-7dec-11d0-a765-00a0c91e6bf6</Id>
  <ContentTitle>Example</ContentTitle>
  <EditRate>24 1</EditRate>
  <SegmentList>
    <Segment>
      <SequenceList>
        {body}
      </SequenceList>
    </Segment>
  </SegmentList>
</CompositionPlaylist>"#
        )
    }

    fn resource_xml(track_file_id: &str, entry_point: Option<u64>, duration: u64, repeat: Option<u64>) -> String {
        let entry = entry_point.map(|e| format!("<EntryPoint>{}</EntryPoint>", e)).unwrap_or_default();
        let repeat_elem = repeat.map(|r| format!("<RepeatCount>{}</RepeatCount>", r)).unwrap_or_default();
        format!(
            r#"<Resource>
                <EditRate>24 1</EditRate>
                <IntrinsicDuration>48</IntrinsicDuration>
                {entry}
                <SourceDuration>{duration}</SourceDuration>
                {repeat_elem}
                <TrackFileId>urn:uuid:{track_file_id}</TrackFileId>
            </Resource>"#
        )
    }

    #[test]
    fn parses_minimal_image_track() {
        let body = format!(
            r#"<MainImageSequence>
                <TrackId>urn:uuid:11111111-1111-1111-1111-111111111111</TrackId>
                <ResourceList>{}</ResourceList>
            </MainImageSequence>"#,
            resource_xml("22222222-2222-2222-2222-222222222222", None, 48, None)
        );
        let cpl = parse_cpl(&cpl_xml(&body)).unwrap();
        assert_eq!(cpl.content_title, "Example");
        assert_eq!(cpl.edit_rate.num(), 24);
        let image = cpl.main_image_2d.expect("image track");
        match image {
            VirtualTrack::TrackFile { resources, .. } => {
                assert_eq!(resources.len(), 1);
                assert_eq!(resources[0].base.duration, 48);
                assert_eq!(resources[0].base.repeat_count, 1);
            }
            _ => panic!("expected TrackFile variant"),
        }
    }

    #[test]
    fn second_main_image_sequence_with_same_track_id_merges_resources() {
        let res_a = resource_xml("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", None, 48, None);
        let res_b = resource_xml("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb", None, 48, None);
        let body = format!(
            r#"<MainImageSequence>
                <TrackId>urn:uuid:11111111-1111-1111-1111-111111111111</TrackId>
                <ResourceList>{res_a}</ResourceList>
            </MainImageSequence>
            <MainImageSequence>
                <TrackId>urn:uuid:11111111-1111-1111-1111-111111111111</TrackId>
                <ResourceList>{res_b}</ResourceList>
            </MainImageSequence>"#
        );
        let cpl = parse_cpl(&cpl_xml(&body)).unwrap();
        match cpl.main_image_2d.unwrap() {
            VirtualTrack::TrackFile { resources, .. } => assert_eq!(resources.len(), 2),
            _ => panic!("expected TrackFile variant"),
        }
    }

    #[test]
    fn second_main_image_sequence_with_different_track_id_is_invalid() {
        let res_a = resource_xml("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", None, 48, None);
        let res_b = resource_xml("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb", None, 48, None);
        let body = format!(
            r#"<MainImageSequence>
                <TrackId>urn:uuid:11111111-1111-1111-1111-111111111111</TrackId>
                <ResourceList>{res_a}</ResourceList>
            </MainImageSequence>
            <MainImageSequence>
                <TrackId>urn:uuid:22222222-2222-2222-2222-222222222222</TrackId>
                <ResourceList>{res_b}</ResourceList>
            </MainImageSequence>"#
        );
        assert!(parse_cpl(&cpl_xml(&body)).is_err());
    }

    #[test]
    fn two_main_audio_sequences_with_distinct_track_ids_both_kept() {
        let res_a = resource_xml("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", None, 48, None);
        let res_b = resource_xml("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb", None, 48, None);
        let body = format!(
            r#"<MainAudioSequence>
                <TrackId>urn:uuid:11111111-1111-1111-1111-111111111111</TrackId>
                <ResourceList>{res_a}</ResourceList>
            </MainAudioSequence>
            <MainAudioSequence>
                <TrackId>urn:uuid:22222222-2222-2222-2222-222222222222</TrackId>
                <ResourceList>{res_b}</ResourceList>
            </MainAudioSequence>"#
        );
        let cpl = parse_cpl(&cpl_xml(&body)).unwrap();
        assert_eq!(cpl.main_audio.len(), 2);
    }

    #[test]
    fn entry_point_plus_source_duration_exceeding_intrinsic_is_invalid() {
        let resource = r#"<Resource>
            <EditRate>24 1</EditRate>
            <IntrinsicDuration>48</IntrinsicDuration>
            <EntryPoint>40</EntryPoint>
            <SourceDuration>20</SourceDuration>
            <TrackFileId>urn:uuid:aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa</TrackFileId>
        </Resource>"#;
        let body = format!(
            r#"<MainImageSequence>
                <TrackId>urn:uuid:11111111-1111-1111-1111-111111111111</TrackId>
                <ResourceList>{resource}</ResourceList>
            </MainImageSequence>"#
        );
        assert!(parse_cpl(&cpl_xml(&body)).is_err());
    }

    #[test]
    fn zero_repeat_count_is_invalid() {
        let resource = resource_xml("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa", None, 48, Some(0));
        let body = format!(
            r#"<MainImageSequence>
                <TrackId>urn:uuid:11111111-1111-1111-1111-111111111111</TrackId>
                <ResourceList>{resource}</ResourceList>
            </MainImageSequence>"#
        );
        assert!(parse_cpl(&cpl_xml(&body)).is_err());
    }

    #[test]
    fn marker_sequence_parses_label_scope_and_offset() {
        let body = r#"<MarkerSequence>
            <TrackId>urn:uuid:33333333-3333-3333-3333-333333333333</TrackId>
            <ResourceList>
                <Resource>
                    <EditRate>24 1</EditRate>
                    <IntrinsicDuration>48</IntrinsicDuration>
                    <SourceDuration>48</SourceDuration>
                    <MarkerList>
                        <Marker>
                            <Label scope="http://example.com">FFEC</Label>
                            <Offset>12</Offset>
                        </Marker>
                    </MarkerList>
                </Resource>
            </ResourceList>
        </MarkerSequence>"#;
        let cpl = parse_cpl(&cpl_xml(body)).unwrap();
        match cpl.main_markers.unwrap() {
            VirtualTrack::Marker { resources, .. } => {
                assert_eq!(resources.len(), 1);
                assert_eq!(resources[0].markers.len(), 1);
                assert_eq!(resources[0].markers[0].label, "FFEC");
                assert_eq!(resources[0].markers[0].scope.as_deref(), Some("http://example.com"));
                assert_eq!(resources[0].markers[0].offset, 12);
            }
            _ => panic!("expected Marker variant"),
        }
    }

    #[test]
    fn unknown_sequence_kind_is_ignored() {
        let body = r#"<SubtitleSequence>
            <TrackId>urn:uuid:44444444-4444-4444-4444-444444444444</TrackId>
        </SubtitleSequence>"#;
        let cpl = parse_cpl(&cpl_xml(body)).unwrap();
        assert!(cpl.main_image_2d.is_none());
        assert!(cpl.main_audio.is_empty());
    }
}
