//! Test fixtures: representative JSON payloads from the rainfall API.
//!
//! Response shape of `GET /public/current/{province}.json`:
//!   [ {
//!       station: { uuid, name, address? },
//!       sumDepth   - cumulative depth (mm) since the start of the rain day
//!       level      - display label, e.g. "Mưa vừa" (optional)
//!       color      - display colour for the level (optional)
//!   }, ... ]
//!
//! Extra fields the service does not read (`depth`, `lastUpdated`) are
//! included so the parser is exercised against the real envelope.

/// Three well-formed stations.
#[cfg(test)]
pub(crate) fn fixture_three_stations_json() -> &'static str {
    r##"[
      {
        "station": { "uuid": "st-001", "name": "Trạm Hòa Bình", "address": "TP. Hòa Bình" },
        "sumDepth": 12.4,
        "depth": 0.8,
        "level": "Mưa vừa",
        "color": "#2e86de",
        "lastUpdated": "2024-06-10 09:45:00"
      },
      {
        "station": { "uuid": "st-002", "name": "Trạm Mai Châu" },
        "sumDepth": 0,
        "level": "Không mưa",
        "color": "#cccccc"
      },
      {
        "station": { "uuid": "st-003", "name": "Trạm Lạc Sơn", "address": "Lạc Sơn" },
        "sumDepth": 31.7,
        "level": "Mưa to",
        "color": "#e74c3c"
      }
    ]"##
}

/// Records with missing pieces: no station name, no depth, no uuid, and a
/// null station object.
#[cfg(test)]
pub(crate) fn fixture_sparse_records_json() -> &'static str {
    r#"[
      { "station": { "uuid": "st-010" }, "sumDepth": 4.2 },
      { "station": { "uuid": "st-011", "name": "Trạm Kim Bôi" } },
      { "station": { "name": "Trạm không mã" }, "sumDepth": 9.9 },
      { "station": null, "sumDepth": 1.0 }
    ]"#
}

/// One element's station is a bare string instead of an object; the others
/// are fine.
#[cfg(test)]
pub(crate) fn fixture_one_malformed_element_json() -> &'static str {
    r#"[
      { "station": { "uuid": "st-020", "name": "Trạm Tân Lạc" }, "sumDepth": 2.5 },
      { "station": "st-021", "sumDepth": 3.0 },
      { "station": { "uuid": "st-022", "name": "Trạm Yên Thủy" }, "sumDepth": 7.0, "level": 2 }
    ]"#
}

/// Depths delivered as text, as garbage, as a boolean, and a numeric uuid.
#[cfg(test)]
pub(crate) fn fixture_string_depths_json() -> &'static str {
    r#"[
      { "station": { "uuid": "st-030", "name": "Trạm Lương Sơn" }, "sumDepth": "5.2" },
      { "station": { "uuid": "st-031", "name": "Trạm Kỳ Sơn" }, "sumDepth": "n/a" },
      { "station": { "uuid": "st-032", "name": "Trạm Cao Phong" }, "sumDepth": true },
      { "station": { "uuid": 4417, "name": "Trạm Tân Lạc 2" }, "sumDepth": " 1.5 " }
    ]"#
}
