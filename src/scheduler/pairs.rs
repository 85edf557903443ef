use crate::types::{parse_subgroup, Stream, StreamId};
use std::collections::HashMap;

/// Pairing info for one half of a subgroup pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairInfo {
    pub partner: StreamId,
    /// Same instructor teaches both subgroups; the pair must be placed at
    /// day boundaries so the idle subgroup can arrive late or leave early
    pub critical: bool,
}

/// stream id -> its pairing, for both members of every pair
pub type PairTable = HashMap<StreamId, PairInfo>;

/// Identify subgroup pairs among a stage's candidate streams.
///
/// Explicit `paired_stream_id` links from the parser win; otherwise two
/// streams pair when they share subject, stream type and base groups and
/// both carry subgroup markers (explicit notation or the implicit-subgroup
/// flag).
pub fn build_subgroup_pairs(streams: &[&Stream]) -> PairTable {
    let mut table = PairTable::new();
    let by_id: HashMap<&StreamId, &Stream> = streams.iter().map(|s| (&s.id, *s)).collect();

    // Explicit links from the parser
    for stream in streams {
        if let Some(partner_id) = &stream.paired_stream_id {
            if let Some(partner) = by_id.get(partner_id) {
                let critical = stream.instructor_id() == partner.instructor_id();
                table.insert(
                    stream.id.clone(),
                    PairInfo {
                        partner: partner.id.clone(),
                        critical,
                    },
                );
                table.insert(
                    partner.id.clone(),
                    PairInfo {
                        partner: stream.id.clone(),
                        critical,
                    },
                );
            }
        }
    }

    // Derived links: same subject + type + base groups, both subgroup-ish
    let mut buckets: HashMap<(String, &'static str, Vec<String>), Vec<&Stream>> =
        HashMap::new();
    for stream in streams {
        if table.contains_key(&stream.id) || !stream.is_any_subgroup() {
            continue;
        }
        let key = (
            stream.subject.clone(),
            stream.stream_type.as_str(),
            stream.base_groups(),
        );
        buckets.entry(key).or_default().push(stream);
    }

    for members in buckets.values() {
        let [a, b] = members.as_slice() else {
            continue;
        };
        // Explicitly-notated subgroups must carry distinct markers;
        // implicit splits pair by the bucket key alone
        let a_marker = a.groups.iter().find_map(|g| parse_subgroup(g));
        let b_marker = b.groups.iter().find_map(|g| parse_subgroup(g));
        if a_marker.is_some() && a_marker == b_marker {
            continue;
        }
        let critical = a.instructor_id() == b.instructor_id();
        table.insert(
            a.id.clone(),
            PairInfo {
                partner: b.id.clone(),
                critical,
            },
        );
        table.insert(
            b.id.clone(),
            PairInfo {
                partner: a.id.clone(),
                critical,
            },
        );
    }

    table
}
