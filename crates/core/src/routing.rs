use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category -> physical server identifiers that actually hold converted
/// objects for that category.
///
/// The converter does not write into the partition recorded on the original
/// (road originals from ts-server5 land under ts-server3, and so on). This
/// table is the only place that divergence is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    routes: BTreeMap<String, Vec<String>>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new([
            ("road", vec!["ts-server3"]),
            ("structure", vec!["ts-server7"]),
        ])
    }
}

impl RoutingTable {
    pub fn new<C, S>(routes: impl IntoIterator<Item = (C, Vec<S>)>) -> Self
    where
        C: Into<String>,
        S: Into<String>,
    {
        Self {
            routes: routes
                .into_iter()
                .map(|(category, servers)| {
                    (
                        category.into(),
                        servers.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.values().all(Vec::is_empty)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn servers_for(&self, category: &str) -> &[String] {
        self.routes
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Broad-search prefixes under `converted_root`. A partition whose
    /// category is unknown to the table falls back to every known prefix.
    pub fn coarse_prefixes(&self, converted_root: &str, partition: Option<&Partition>) -> Vec<String> {
        let root = converted_root.trim_end_matches('/');
        let category = partition
            .and_then(|partition| partition.category.as_deref())
            .filter(|category| !self.servers_for(category).is_empty());

        match category {
            Some(category) => self
                .servers_for(category)
                .iter()
                .map(|server| format!("{root}/{category}/{server}/"))
                .collect(),
            None => self
                .routes
                .iter()
                .flat_map(|(category, servers)| {
                    servers
                        .iter()
                        .map(move |server| format!("{root}/{category}/{server}/"))
                })
                .collect(),
        }
    }
}

/// Logical partition recorded on an original key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub category: Option<String>,
    pub server: Option<String>,
}

const SERVER_PREFIX: &str = "ts-server";

fn server_number(segment: &str) -> Option<u32> {
    let digits = segment.strip_prefix(SERVER_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Logical category of a NAS server as recorded by ingestion.
pub fn category_for_server(server: &str) -> Option<&'static str> {
    match server_number(server)? {
        3 | 5 => Some("road"),
        6 | 7 => Some("structure"),
        _ => None,
    }
}

/// Reads `{category}/{server}` from a key whose routing prefixes were already
/// stripped. A bare server segment still yields its inferred category.
pub fn parse_partition(relative_key: &str, known_categories: &[&str]) -> Option<Partition> {
    let segments: Vec<&str> = relative_key.split('/').filter(|s| !s.is_empty()).collect();

    if let [category, server, ..] = segments.as_slice() {
        if known_categories.contains(category) && server_number(server).is_some() {
            return Some(Partition {
                category: Some((*category).to_string()),
                server: Some((*server).to_string()),
            });
        }
    }

    let server = segments
        .iter()
        .find(|segment| server_number(segment).is_some())?;

    Some(Partition {
        category: category_for_server(server).map(str::to_string),
        server: Some((*server).to_string()),
    })
}
