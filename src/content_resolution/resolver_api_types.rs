/// Resolver service response types for deserialization.
///
/// These structures mirror the JSON documents returned by the resolver
/// service. They are converted into the crate's own records right after
/// receipt.
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;

/// Response of the `/content` endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct ApiContent {
    /// "series" or "movie"
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub translators: Vec<ApiTranslator>,
    /// Translator id → season number → episode numbers, all keys as strings
    #[serde(default)]
    pub episodes: HashMap<String, HashMap<String, Vec<u32>>>,
    #[serde(default)]
    pub other_parts: Vec<ApiOtherPart>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiTranslator {
    /// Numeric or string id, depending on the site
    pub id: serde_json::Value,
    /// Name may be missing for the default translation
    pub name: Option<String>,
    #[serde(default)]
    pub premium: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiOtherPart {
    pub name: String,
    pub url: String,
}

/// Response of the `/stream` endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct ApiStream {
    /// Quality label → source URLs, in document order
    #[serde(deserialize_with = "ordered_entries")]
    pub videos: Vec<(String, Vec<String>)>,
}

/// Reads a JSON object as a list of entries, keeping document order.
fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, Vec<String>)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, Vec<String>)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an object mapping quality labels to URL lists")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((quality, urls)) = map.next_entry::<String, Vec<String>>()? {
                entries.push((quality, urls));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}
