/// Resolver service provider implementation.
use super::resolver_api_types::{ApiContent, ApiStream};
use super::{
    ContentKind, ContentProvider, OtherPart, ResolutionError, ResolvedContent, StreamManifest,
    TranslatorInfo,
};
use crate::catalog::{EpisodeKey, TranslatorEpisodeMap, TranslatorId};
use reqwest::StatusCode;
use std::time::Duration;

/// Content provider backed by a JSON resolver service.
///
/// The service does the actual scraping and exposes `/content` and `/stream`
/// endpoints; this provider only validates and converts their answers.
pub struct HttpResolverProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpResolverProvider {
    /// Creates a provider for the resolver at `base_url`.
    ///
    /// A `timeout` of `None` disables the request timeout.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ResolutionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolutionError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Parses a positive season or episode number from a JSON key.
    fn parse_number(raw: &str, what: &str) -> Result<u32, ResolutionError> {
        match raw.trim().parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(ResolutionError::InvalidData(format!(
                "invalid {} number '{}'",
                what, raw
            ))),
        }
    }

    fn convert_translator_id(raw: &serde_json::Value) -> Result<TranslatorId, ResolutionError> {
        match raw {
            serde_json::Value::String(s) if !s.is_empty() => Ok(TranslatorId::new(s.as_str())),
            serde_json::Value::Number(n) => Ok(TranslatorId::new(n.to_string())),
            other => Err(ResolutionError::InvalidData(format!(
                "invalid translator id {}",
                other
            ))),
        }
    }

    /// Converts the `/content` response into our own records.
    ///
    /// Episode maps are attached in translator list order; translators only
    /// present in the episode map are appended after them, sorted by id.
    fn convert_content(api: ApiContent) -> Result<ResolvedContent, ResolutionError> {
        let kind = match api.kind.to_lowercase().as_str() {
            "series" | "tv_series" => ContentKind::Series,
            "movie" | "film" => ContentKind::Movie,
            other => {
                return Err(ResolutionError::InvalidData(format!(
                    "unknown content kind '{}'",
                    other
                )));
            }
        };

        let mut translators = Vec::with_capacity(api.translators.len());
        for raw in &api.translators {
            let id = Self::convert_translator_id(&raw.id)?;
            let display_name = raw
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.to_string());
            translators.push(TranslatorInfo {
                id,
                display_name,
                is_premium: raw.premium,
            });
        }

        let mut episodes = TranslatorEpisodeMap::new();
        if kind == ContentKind::Series {
            let mut order: Vec<String> = translators
                .iter()
                .map(|t| t.id.to_string())
                .filter(|id| api.episodes.contains_key(id))
                .collect();
            let mut extra: Vec<String> = api
                .episodes
                .keys()
                .filter(|id| !order.contains(id))
                .cloned()
                .collect();
            extra.sort();
            order.extend(extra);

            for id in order {
                let Some(seasons) = api.episodes.get(&id) else {
                    continue;
                };
                for (season, numbers) in seasons {
                    let season = Self::parse_number(season, "season")?;
                    if let Some(bad) = numbers.iter().find(|n| **n == 0) {
                        return Err(ResolutionError::InvalidData(format!(
                            "invalid episode number '{}'",
                            bad
                        )));
                    }
                    episodes.insert(TranslatorId::new(id.as_str()), season, numbers.iter().copied());
                }
            }
        }

        let other_parts = api
            .other_parts
            .into_iter()
            .map(|p| OtherPart {
                name: p.name,
                url: p.url,
            })
            .collect();

        Ok(ResolvedContent {
            kind,
            name: api.name,
            translators,
            episodes,
            other_parts,
        })
    }

    fn convert_stream(api: ApiStream) -> StreamManifest {
        let mut manifest = StreamManifest::new();
        for (quality, urls) in api.videos {
            let urls: Vec<String> = urls.into_iter().filter(|u| !u.trim().is_empty()).collect();
            manifest.push(quality, urls);
        }
        manifest
    }

    fn http_failure(response: &reqwest::blocking::Response) -> ResolutionError {
        ResolutionError::RequestError(format!(
            "HTTP {} {}",
            response.status().as_u16(),
            response.status().canonical_reason().unwrap_or("Unknown")
        ))
    }
}

impl ContentProvider for HttpResolverProvider {
    fn resolve(&self, url: &str) -> Result<ResolvedContent, ResolutionError> {
        let endpoint = format!("{}/content", self.base_url);

        tracing::debug!(%url, "resolving content");

        let response = self
            .client
            .get(&endpoint)
            .query(&[("url", url)])
            .send()
            .map_err(|e| ResolutionError::RequestError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ResolutionError::NotFound(url.to_string()));
        }

        if !response.status().is_success() {
            return Err(Self::http_failure(&response));
        }

        let api: ApiContent = response
            .json()
            .map_err(|e| ResolutionError::ParseError(e.to_string()))?;

        Self::convert_content(api)
    }

    fn stream(
        &self,
        url: &str,
        translator: &TranslatorId,
        episode: Option<EpisodeKey>,
    ) -> Result<Option<StreamManifest>, ResolutionError> {
        let endpoint = format!("{}/stream", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("url", url.to_string()),
            ("translator", translator.to_string()),
        ];
        if let Some(key) = episode {
            query.push(("season", key.season.to_string()));
            query.push(("episode", key.episode.to_string()));
        }

        let response = self
            .client
            .get(&endpoint)
            .query(&query)
            .send()
            .map_err(|e| ResolutionError::RequestError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(Self::http_failure(&response));
        }

        let api: ApiStream = response
            .json()
            .map_err(|e| ResolutionError::ParseError(e.to_string()))?;

        Ok(Some(Self::convert_stream(api)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(json: &str) -> Result<ResolvedContent, ResolutionError> {
        let api: ApiContent = serde_json::from_str(json).unwrap();
        HttpResolverProvider::convert_content(api)
    }

    #[test]
    fn test_convert_series() {
        let resolved = content(
            r#"{
                "kind": "series",
                "name": "Some Show",
                "translators": [
                    {"id": 56, "name": "Studio A", "premium": false},
                    {"id": "238", "name": "Studio B", "premium": true}
                ],
                "episodes": {
                    "238": {"1": [1, 2], "2": [1]},
                    "56": {"1": [2, 1, 3]},
                    "7": {"3": [1]}
                },
                "other_parts": [{"name": "Movie", "url": "https://site/movie.html"}]
            }"#,
        )
        .unwrap();

        assert_eq!(resolved.kind, ContentKind::Series);
        assert_eq!(resolved.name, "Some Show");
        assert_eq!(resolved.translators.len(), 2);
        assert!(resolved.translators[1].is_premium);

        let order: Vec<&str> = resolved.episodes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["56", "238", "7"]);
        assert!(resolved.episodes.covers(&"56".into(), &EpisodeKey::new(1, 3)));
        assert!(resolved.episodes.covers(&"238".into(), &EpisodeKey::new(2, 1)));
        assert_eq!(resolved.other_parts.len(), 1);
    }

    #[test]
    fn test_convert_movie_ignores_episodes() {
        let resolved = content(
            r#"{"kind": "movie", "name": "Film", "translators": [{"id": 1, "name": null}]}"#,
        )
        .unwrap();
        assert_eq!(resolved.kind, ContentKind::Movie);
        assert!(resolved.episodes.is_empty());
        assert_eq!(resolved.translators[0].display_name, "1");
    }

    #[test]
    fn test_convert_rejects_bad_numbers() {
        let bad_season = content(r#"{"kind": "series", "name": "X", "episodes": {"1": {"0": [1]}}}"#);
        assert!(matches!(bad_season, Err(ResolutionError::InvalidData(_))));

        let bad_key = content(r#"{"kind": "series", "name": "X", "episodes": {"1": {"one": [1]}}}"#);
        assert!(matches!(bad_key, Err(ResolutionError::InvalidData(_))));

        let bad_episode = content(r#"{"kind": "series", "name": "X", "episodes": {"1": {"1": [0]}}}"#);
        assert!(matches!(bad_episode, Err(ResolutionError::InvalidData(_))));
    }

    #[test]
    fn test_convert_rejects_unknown_kind() {
        assert!(matches!(
            content(r#"{"kind": "podcast", "name": "X"}"#),
            Err(ResolutionError::InvalidData(_))
        ));
    }

    #[test]
    fn test_convert_stream_keeps_document_order() {
        let api: ApiStream = serde_json::from_str(
            r#"{"videos": {"720p": ["http://h/720"], "360p": ["http://h/360"], "1080p": [""], "480p": []}}"#,
        )
        .unwrap();
        let manifest = HttpResolverProvider::convert_stream(api);
        assert_eq!(manifest.qualities(), vec!["720p", "360p"]);
    }

    #[test]
    fn test_new_trims_base_url() {
        let provider = HttpResolverProvider::new("http://127.0.0.1:8765/", None).unwrap();
        assert_eq!(provider.base_url, "http://127.0.0.1:8765");
    }
}
