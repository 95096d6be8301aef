//! Translator and quality selection
//!
//! Both pickers apply the same precedence: a lone option is taken silently
//! when auto-selection is enabled, then a configured preference is honoured if
//! it matches, and otherwise the user picks from the full list.

use crate::catalog::TranslatorId;
use crate::content_resolution::TranslatorInfo;
use crate::prompt::{PromptError, Prompter, option_at};
use std::cmp::Reverse;
use thiserror::Error;

/// Errors that can occur while picking a translator or quality
#[derive(Debug, Error)]
pub enum PickError {
    /// The list to pick from was empty
    #[error("No options available to choose from")]
    NoOptions,

    /// Asking the user failed
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Quality tiers, best first. The first tier with a matching fragment wins.
const QUALITY_TIERS: &[(u8, &[&str])] = &[
    (6, &["2160", "4k", "uhd"]),
    (5, &["1440", "2k", "qhd"]),
    (4, &["1080", "fhd"]),
    (3, &["720", "hd"]),
    (2, &["480", "sd"]),
    (1, &["360"]),
];

/// Ranks a quality label. Unknown labels all share the lowest rank, 0.
pub fn quality_rank(label: &str) -> u8 {
    let label = label.to_lowercase();
    QUALITY_TIERS
        .iter()
        .find(|(_, fragments)| fragments.iter().any(|f| label.contains(f)))
        .map(|(rank, _)| *rank)
        .unwrap_or(0)
}

/// Orders qualities best first for display.
///
/// The sort is stable, so labels of equal rank keep their discovery order.
/// This only affects presentation; the set of qualities is unchanged.
pub fn rank_qualities(available: &[String]) -> Vec<&String> {
    let mut ranked: Vec<&String> = available.iter().collect();
    ranked.sort_by_key(|label| Reverse(quality_rank(label)));
    ranked
}

/// Picks the translator to download with.
///
/// A preference matches a translator whose display name contains it,
/// ignoring case. With several matches the first candidate wins.
pub fn pick_translator(
    candidates: &[TranslatorInfo],
    preference: Option<&str>,
    auto_select_single: bool,
    prompter: &mut dyn Prompter,
) -> Result<TranslatorId, PickError> {
    if candidates.is_empty() {
        return Err(PickError::NoOptions);
    }

    if candidates.len() == 1 && auto_select_single {
        tracing::debug!(translator = %candidates[0].id, "single translator auto-selected");
        return Ok(candidates[0].id.clone());
    }

    if let Some(wanted) = preference.map(str::to_lowercase).filter(|p| !p.is_empty()) {
        if let Some(found) = candidates
            .iter()
            .find(|c| c.display_name.to_lowercase().contains(&wanted))
        {
            tracing::debug!(translator = %found.id, "preferred translator matched");
            return Ok(found.id.clone());
        }
    }

    let labels: Vec<String> = candidates.iter().map(TranslatorInfo::label).collect();
    let index = prompter.choose("Available translations:", &labels)?;
    Ok(option_at(candidates, index)?.id.clone())
}

/// Picks the quality to download.
///
/// A preference must equal one of the available labels exactly.
pub fn pick_quality(
    available: &[String],
    preference: Option<&str>,
    auto_select_single: bool,
    prompter: &mut dyn Prompter,
) -> Result<String, PickError> {
    if available.is_empty() {
        return Err(PickError::NoOptions);
    }

    if available.len() == 1 && auto_select_single {
        return Ok(available[0].clone());
    }

    if let Some(wanted) = preference {
        if let Some(found) = available.iter().find(|q| q.as_str() == wanted) {
            return Ok(found.clone());
        }
    }

    let ranked = rank_qualities(available);
    let labels: Vec<String> = ranked.iter().map(|q| q.to_string()).collect();
    let index = prompter.choose("Choose quality:", &labels)?;
    Ok(option_at(&labels, index)?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Prompter that answers from a script and counts the questions asked.
    struct ScriptedPrompter {
        answers: Vec<usize>,
        asked: usize,
        last_options: Vec<String>,
    }

    impl ScriptedPrompter {
        fn new(answers: Vec<usize>) -> Self {
            Self {
                answers,
                asked: 0,
                last_options: Vec::new(),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn choose(&mut self, _title: &str, options: &[String]) -> Result<usize, PromptError> {
            self.last_options = options.to_vec();
            let answer = self.answers.get(self.asked).copied().ok_or(PromptError::Closed)?;
            self.asked += 1;
            Ok(answer)
        }

        fn confirm(&mut self, _question: &str) -> Result<bool, PromptError> {
            Err(PromptError::Closed)
        }

        fn input(&mut self, _prompt: &str) -> Result<String, PromptError> {
            Err(PromptError::Closed)
        }
    }

    fn translator(id: &str, name: &str) -> TranslatorInfo {
        TranslatorInfo {
            id: TranslatorId::new(id),
            display_name: name.to_string(),
            is_premium: false,
        }
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quality_rank() {
        assert_eq!(quality_rank("4K"), 6);
        assert_eq!(quality_rank("2160p"), 6);
        assert_eq!(quality_rank("2K"), 5);
        assert_eq!(quality_rank("1080p Ultra"), 4);
        assert_eq!(quality_rank("1080p"), 4);
        assert_eq!(quality_rank("720p"), 3);
        assert_eq!(quality_rank("480p"), 2);
        assert_eq!(quality_rank("360p"), 1);
        assert_eq!(quality_rank("240p"), 0);
        assert_eq!(quality_rank("original"), 0);
    }

    #[test]
    fn test_rank_qualities_stable() {
        let available = labels(&["360p", "foo", "1080p", "720p", "1080p Ultra", "bar", "4K"]);
        let ranked: Vec<&str> = rank_qualities(&available)
            .into_iter()
            .map(String::as_str)
            .collect();
        assert_eq!(
            ranked,
            vec!["4K", "1080p", "1080p Ultra", "720p", "360p", "foo", "bar"]
        );
        // Input untouched
        assert_eq!(available[0], "360p");
    }

    #[test]
    fn test_pick_quality_single_auto_does_not_prompt() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        let picked = pick_quality(&labels(&["720p"]), None, true, &mut prompter).unwrap();
        assert_eq!(picked, "720p");
        assert_eq!(prompter.asked, 0);
    }

    #[test]
    fn test_pick_quality_single_without_auto_prompts() {
        let mut prompter = ScriptedPrompter::new(vec![0]);
        let picked = pick_quality(&labels(&["720p"]), None, false, &mut prompter).unwrap();
        assert_eq!(picked, "720p");
        assert_eq!(prompter.asked, 1);
    }

    #[test]
    fn test_pick_quality_preference_exact_match() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        let available = labels(&["720p", "1080p"]);
        let picked = pick_quality(&available, Some("1080p"), true, &mut prompter).unwrap();
        assert_eq!(picked, "1080p");
        assert_eq!(prompter.asked, 0);
    }

    #[test]
    fn test_pick_quality_preference_miss_prompts_ranked() {
        let mut prompter = ScriptedPrompter::new(vec![0]);
        let available = labels(&["720p", "1080p Ultra", "1080p"]);
        // "1080" is not an exact label
        let picked = pick_quality(&available, Some("1080"), true, &mut prompter).unwrap();
        assert_eq!(picked, "1080p Ultra");
        assert_eq!(prompter.last_options, labels(&["1080p Ultra", "1080p", "720p"]));
    }

    #[test]
    fn test_pick_quality_empty() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        assert!(matches!(
            pick_quality(&[], Some("720p"), true, &mut prompter),
            Err(PickError::NoOptions)
        ));
    }

    #[test]
    fn test_pick_translator_single_auto() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        let candidates = vec![translator("56", "Studio Band")];
        let picked = pick_translator(&candidates, Some("other"), true, &mut prompter).unwrap();
        assert_eq!(picked, TranslatorId::new("56"));
        assert_eq!(prompter.asked, 0);
    }

    #[test]
    fn test_pick_translator_preference_substring() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        let candidates = vec![
            translator("1", "Original (subtitles)"),
            translator("2", "LostFilm"),
            translator("3", "LostFilm Premium"),
        ];
        let picked = pick_translator(&candidates, Some("lostfilm"), true, &mut prompter).unwrap();
        assert_eq!(picked, TranslatorId::new("2"));
        assert_eq!(prompter.asked, 0);
    }

    #[test]
    fn test_pick_translator_prompts_when_no_preference_matches() {
        let mut prompter = ScriptedPrompter::new(vec![1]);
        let mut premium = translator("9", "Gold Voice");
        premium.is_premium = true;
        let candidates = vec![translator("1", "Alpha"), premium];

        let picked = pick_translator(&candidates, Some("beta"), true, &mut prompter).unwrap();
        assert_eq!(picked, TranslatorId::new("9"));
        assert_eq!(prompter.last_options, labels(&["Alpha", "Gold Voice (Premium)"]));
    }

    #[test]
    fn test_pick_translator_empty() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        assert!(matches!(
            pick_translator(&[], None, true, &mut prompter),
            Err(PickError::NoOptions)
        ));
    }

    #[test]
    fn test_out_of_range_answer_is_an_error() {
        let candidates = vec![translator("1", "Alpha"), translator("2", "Beta")];
        let mut prompter = ScriptedPrompter::new(vec![2]);
        assert!(matches!(
            pick_translator(&candidates, None, true, &mut prompter),
            Err(PickError::Prompt(PromptError::OutOfRange { index: 2, count: 2 }))
        ));

        let mut prompter = ScriptedPrompter::new(vec![7]);
        assert!(matches!(
            pick_quality(&labels(&["720p", "1080p"]), None, true, &mut prompter),
            Err(PickError::Prompt(PromptError::OutOfRange { index: 7, count: 2 }))
        ));
    }
}
