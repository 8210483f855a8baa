//! Run configuration
//!
//! A [`RunConfig`] says which passes run, where to stop, which transforms
//! are enabled (in order) and which backends are produced. It is plain
//! serde data, usually loaded with [`RunConfig::from_json`], and must pass
//! [`RunConfig::validate`] before a pipeline accepts it.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;
use crate::pipeline::PassId;

/// Output representations produced by pass 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Lilypond,
    Braille,
    Guido,
    Musicxml,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Lilypond => "lilypond",
            Backend::Braille => "braille",
            Backend::Guido => "guido",
            Backend::Musicxml => "musicxml",
        }
    }
}

/// Score-tree transforms, applied in the order they are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformName {
    PartFilter,
    StaffFilter,
    VoiceFilter,
    CoalesceEmptyMeasures,
    MergeRests,
    ImplicitInitialRepeatBarline,
}

impl TransformName {
    pub fn name(&self) -> &'static str {
        match self {
            TransformName::PartFilter => "part-filter",
            TransformName::StaffFilter => "staff-filter",
            TransformName::VoiceFilter => "voice-filter",
            TransformName::CoalesceEmptyMeasures => "coalesce-empty-measures",
            TransformName::MergeRests => "merge-rests",
            TransformName::ImplicitInitialRepeatBarline => "implicit-initial-repeat-barline",
        }
    }
}

/// Keep-only or ignore-only selection; at most one of the two may be non-empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSets<T> {
    pub keep: Vec<T>,
    pub ignore: Vec<T>,
}

impl<T> Default for FilterSets<T> {
    fn default() -> Self {
        Self {
            keep: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

impl<T: PartialEq> FilterSets<T> {
    pub fn keep_only(keep: Vec<T>) -> Self {
        Self {
            keep,
            ignore: Vec::new(),
        }
    }

    pub fn ignoring(ignore: Vec<T>) -> Self {
        Self {
            keep: Vec::new(),
            ignore,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.keep.is_empty() || !self.ignore.is_empty()
    }

    /// Whether an element named by any of `names` survives the filter
    pub fn admits_any<'a>(&self, names: impl IntoIterator<Item = &'a T>) -> bool
    where
        T: 'a,
    {
        let names: Vec<&T> = names.into_iter().collect();
        if !self.keep.is_empty() {
            return names.iter().any(|n| self.keep.contains(n));
        }
        !names.iter().any(|n| self.ignore.contains(n))
    }

    pub fn admits(&self, name: &T) -> bool {
        self.admits_any(std::iter::once(name))
    }

    fn check(&self, filter: &'static str) -> Result<(), ConfigurationError> {
        if !self.keep.is_empty() && !self.ignore.is_empty() {
            return Err(ConfigurationError::ConflictingFilterSets(filter));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Enabled transforms, in application order
    pub enabled: Vec<TransformName>,
    /// Part ids or names
    pub part_filter: FilterSets<String>,
    /// Staff numbers
    pub staff_filter: FilterSets<u32>,
    /// Voice numbers
    pub voice_filter: FilterSets<u32>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            part_filter: FilterSets::default(),
            staff_filter: FilterSets::default(),
            voice_filter: FilterSets::default(),
        }
    }
}

/// Note naming language for LilyPond output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitchLanguage {
    /// Dutch: c d e f g a b (cis/ees for sharps/flats) - LilyPond default
    Nederlands,

    /// English: c d e f g a b (cs/ef for sharps/flats)
    English,

    /// German: c d e f g a h (cis/es for sharps/flats)
    Deutsch,

    /// Italian: do re mi fa sol la si (dod/mib for sharps/flats)
    Italiano,
}

impl PitchLanguage {
    pub fn lilypond_name(&self) -> &'static str {
        match self {
            PitchLanguage::Nederlands => "nederlands",
            PitchLanguage::English => "english",
            PitchLanguage::Deutsch => "deutsch",
            PitchLanguage::Italiano => "italiano",
        }
    }
}

/// Configuration options for LilyPond output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LilypondSettings {
    /// Target LilyPond version (e.g., "2.24.0")
    pub target_lilypond_version: String,

    /// Note name language
    pub language: PitchLanguage,

    /// Title override; the score's own title is used otherwise
    pub title: Option<String>,

    /// Composer override
    pub composer: Option<String>,

    /// Whether to convert direction elements (dynamics, words, wedges)
    pub convert_directions: bool,
}

impl Default for LilypondSettings {
    fn default() -> Self {
        Self {
            target_lilypond_version: "2.24.0".to_string(),
            language: PitchLanguage::Nederlands,
            title: None,
            composer: None,
            convert_directions: true,
        }
    }
}

/// Everything a pipeline run needs to know
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pass numbers to run, increasing (1 build, 2 transform, 3 convert, 4 generate)
    pub passes: Vec<u8>,
    /// Stop successfully after this pass
    pub stop_after: Option<u8>,
    pub backends: Vec<Backend>,
    /// Parts the builder converts at all (ids or names)
    pub parts: FilterSets<String>,
    pub transforms: TransformConfig,
    pub lilypond: LilypondSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            passes: vec![1, 2, 3, 4],
            stop_after: None,
            backends: vec![Backend::Lilypond],
            parts: FilterSets::default(),
            transforms: TransformConfig::default(),
            lilypond: LilypondSettings::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let config: RunConfig = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::InvalidJson(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigurationError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigurationError::InvalidJson(e.to_string()))
    }

    /// Reject contradictory settings
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.passes.is_empty() {
            return Err(ConfigurationError::EmptyPassList);
        }
        for number in &self.passes {
            if PassId::from_number(*number).is_none() {
                return Err(ConfigurationError::UnknownPass(*number));
            }
        }
        if self.passes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigurationError::PassesOutOfOrder(self.passes.clone()));
        }
        if self.passes[0] != 1 {
            return Err(ConfigurationError::MissingPrerequisite(self.passes[0], 1));
        }
        if self.passes.contains(&4) && !self.passes.contains(&3) {
            return Err(ConfigurationError::MissingPrerequisite(4, 3));
        }
        if let Some(stop) = self.stop_after {
            if PassId::from_number(stop).is_none() {
                return Err(ConfigurationError::UnknownPass(stop));
            }
            if !self.passes.contains(&stop) {
                return Err(ConfigurationError::StopAfterNotScheduled(stop));
            }
        }

        self.parts.check("parts")?;
        self.transforms.part_filter.check("part-filter")?;
        self.transforms.staff_filter.check("staff-filter")?;
        self.transforms.voice_filter.check("voice-filter")?;

        let enabled = &self.transforms.enabled;
        for (i, name) in enabled.iter().enumerate() {
            if enabled[..i].contains(name) {
                return Err(ConfigurationError::DuplicateTransform(name.name().to_string()));
            }
        }
        Ok(())
    }

    /// Scheduled passes; call after [`RunConfig::validate`]
    pub fn pass_ids(&self) -> Vec<PassId> {
        self.passes
            .iter()
            .filter_map(|n| PassId::from_number(*n))
            .collect()
    }

    pub fn stop_after_pass(&self) -> Option<PassId> {
        self.stop_after.and_then(PassId::from_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pass_ids().len(), 4);
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = RunConfig::from_json(
            r#"{
                "stop_after": 2,
                "backends": ["braille", "musicxml"],
                "transforms": {
                    "enabled": ["merge-rests", "part-filter"],
                    "part_filter": { "keep": ["P1"] }
                },
                "lilypond": { "language": "English" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.passes, vec![1, 2, 3, 4]);
        assert_eq!(config.stop_after_pass(), Some(PassId::Transform));
        assert_eq!(config.backends, vec![Backend::Braille, Backend::Musicxml]);
        assert_eq!(
            config.transforms.enabled,
            vec![TransformName::MergeRests, TransformName::PartFilter]
        );
        assert_eq!(config.lilypond.language, PitchLanguage::English);
        assert_eq!(config.lilypond.target_lilypond_version, "2.24.0");
    }

    #[test]
    fn test_conflicting_filter_sets_are_rejected() {
        let mut config = RunConfig::default();
        config.transforms.staff_filter = FilterSets {
            keep: vec![1],
            ignore: vec![2],
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::ConflictingFilterSets("staff-filter"))
        );
    }

    #[test]
    fn test_pass_list_rules() {
        let mut config = RunConfig::default();
        config.passes = vec![1, 3, 2];
        assert!(matches!(config.validate(), Err(ConfigurationError::PassesOutOfOrder(_))));

        config.passes = vec![1, 2, 4];
        assert_eq!(config.validate(), Err(ConfigurationError::MissingPrerequisite(4, 3)));

        config.passes = vec![1, 2];
        config.stop_after = Some(3);
        assert_eq!(config.validate(), Err(ConfigurationError::StopAfterNotScheduled(3)));

        config.passes = vec![1, 9];
        assert_eq!(config.validate(), Err(ConfigurationError::UnknownPass(9)));
    }

    #[test]
    fn test_unknown_transform_name_is_invalid_json() {
        let err = RunConfig::from_json(r#"{ "transforms": { "enabled": ["sparkle"] } }"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidJson(_)));
    }

    #[test]
    fn test_filter_admission() {
        let keep = FilterSets::keep_only(vec!["P1".to_string()]);
        assert!(keep.admits(&"P1".to_string()));
        assert!(!keep.admits(&"P2".to_string()));
        let ignore = FilterSets::ignoring(vec![2u32]);
        assert!(ignore.admits(&1));
        assert!(!ignore.admits(&2));
        assert!(FilterSets::<u32>::default().admits(&7));
    }
}
