use super::traits::ConfigSection;
use crate::engines::generation::EnvelopeRange;
use crate::error::{EvotuneError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Intro,
    Verse,
    Prechorus,
    Chorus,
    Bridge,
    Breakdown,
    Buildup,
    Drop,
    Outro,
}

impl SectionKind {
    pub const ALL: [SectionKind; 9] = [
        SectionKind::Intro,
        SectionKind::Verse,
        SectionKind::Prechorus,
        SectionKind::Chorus,
        SectionKind::Bridge,
        SectionKind::Breakdown,
        SectionKind::Buildup,
        SectionKind::Drop,
        SectionKind::Outro,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Intro => "intro",
            SectionKind::Verse => "verse",
            SectionKind::Prechorus => "prechorus",
            SectionKind::Chorus => "chorus",
            SectionKind::Bridge => "bridge",
            SectionKind::Breakdown => "breakdown",
            SectionKind::Buildup => "buildup",
            SectionKind::Drop => "drop",
            SectionKind::Outro => "outro",
        }
    }

    /// Expected `(gain, lpf)` ranges when a section sets none
    pub fn default_dynamics(self) -> ((f64, f64), (f64, f64)) {
        match self {
            SectionKind::Intro => ((0.3, 0.5), (2000.0, 4000.0)),
            SectionKind::Verse => ((0.5, 0.7), (3000.0, 6000.0)),
            SectionKind::Prechorus => ((0.6, 0.8), (5000.0, 8000.0)),
            SectionKind::Chorus => ((0.8, 1.0), (6000.0, 10000.0)),
            SectionKind::Bridge => ((0.4, 0.6), (2000.0, 5000.0)),
            SectionKind::Breakdown => ((0.3, 0.5), (2000.0, 4000.0)),
            SectionKind::Buildup => ((0.4, 0.8), (2000.0, 8000.0)),
            SectionKind::Drop => ((0.9, 1.0), (8000.0, 12000.0)),
            // falling: fade and close the filter
            SectionKind::Outro => ((0.5, 0.2), (4000.0, 1000.0)),
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Highest low-pass cutoff a section may ask for
pub const MAX_LPF_HZ: f64 = 20000.0;

/// Length, energy, fitness multipliers and dynamics of one section type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    pub kind: SectionKind,
    pub bars: usize,
    /// 0.0 = low energy, 1.0 = high energy
    pub energy_level: f64,
    pub rhythm_modifier: f64,
    pub melody_modifier: f64,
    pub chord_modifier: f64,
    /// `(start, end)` gain expected across the section; kind default if unset
    pub gain_range: Option<(f64, f64)>,
    /// `(start, end)` low-pass cutoff in Hz; kind default if unset
    pub lpf_range: Option<(f64, f64)>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self::new(SectionKind::Verse, 4, 0.5)
    }
}

impl SectionConfig {
    pub fn new(kind: SectionKind, bars: usize, energy_level: f64) -> Self {
        Self {
            kind,
            bars,
            energy_level,
            rhythm_modifier: 1.0,
            melody_modifier: 1.0,
            chord_modifier: 1.0,
            gain_range: None,
            lpf_range: None,
        }
    }

    pub fn gain_envelope_range(&self) -> EnvelopeRange {
        let (start, end) = self.gain_range.unwrap_or(self.kind.default_dynamics().0);
        EnvelopeRange::new(start, end)
    }

    pub fn lpf_envelope_range(&self) -> EnvelopeRange {
        let (start, end) = self.lpf_range.unwrap_or(self.kind.default_dynamics().1);
        EnvelopeRange::new(start, end)
    }

    /// Scale a layer's max subdivision by energy: `0.5 + energy` times the
    /// configured value, never above it and never below 1
    pub fn effective_max_subdivision(&self, max_subdivision: u8) -> u8 {
        let scaled = (max_subdivision as f64 * (0.5 + self.energy_level)).floor();
        let scaled = if scaled.is_finite() && scaled >= 1.0 {
            scaled.min(u8::MAX as f64) as u8
        } else {
            1
        };
        max_subdivision.min(scaled)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bars == 0 {
            return Err(EvotuneError::Configuration(format!(
                "Section '{}' needs at least one bar",
                self.kind
            )));
        }
        if !(0.0..=1.0).contains(&self.energy_level) {
            return Err(EvotuneError::Configuration(format!(
                "Section '{}' energy must be between 0 and 1, got {}",
                self.kind, self.energy_level
            )));
        }
        for (name, value) in [
            ("rhythm", self.rhythm_modifier),
            ("melody", self.melody_modifier),
            ("chord", self.chord_modifier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EvotuneError::Configuration(format!(
                    "Section '{}' {} modifier must be non-negative, got {}",
                    self.kind, name, value
                )));
            }
        }
        let gain = self.gain_envelope_range();
        if !(0.0..=1.0).contains(&gain.low()) || !(0.0..=1.0).contains(&gain.high()) {
            return Err(EvotuneError::Configuration(format!(
                "Section '{}' gain range must lie within 0..=1, got ({}, {})",
                self.kind, gain.start, gain.end
            )));
        }
        let lpf = self.lpf_envelope_range();
        if !(lpf.low() > 0.0 && lpf.high() <= MAX_LPF_HZ) {
            return Err(EvotuneError::Configuration(format!(
                "Section '{}' lpf range must lie within 0..={} Hz, got ({}, {})",
                self.kind, MAX_LPF_HZ, lpf.start, lpf.end
            )));
        }
        Ok(())
    }
}

/// Pre-defined song structures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongForm {
    PopStandard,
    VerseChorus,
    Aaba,
    ElectronicDrop,
    Ballad,
    Rock,
    JazzStandard,
}

impl SongForm {
    /// Ordered `(kind, bars, energy)` template of the form
    fn template(self) -> &'static [(SectionKind, usize, f64)] {
        use SectionKind::*;
        match self {
            SongForm::PopStandard => &[
                (Intro, 4, 0.3),
                (Verse, 8, 0.5),
                (Prechorus, 4, 0.7),
                (Chorus, 8, 0.9),
                (Verse, 8, 0.6),
                (Prechorus, 4, 0.7),
                (Chorus, 8, 1.0),
                (Bridge, 8, 0.4),
                (Chorus, 8, 1.0),
                (Outro, 4, 0.3),
            ],
            SongForm::VerseChorus => &[
                (Intro, 4, 0.3),
                (Verse, 8, 0.5),
                (Chorus, 8, 0.9),
                (Verse, 8, 0.6),
                (Chorus, 8, 1.0),
                (Outro, 4, 0.3),
            ],
            SongForm::Aaba => &[
                (Verse, 8, 0.6),
                (Verse, 8, 0.7),
                (Bridge, 8, 0.5),
                (Verse, 8, 0.8),
            ],
            SongForm::ElectronicDrop => &[
                (Intro, 8, 0.2),
                (Buildup, 8, 0.6),
                (Drop, 16, 1.0),
                (Breakdown, 8, 0.3),
                (Buildup, 8, 0.7),
                (Drop, 16, 1.0),
                (Outro, 8, 0.2),
            ],
            SongForm::Ballad => &[
                (Intro, 4, 0.2),
                (Verse, 8, 0.4),
                (Chorus, 8, 0.6),
                (Verse, 8, 0.5),
                (Chorus, 8, 0.7),
                (Bridge, 8, 0.8),
                (Chorus, 8, 0.7),
                (Outro, 8, 0.2),
            ],
            SongForm::Rock => &[
                (Intro, 4, 0.7),
                (Verse, 8, 0.6),
                (Chorus, 8, 0.9),
                (Verse, 8, 0.7),
                (Chorus, 8, 1.0),
                (Bridge, 8, 0.5),
                (Chorus, 8, 1.0),
                (Outro, 8, 0.8),
            ],
            SongForm::JazzStandard => &[
                (Intro, 4, 0.4),
                (Verse, 8, 0.5),
                (Verse, 8, 0.6),
                (Bridge, 8, 0.6),
                (Verse, 8, 0.7),
                (Verse, 8, 0.6),
                (Outro, 4, 0.4),
            ],
        }
    }

    /// One section config per template entry, in song order
    pub fn sections(self) -> Vec<SectionConfig> {
        self.template()
            .iter()
            .map(|&(kind, bars, energy)| SectionConfig::new(kind, bars, energy))
            .collect()
    }

    pub fn structure(self) -> Vec<SectionKind> {
        self.template().iter().map(|(kind, _, _)| *kind).collect()
    }
}

impl FromStr for SongForm {
    type Err = EvotuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pop_standard" | "pop" => Ok(SongForm::PopStandard),
            "verse_chorus" => Ok(SongForm::VerseChorus),
            "aaba" => Ok(SongForm::Aaba),
            "electronic_drop" | "edm" => Ok(SongForm::ElectronicDrop),
            "ballad" => Ok(SongForm::Ballad),
            "rock" => Ok(SongForm::Rock),
            "jazz_standard" | "jazz" => Ok(SongForm::JazzStandard),
            other => Err(EvotuneError::Configuration(format!(
                "unknown song form '{}'",
                other
            ))),
        }
    }
}

/// Song layout: explicit sections and structure, or a named form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongConfig {
    /// Replaces `sections` and `structure` when set
    pub form: Option<SongForm>,
    pub sections: Vec<SectionConfig>,
    pub structure: Vec<SectionKind>,
}

impl Default for SongConfig {
    fn default() -> Self {
        Self {
            form: Some(SongForm::VerseChorus),
            sections: Vec::new(),
            structure: Vec::new(),
        }
    }
}

impl SongConfig {
    pub fn from_form(form: SongForm) -> Self {
        Self {
            form: Some(form),
            sections: Vec::new(),
            structure: Vec::new(),
        }
    }

    /// Section configs and structure after expanding the form
    pub fn resolve(&self) -> (Vec<SectionConfig>, Vec<SectionKind>) {
        match self.form {
            Some(form) => (form.sections(), form.structure()),
            None => (self.sections.clone(), self.structure.clone()),
        }
    }
}

impl ConfigSection for SongConfig {
    fn section_name() -> &'static str {
        "song"
    }

    fn validate(&self) -> Result<()> {
        let (sections, structure) = self.resolve();
        if structure.is_empty() {
            return Err(EvotuneError::Configuration(
                "Song structure needs at least one section".to_string(),
            ));
        }
        for section in &sections {
            section.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_subdivision() {
        let quiet = SectionConfig::new(SectionKind::Intro, 4, 0.0);
        let loud = SectionConfig::new(SectionKind::Drop, 4, 1.0);
        assert_eq!(quiet.effective_max_subdivision(4), 2);
        assert_eq!(loud.effective_max_subdivision(4), 4);
        assert_eq!(quiet.effective_max_subdivision(1), 1);
    }

    #[test]
    fn test_forms_expand() {
        let sections = SongForm::Aaba.sections();
        assert_eq!(sections.len(), 4);
        assert_eq!(
            SongForm::Aaba.structure(),
            vec![
                SectionKind::Verse,
                SectionKind::Verse,
                SectionKind::Bridge,
                SectionKind::Verse
            ]
        );
        assert!(sections.iter().all(|s| s.validate().is_ok()));
    }

    #[test]
    fn test_form_names_parse() {
        assert_eq!("electronic-drop".parse::<SongForm>().unwrap(), SongForm::ElectronicDrop);
        assert!("polka".parse::<SongForm>().is_err());
    }

    #[test]
    fn test_section_validation() {
        assert!(SectionConfig::new(SectionKind::Verse, 0, 0.5).validate().is_err());
        assert!(SectionConfig::new(SectionKind::Verse, 4, 1.5).validate().is_err());
        let mut section = SectionConfig::new(SectionKind::Verse, 4, 0.5);
        section.chord_modifier = -0.1;
        assert!(section.validate().is_err());

        let mut section = SectionConfig::new(SectionKind::Verse, 4, 0.5);
        section.gain_range = Some((0.2, 1.4));
        assert!(section.validate().is_err());
        section.gain_range = None;
        section.lpf_range = Some((0.0, 3000.0));
        assert!(section.validate().is_err());
    }

    #[test]
    fn test_dynamics_default_by_kind() {
        let outro = SectionConfig::new(SectionKind::Outro, 4, 0.2);
        let gain = outro.gain_envelope_range();
        assert_eq!((gain.start, gain.end), (0.5, 0.2));
        assert!(outro.validate().is_ok());

        let mut verse = SectionConfig::new(SectionKind::Verse, 4, 0.5);
        verse.lpf_range = Some((1500.0, 2500.0));
        assert_eq!(verse.lpf_envelope_range().high(), 2500.0);
        assert_eq!(verse.gain_envelope_range().low(), 0.5);
    }
}
