use super::Renderer;
use crate::engines::composition::{Composition, Layer, LayerDynamics, LayerGenome, Song};
use crate::engines::generation::{ChordProgression, Envelope, Melody, Rhythm};
use crate::types::{parse_scale, Pitch, PitchClass};
use std::fmt::Write;

/// Octave whose scale steps render as degrees 0..n
pub const DEFAULT_BASE_OCTAVE: u8 = 4;

/// Emits Strudel live-coding patterns, one `$:` line per layer
#[derive(Debug, Clone)]
pub struct StrudelRenderer {
    pub base_octave: u8,
}

impl Default for StrudelRenderer {
    fn default() -> Self {
        Self {
            base_octave: DEFAULT_BASE_OCTAVE,
        }
    }
}

impl StrudelRenderer {
    pub fn new(base_octave: u8) -> Self {
        Self { base_octave }
    }

    /// Mini-notation for a layer body, without sound or effects
    pub fn pattern(&self, layer: &Layer, fallback_scale: &str) -> String {
        match &layer.genome {
            LayerGenome::Drum { rhythm } => drum_pattern(rhythm, drum_sound(layer)),
            LayerGenome::Melodic { melody } => {
                let scale = parse_scale(layer_scale(layer, fallback_scale)).unwrap_or_default();
                melody_pattern(melody, &scale, self.base_octave)
            }
            LayerGenome::Chords { progression } => chord_pattern(progression),
        }
    }

    /// A full `$:` line for one layer
    pub fn layer_line(&self, layer: &Layer, fallback_scale: &str) -> String {
        let pattern = self.pattern(layer, fallback_scale);
        format!("$: {}", decorate(layer, &pattern, fallback_scale, None))
    }
}

impl Renderer for StrudelRenderer {
    fn render_composition(&self, composition: &Composition) -> String {
        let mut lines = vec![format!("setcpm({})", cycles_per_minute(composition.bpm)), String::new()];
        lines.extend(
            composition
                .layers
                .iter()
                .map(|layer| self.layer_line(layer, &composition.scale)),
        );
        lines.join("\n")
    }

    /// Each layer becomes one `<...>` sequence with a cycle per section in
    /// playing order; sections the layer sits out are rests
    fn render_song(&self, song: &Song) -> String {
        let mut out = String::new();
        let structure: Vec<&str> = song.structure.iter().map(|k| k.name()).collect();
        let _ = writeln!(out, "// BPM: {}", song.bpm);
        let _ = writeln!(out, "// Structure: {}", structure.join(" -> "));
        let _ = writeln!(out, "// Scale: {}", song.scale);
        let _ = writeln!(out);
        let _ = writeln!(out, "setcpm({})", cycles_per_minute(song.bpm));
        let _ = writeln!(out);

        // one representative per layer name, in order of first appearance
        let mut layers: Vec<&Layer> = Vec::new();
        for section in &song.sections {
            for layer in &section.layers {
                if !layers.iter().any(|l| l.name == layer.name) {
                    layers.push(layer);
                }
            }
        }

        for layer in layers {
            let cycles: Vec<String> = song
                .arrangement()
                .map(|section| match section.layer(&layer.name) {
                    Some(played) => format!("[{}]", self.pattern(played, &song.scale)),
                    None => "[~]".to_string(),
                })
                .collect();
            let sequence = format!("<{}>", cycles.join(" "));
            let automation = song_automation(song, layer);
            let _ = writeln!(
                out,
                "$: {}",
                decorate(layer, &sequence, &song.scale, automation.as_ref())
            );
        }

        out.trim_end().to_string()
    }
}

fn cycles_per_minute(bpm: u32) -> f64 {
    bpm as f64 / 4.0
}

fn drum_sound(layer: &Layer) -> &str {
    if layer.render.drum_sound.is_empty() {
        &layer.name
    } else {
        &layer.render.drum_sound
    }
}

fn layer_scale<'a>(layer: &'a Layer, fallback: &'a str) -> &'a str {
    if layer.render.scale.trim().is_empty() {
        fallback
    } else {
        &layer.render.scale
    }
}

/// Per-cycle gain and filter patterns replacing the static render values
struct Automation {
    gain: String,
    lpf: String,
}

fn envelope_steps(envelope: &Envelope, precision: usize) -> String {
    let steps: Vec<String> = envelope
        .values()
        .map(|v| format!("{:.*}", precision, v))
        .collect();
    format!("[{}]", steps.join(" "))
}

/// Section envelopes of `layer` in playing order, `None` when no section
/// evolved any. Sections without envelopes keep the static values.
fn song_automation(song: &Song, layer: &Layer) -> Option<Automation> {
    let per_section: Vec<Option<&LayerDynamics>> = song
        .arrangement()
        .map(|section| section.dynamics_for(&layer.name))
        .collect();
    if per_section.iter().all(Option::is_none) {
        return None;
    }

    let gain: Vec<String> = per_section
        .iter()
        .map(|d| match d {
            Some(d) => envelope_steps(&d.gain, 2),
            None => layer.render.gain.to_string(),
        })
        .collect();
    let lpf: Vec<String> = per_section
        .iter()
        .map(|d| match d {
            Some(d) => envelope_steps(&d.lpf, 0),
            None => layer.render.lpf.to_string(),
        })
        .collect();
    Some(Automation {
        gain: format!("\"<{}>\"", gain.join(" ")),
        lpf: format!("\"<{}>\"", lpf.join(" ")),
    })
}

/// Wrap a pattern with sound, scale and effect calls
fn decorate(
    layer: &Layer,
    pattern: &str,
    fallback_scale: &str,
    automation: Option<&Automation>,
) -> String {
    let render = &layer.render;
    let mut expr = if layer.is_drum() {
        format!("sound(\"{}\")", pattern)
    } else {
        let mut expr = format!("n(\"{}\")", pattern);
        match render.octave_shift {
            0 => {}
            s if s < 0 => {
                let _ = write!(expr, ".sub({})", s.unsigned_abs());
            }
            s => {
                let _ = write!(expr, ".add({})", s);
            }
        }
        let _ = write!(expr, ".scale(\"{}\")", layer_scale(layer, fallback_scale));
        if !render.instrument.is_empty() {
            let _ = write!(expr, ".s(\"{}\")", render.instrument);
        }
        expr
    };
    match automation {
        Some(automation) => {
            let _ = write!(expr, ".gain({})", automation.gain);
            if !layer.is_drum() {
                let _ = write!(expr, ".lpf({})", automation.lpf);
            }
        }
        None => {
            let _ = write!(expr, ".gain({})", render.gain);
            if !layer.is_drum() && render.lpf > 0 {
                let _ = write!(expr, ".lpf({})", render.lpf);
            }
        }
    }
    expr
}

/// `0` beats rest, `k` beats repeat the sound `k` times: `"bd [bd bd] ~"`
pub fn drum_pattern(rhythm: &Rhythm, sound: &str) -> String {
    rhythm
        .beats()
        .iter()
        .map(|&digit| match digit {
            0 => "~".to_string(),
            1 => sound.to_string(),
            k => format!("[{}]", vec![sound; k as usize].join(" ")),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scale degree of a pitch relative to `base_octave`. Pitches outside the
/// scale fall to the nearest step below; an empty scale counts semitones.
pub fn scale_degree(pitch: PitchClass, octave: u8, scale: &[PitchClass], base_octave: u8) -> i32 {
    let octave_offset = octave as i32 - base_octave as i32;
    if scale.is_empty() {
        return octave_offset * 12 + pitch.semitone() as i32;
    }
    let semitone = pitch.semitone();
    let step = scale
        .iter()
        .enumerate()
        .filter(|(_, pc)| relative(pc.semitone(), scale[0]) <= relative(semitone, scale[0]))
        .map(|(idx, _)| idx)
        .last()
        .unwrap_or(0);
    octave_offset * scale.len() as i32 + step as i32
}

fn relative(semitone: u8, root: PitchClass) -> u8 {
    (semitone + 12 - root.semitone()) % 12
}

/// Beat-grouped scale degrees: `"[0 2] 4 ~ [1 3 5]"`
pub fn melody_pattern(melody: &Melody, scale: &[PitchClass], base_octave: u8) -> String {
    melody
        .beats()
        .into_iter()
        .map(|beat| {
            let tokens: Vec<String> = beat
                .iter()
                .map(|note| match note.pitch {
                    Pitch::Rest => "~".to_string(),
                    Pitch::Tone(pc) => scale_degree(pc, note.octave, scale, base_octave).to_string(),
                })
                .collect();
            if tokens.len() == 1 {
                tokens.into_iter().next().unwrap_or_default()
            } else {
                format!("[{}]", tokens.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stacked degrees per chord: `"[0, 2, 4] [3, 5, 0]"`
pub fn chord_pattern(progression: &ChordProgression) -> String {
    progression
        .chords
        .iter()
        .map(|chord| {
            let degrees: Vec<String> = chord.degrees().iter().map(u8::to_string).collect();
            format!("[{}]", degrees.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::composition::{LayerRole, RenderMetadata};
    use crate::engines::generation::Chord;
    use crate::types::{Duration, Note};
    use std::sync::Arc;

    fn c_major() -> Vec<PitchClass> {
        parse_scale("c:major").unwrap()
    }

    #[test]
    fn test_drum_pattern() {
        let rhythm: Rhythm = "1203".parse().unwrap();
        assert_eq!(drum_pattern(&rhythm, "bd"), "bd [bd bd] ~ [bd bd bd]");
    }

    #[test]
    fn test_chord_degrees() {
        let progression = ChordProgression {
            chords: vec![
                Chord {
                    root_degree: 0,
                    intervals: vec![0, 4, 7],
                },
                Chord {
                    root_degree: 5,
                    intervals: vec![0, 3, 7, 10],
                },
            ],
        };
        assert_eq!(chord_pattern(&progression), "[0, 2, 4] [5, 0, 2, 4]");
    }

    #[test]
    fn test_scale_degrees_follow_octave() {
        let scale = c_major();
        assert_eq!(scale_degree(PitchClass::G, 4, &scale, 4), 4);
        assert_eq!(scale_degree(PitchClass::C, 5, &scale, 4), 7);
        assert_eq!(scale_degree(PitchClass::B, 3, &scale, 4), -1);
        // F# is not in C major and falls to F
        assert_eq!(scale_degree(PitchClass::Fs, 4, &scale, 4), 3);
    }

    #[test]
    fn test_melody_pattern_groups_beats() {
        let rhythm = Arc::new("201".parse::<Rhythm>().unwrap());
        let source = vec![
            Note::tone(PitchClass::C, 4, Duration::WHOLE_BEAT),
            Note::tone(PitchClass::E, 4, Duration::WHOLE_BEAT),
            Note::tone(PitchClass::G, 4, Duration::WHOLE_BEAT),
        ];
        let melody = Melody::reconcile(&source, rhythm, 4);
        assert_eq!(melody_pattern(&melody, &c_major(), 4), "[0 2] ~ 4");
    }

    #[test]
    fn test_render_composition_lines() {
        let layer = Layer {
            name: "kick".to_string(),
            role: LayerRole::Drums,
            context_group: None,
            genome: LayerGenome::Drum {
                rhythm: "1010".parse().unwrap(),
            },
            render: RenderMetadata {
                drum_sound: "bd".to_string(),
                gain: 0.8,
                ..RenderMetadata::default()
            },
        };
        let composition = Composition {
            bpm: 120,
            scale: "c:major".to_string(),
            layers: vec![layer],
        };
        let text = StrudelRenderer::default().render_composition(&composition);
        assert!(text.starts_with("setcpm(30)"));
        assert!(text.contains("$: sound(\"bd ~ bd ~\").gain(0.8)"));
    }

    #[test]
    fn test_song_dynamics_become_per_section_patterns() {
        use crate::config::section::SectionKind;
        use crate::engines::composition::EvolvedSection;

        let kick = Layer {
            name: "kick".to_string(),
            role: LayerRole::Drums,
            context_group: None,
            genome: LayerGenome::Drum {
                rhythm: "1010".parse().unwrap(),
            },
            render: RenderMetadata {
                drum_sound: "bd".to_string(),
                ..RenderMetadata::default()
            },
        };
        let section = |kind, dynamics| EvolvedSection {
            kind,
            bars: 4,
            energy_level: 0.5,
            layers: vec![kick.clone()],
            dynamics,
        };
        let chorus_dynamics = LayerDynamics {
            layer: "kick".to_string(),
            gain: Envelope::from_values(&[0.8, 0.9, 1.0]).unwrap(),
            lpf: Envelope::from_values(&[6000.0, 8000.0, 10000.0]).unwrap(),
            fitness: 0.9,
        };
        let song = Song {
            bpm: 120,
            scale: "c:major".to_string(),
            structure: vec![SectionKind::Verse, SectionKind::Chorus],
            sections: vec![
                section(SectionKind::Verse, Vec::new()),
                section(SectionKind::Chorus, vec![chorus_dynamics]),
            ],
            themes: Default::default(),
        };

        let text = StrudelRenderer::default().render_song(&song);
        assert!(text.contains("sound(\"<[bd ~ bd ~] [bd ~ bd ~]>\").gain(\"<0.5 [0.80 0.90 1.00]>\")"));
        assert!(!text.contains(".lpf("));
    }
}
