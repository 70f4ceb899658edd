use crate::engines::generation::operators::{mutate_genes, single_point_crossover};
use crate::engines::generation::rhythm::Rhythm;
use crate::types::{Duration, Note, Pitch, PitchClass, MAX_OCTAVE, MIN_OCTAVE};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A free-standing note list with no rhythm attached.
///
/// Raw operators work on phrases; turning one into a [`Melody`] always goes
/// through [`Melody::reconcile`].
pub type Phrase = Vec<Note>;

/// Pitch material a melody may draw from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyParams {
    /// Allowed pitch classes; empty means the full chromatic set
    pub scale: Vec<PitchClass>,
    /// Inclusive octave range
    pub octave_range: (u8, u8),
}

impl Default for MelodyParams {
    fn default() -> Self {
        Self {
            scale: Vec::new(),
            octave_range: (4, 5),
        }
    }
}

impl MelodyParams {
    fn random_pitch<R: Rng>(&self, rng: &mut R) -> PitchClass {
        self.scale
            .choose(rng)
            .copied()
            .unwrap_or_else(|| PitchClass::ALL[rng.gen_range(0..PitchClass::ALL.len())])
    }

    fn random_octave<R: Rng>(&self, rng: &mut R) -> u8 {
        let (low, high) = self.octave_range;
        rng.gen_range(low.min(high)..=high.max(low))
    }
}

/// A melody genome bound to the rhythm that governs it.
///
/// Invariant: one full-beat rest per zero digit, and for a digit `k` exactly
/// `k` sounding notes of duration `1/k`. Every constructor upholds it, so a
/// melody can never drift out of step with its rhythm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Melody {
    rhythm: Arc<Rhythm>,
    notes: Vec<Note>,
}

impl Melody {
    /// Expand a rhythm into a melody with random pitches and octaves
    pub fn random<R: Rng>(rhythm: Arc<Rhythm>, params: &MelodyParams, rng: &mut R) -> Self {
        let mut notes = Vec::with_capacity(rhythm.note_count() + rhythm.len());
        for &digit in rhythm.beats() {
            if digit == 0 {
                notes.push(Note::rest(Duration::WHOLE_BEAT));
                continue;
            }
            let duration = Duration::subdivision(digit);
            for _ in 0..digit {
                notes.push(Note::tone(
                    params.random_pitch(rng),
                    params.random_octave(rng),
                    duration,
                ));
            }
        }
        Self { rhythm, notes }
    }

    /// Snap an arbitrary note list onto `rhythm`.
    ///
    /// Pitches and octaves of the source's sounding notes are laid onto the
    /// rhythm's slots in order, wrapping when the source runs short. A source
    /// without sounding notes fills every slot with C at `fallback_octave`.
    pub fn reconcile(source: &[Note], rhythm: Arc<Rhythm>, fallback_octave: u8) -> Self {
        let pitched: Vec<&Note> = source.iter().filter(|n| !n.is_rest()).collect();
        let mut cursor = 0usize;
        let mut notes = Vec::with_capacity(rhythm.note_count() + rhythm.len());

        for &digit in rhythm.beats() {
            if digit == 0 {
                notes.push(Note::rest(Duration::WHOLE_BEAT));
                continue;
            }
            let duration = Duration::subdivision(digit);
            for _ in 0..digit {
                let note = if pitched.is_empty() {
                    Note::tone(PitchClass::C, fallback_octave, duration)
                } else {
                    let src = pitched[cursor % pitched.len()];
                    Note {
                        pitch: src.pitch,
                        octave: src.octave,
                        duration,
                    }
                };
                cursor += 1;
                notes.push(note);
            }
        }

        Self { rhythm, notes }
    }

    /// Mutate the sounding notes, then re-snap to the governing rhythm
    pub fn mutate<R: Rng>(&self, mutation_rate: f64, params: &MelodyParams, rng: &mut R) -> Self {
        let raw = mutate_phrase(&self.notes, mutation_rate, params, rng);
        Self::reconcile(&raw, Arc::clone(&self.rhythm), params.octave_range.0)
    }

    /// Cross note lists, then re-snap the child to this melody's rhythm
    pub fn crossover<R: Rng>(&self, other: &Self, params: &MelodyParams, rng: &mut R) -> Self {
        let raw = crossover_phrase(&self.notes, &other.notes, rng);
        Self::reconcile(&raw, Arc::clone(&self.rhythm), params.octave_range.0)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn rhythm(&self) -> &Rhythm {
        &self.rhythm
    }

    pub fn shared_rhythm(&self) -> Arc<Rhythm> {
        Arc::clone(&self.rhythm)
    }

    pub fn sounding_notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(|n| !n.is_rest())
    }

    /// Notes grouped by the beat they fall in
    pub fn beats(&self) -> Vec<&[Note]> {
        let mut groups = Vec::with_capacity(self.rhythm.len());
        let mut offset = 0usize;
        for &digit in self.rhythm.beats() {
            let width = (digit as usize).max(1);
            let end = (offset + width).min(self.notes.len());
            groups.push(&self.notes[offset..end]);
            offset = end;
        }
        groups
    }

    /// Re-check the rhythm invariant
    pub fn is_consistent(&self) -> bool {
        if self.sounding_notes().count() != self.rhythm.note_count() {
            return false;
        }
        let mut notes = self.notes.iter();
        self.rhythm.beats().iter().all(|&digit| {
            if digit == 0 {
                matches!(notes.next(), Some(n) if n.is_rest() && n.duration == Duration::WHOLE_BEAT)
            } else {
                let expected = Duration::subdivision(digit);
                (0..digit).all(|_| {
                    matches!(notes.next(), Some(n) if !n.is_rest() && n.duration == expected)
                })
            }
        }) && notes.next().is_none()
    }
}

/// Perturb one aspect of a note: pitch, octave (+-1, clamped) or duration.
///
/// A duration change only survives in raw phrases; [`Melody::reconcile`]
/// resets every duration from the rhythm.
pub fn mutate_note<R: Rng>(note: &Note, params: &MelodyParams, rng: &mut R) -> Note {
    let mut mutated = *note;
    match rng.gen_range(0..3) {
        0 => mutated.pitch = Pitch::Tone(params.random_pitch(rng)),
        1 => {
            let step: i16 = if rng.gen_bool(0.5) { 1 } else { -1 };
            let octave = (note.octave as i16 + step).clamp(MIN_OCTAVE as i16, MAX_OCTAVE as i16);
            mutated.octave = octave as u8;
        }
        _ => {
            if let Some(duration) = Duration::MUTATION_CHOICES.choose(rng) {
                mutated.duration = *duration;
            }
        }
    }
    mutated
}

/// Raw phrase mutation. Rests belong to the rhythm and are left untouched.
/// The result is not rhythm-aligned until reconciled.
pub fn mutate_phrase<R: Rng>(
    phrase: &[Note],
    mutation_rate: f64,
    params: &MelodyParams,
    rng: &mut R,
) -> Phrase {
    mutate_genes(phrase, mutation_rate, rng, |note, rng| {
        if note.is_rest() {
            *note
        } else {
            mutate_note(note, params, rng)
        }
    })
}

/// Raw single-point phrase crossover. The result is not rhythm-aligned until
/// reconciled.
pub fn crossover_phrase<R: Rng>(parent1: &[Note], parent2: &[Note], rng: &mut R) -> Phrase {
    single_point_crossover(parent1, parent2, rng)
}
