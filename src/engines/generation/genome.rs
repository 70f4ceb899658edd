/// A genome plus its cached fitness.
///
/// Three genome kinds are evolved:
/// - [`Rhythm`](super::rhythm::Rhythm): per-beat subdivision digits
/// - [`Melody`](super::melody::Melody): notes bound to a governing rhythm
/// - [`ChordProgression`](super::chord::ChordProgression): root/interval pairs
///
/// The engine never looks inside a genome. It only clones it, hands it to the
/// caller's fitness, mutation and crossover functions, and orders individuals
/// by `fitness`, which is recomputed at the start of every generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual<T> {
    pub genome: T,
    pub fitness: f64,
}

impl<T> Individual<T> {
    /// A freshly created individual awaiting its first evaluation
    pub fn new(genome: T) -> Self {
        Self {
            genome,
            fitness: 0.0,
        }
    }
}

pub type Population<T> = Vec<Individual<T>>;
