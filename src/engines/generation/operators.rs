use crate::engines::generation::genome::Individual;
use rand::seq::index;
use rand::Rng;

/// Contestants drawn per tournament
pub const TOURNAMENT_SIZE: usize = 3;

/// Tournament selection: best of `min(3, len)` distinct random contestants
pub fn tournament_selection<'a, T, R: Rng>(
    population: &'a [Individual<T>],
    rng: &mut R,
) -> &'a Individual<T> {
    let size = TOURNAMENT_SIZE.min(population.len());
    let mut contestants = index::sample(rng, population.len(), size).into_iter();

    let mut best = &population[contestants.next().unwrap_or(0)];
    for idx in contestants {
        if population[idx].fitness > best.fitness {
            best = &population[idx];
        }
    }
    best
}

/// Single-point crossover over two gene lists, producing one child.
///
/// The cut lands in `[1, min_len - 1]`; the child takes the first parent's
/// prefix and the second parent's suffix, truncated to the shorter parent.
/// Parents shorter than two genes yield a copy of the first parent.
pub fn single_point_crossover<T: Clone, R: Rng>(
    parent1: &[T],
    parent2: &[T],
    rng: &mut R,
) -> Vec<T> {
    let len = parent1.len().min(parent2.len());
    if len < 2 {
        return parent1.to_vec();
    }

    let point = rng.gen_range(1..len);
    crossover_at(parent1, parent2, point)
}

/// Crossover with an explicit cut point, clamped to `[1, min_len - 1]`
pub fn crossover_at<T: Clone>(parent1: &[T], parent2: &[T], point: usize) -> Vec<T> {
    let len = parent1.len().min(parent2.len());
    if len < 2 {
        return parent1.to_vec();
    }

    let point = point.clamp(1, len - 1);
    let mut child = Vec::with_capacity(len);
    child.extend_from_slice(&parent1[..point]);
    child.extend_from_slice(&parent2[point..len]);
    child
}

/// Rate-gated per-gene mutation: each gene is replaced by `reroll` with
/// probability `mutation_rate`
pub fn mutate_genes<T: Clone, R: Rng, F>(
    genes: &[T],
    mutation_rate: f64,
    rng: &mut R,
    mut reroll: F,
) -> Vec<T>
where
    F: FnMut(&T, &mut R) -> T,
{
    genes
        .iter()
        .map(|gene| {
            if rng.gen::<f64>() < mutation_rate {
                reroll(gene, rng)
            } else {
                gene.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_crossover_truncates_to_shorter_parent() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = vec![1, 1, 1, 1, 1, 1];
        let b = vec![2, 2, 2, 2];
        for _ in 0..50 {
            let child = single_point_crossover(&a, &b, &mut rng);
            assert_eq!(child.len(), 4);
            assert_eq!(child[0], 1);
            assert_eq!(child[3], 2);
        }
    }

    #[test]
    fn test_crossover_degenerate_returns_first_parent() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(single_point_crossover(&[5], &[9], &mut rng), vec![5]);
        assert_eq!(single_point_crossover(&[5, 6, 7], &[9], &mut rng), vec![5, 6, 7]);
    }

    #[test]
    fn test_crossover_at_forced_point() {
        let child = crossover_at(&['a', 'b', 'c', 'd'], &['w', 'x', 'y', 'z'], 2);
        assert_eq!(child, vec!['a', 'b', 'y', 'z']);
    }

    #[test]
    fn test_tournament_picks_best_when_population_small() {
        let mut rng = StdRng::seed_from_u64(1);
        let population = vec![
            Individual { genome: 'a', fitness: 0.1 },
            Individual { genome: 'b', fitness: 0.9 },
            Individual { genome: 'c', fitness: 0.5 },
        ];
        // With three individuals every tournament sees all of them
        for _ in 0..20 {
            assert_eq!(tournament_selection(&population, &mut rng).genome, 'b');
        }
    }

    #[test]
    fn test_mutate_genes_rate_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let genes = vec![0u8; 32];
        assert_eq!(mutate_genes(&genes, 0.0, &mut rng, |_, _| 1), genes);
        assert!(mutate_genes(&genes, 1.0, &mut rng, |_, _| 1).iter().all(|g| *g == 1));
    }
}
