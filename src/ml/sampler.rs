// ============================================================
// Layer 5 — Token Sampler
// ============================================================
// Picks the next token from a row of logits.
//
// Greedy:   argmax — fully deterministic.
// Sampling: the Hugging Face recipe used for the summaries:
//
//   1. divide logits by the temperature
//   2. softmax
//   3. nucleus (top-p) filter: keep the most likely tokens until
//      their cumulative probability reaches top_p (the token that
//      crosses the threshold is kept, so at least one survives)
//   4. draw from the renormalised distribution
//
// Sampling is reproducible when the sampler is seeded.
//
// Reference: Holtzman et al. (2020) The Curious Case of Neural
//            Text Degeneration (nucleus sampling)

use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
    SeedableRng,
};

/// How the next token is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    Greedy,
    TopP { temperature: f32, top_p: f32 },
}

pub struct Sampler {
    strategy: Sampling,
    rng:      StdRng,
}

impl Sampler {
    /// A sampler seeded with `seed`, or from OS entropy when `None`.
    pub fn new(strategy: Sampling, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        Self { strategy, rng }
    }

    pub fn sample(&mut self, logits: &[f32]) -> u32 {
        match self.strategy {
            Sampling::Greedy => argmax(logits),
            Sampling::TopP { temperature, top_p } => {
                let probs = nucleus(logits, temperature, top_p);
                match WeightedIndex::new(probs.iter().map(|&(_, p)| p)) {
                    Ok(dist) => probs[dist.sample(&mut self.rng)].0,
                    // NaN or all-zero weights
                    Err(_)   => argmax(logits),
                }
            }
        }
    }
}

fn argmax(logits: &[f32]) -> u32 {
    logits
        .iter()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0 as u32
}

/// Renormalised (token, probability) pairs surviving the top-p filter,
/// most likely first.
fn nucleus(logits: &[f32], temperature: f32, top_p: f32) -> Vec<(u32, f32)> {
    let temperature = temperature.max(1e-5);
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    let mut probs: Vec<(u32, f32)> = logits
        .iter()
        .enumerate()
        .map(|(i, &l)| (i as u32, ((l - max) / temperature).exp()))
        .collect();
    let total: f32 = probs.iter().map(|(_, p)| p).sum();
    probs.iter_mut().for_each(|(_, p)| *p /= total);

    probs.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut cumulative = 0.0;
    let mut keep = 0;
    for (_, p) in &probs {
        cumulative += p;
        keep += 1;
        if cumulative >= top_p {
            break;
        }
    }
    probs.truncate(keep.max(1));

    let kept: f32 = probs.iter().map(|(_, p)| p).sum();
    probs.iter_mut().for_each(|(_, p)| *p /= kept);
    probs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy_picks_max() {
        let mut s = Sampler::new(Sampling::Greedy, None);
        assert_eq!(s.sample(&[0.1, 2.0, -1.0, 1.9]), 1);
    }

    #[test]
    fn test_nucleus_keeps_threshold_token() {
        // softmax at T=1 of ln(probabilities) gives the probabilities back
        let logits: Vec<f32> = [0.5f32, 0.3, 0.15, 0.05].iter().map(|p| p.ln()).collect();
        let kept = nucleus(&logits, 1.0, 0.7);
        let ids: Vec<u32> = kept.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1]);
        let total: f32 = kept.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_draws_stay_inside_the_nucleus() {
        let logits: Vec<f32> = [0.5f32, 0.3, 0.15, 0.05].iter().map(|p| p.ln()).collect();
        let mut s = Sampler::new(Sampling::TopP { temperature: 1.0, top_p: 0.7 }, Some(11));
        let draws: Vec<u32> = (0..200).map(|_| s.sample(&logits)).collect();
        assert!(draws.iter().all(|&id| id < 2), "{draws:?}");
        assert!(draws.contains(&0) && draws.contains(&1));
    }

    #[test]
    fn test_tiny_top_p_is_greedy() {
        let mut s = Sampler::new(Sampling::TopP { temperature: 0.7, top_p: 1e-6 }, None);
        for _ in 0..20 {
            assert_eq!(s.sample(&[0.0, 3.0, 1.0]), 1);
        }
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let logits = vec![0.0; 50];
        let strategy = Sampling::TopP { temperature: 0.7, top_p: 0.9 };
        let mut a = Sampler::new(strategy, Some(7));
        let mut b = Sampler::new(strategy, Some(7));
        let xs: Vec<u32> = (0..32).map(|_| a.sample(&logits)).collect();
        let ys: Vec<u32> = (0..32).map(|_| b.sample(&logits)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_sampling_varies_without_seed_pinning() {
        let logits = vec![0.0; 50];
        let strategy = Sampling::TopP { temperature: 1.0, top_p: 1.0 };
        let mut a = Sampler::new(strategy, Some(1));
        let mut b = Sampler::new(strategy, Some(2));
        let xs: Vec<u32> = (0..32).map(|_| a.sample(&logits)).collect();
        let ys: Vec<u32> = (0..32).map(|_| b.sample(&logits)).collect();
        assert_ne!(xs, ys);
    }
}
