//! Candidate Combiner: enumerates the guideline sets worth trying.

use std::collections::BTreeSet;

use crate::models::{Guideline, GuidelineId, GuidelinePool, GuidelineSet};

/// Candidate sets in a fixed order:
///
/// 1. the empty baseline;
/// 2. every guideline alone, metrics first;
/// 3. every same-kind pair, metric pairs first;
/// 4. all metrics, then all constraints;
/// 5. the whole pool.
///
/// A set whose ids were already emitted is skipped, so the baseline is always
/// the first candidate and never repeated.
pub fn combine_candidates(pool: &GuidelinePool) -> Vec<GuidelineSet> {
    let mut combiner = Combiner::default();

    combiner.push(Vec::new());

    for g in pool.metrics.iter().chain(&pool.constraints) {
        combiner.push(vec![g.clone()]);
    }

    for kind in [&pool.metrics, &pool.constraints] {
        for (i, a) in kind.iter().enumerate() {
            for b in &kind[i + 1..] {
                combiner.push(vec![a.clone(), b.clone()]);
            }
        }
    }

    combiner.push(pool.metrics.clone());
    combiner.push(pool.constraints.clone());
    combiner.push(pool.metrics.iter().chain(&pool.constraints).cloned().collect());

    combiner.candidates
}

#[derive(Default)]
struct Combiner {
    seen: BTreeSet<BTreeSet<GuidelineId>>,
    candidates: Vec<GuidelineSet>,
}

impl Combiner {
    fn push(&mut self, guidelines: Vec<Guideline>) {
        let set = GuidelineSet::new(guidelines);
        if self.seen.insert(set.identity()) {
            self.candidates.push(set);
        }
    }
}
