use rayon::prelude::*;

use crate::api::{Derivatives, Evaluator};
use crate::error::Result;

impl Evaluator<'_> {
    /// Parallel [`Evaluator::evaluate_batch`]: one workspace per rayon worker,
    /// the graph and plan shared read-only.
    pub fn evaluate_batch_par<P: AsRef<[f64]> + Sync>(&self, points: &[P]) -> Result<Vec<Derivatives>> {
        points
            .par_iter()
            .map_init(|| self.workspace(), |ws, x| self.evaluate_with(x.as_ref(), ws))
            .collect()
    }
}
