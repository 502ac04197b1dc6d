//! Derivative-free minimization for detector model fitting.

/// Outcome of a simplex minimization.
#[derive(Debug, Clone)]
pub struct SimplexOutcome {
    /// Best point found.
    pub point: Vec<f64>,
    /// Objective value at the best point.
    pub value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the vertex spread fell below tolerance.
    pub converged: bool,
}

/// Nelder-Mead settings. Defaults follow the standard coefficients
/// (reflection 1.0, expansion 2.0, contraction 0.5, shrink 0.5).
#[derive(Debug, Clone)]
pub struct SimplexConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub initial_step: f64,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-8,
            initial_step: 0.05,
        }
    }
}

const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Minimize `objective` with the Nelder-Mead simplex, optionally
/// clamping every candidate point to per-dimension `bounds`.
pub fn simplex_minimize<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &SimplexConfig,
) -> SimplexOutcome
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return SimplexOutcome {
            point: vec![],
            value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(clamp(initial.to_vec(), bounds));
    for i in 0..n {
        let mut vertex = initial.to_vec();
        let step = if initial[i].abs() > 1e-10 {
            config.initial_step * initial[i].abs()
        } else {
            config.initial_step
        };
        vertex[i] += step;
        simplex.push(clamp(vertex, bounds));
    }

    let mut values: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        if values[worst] - values[best] < config.tolerance {
            converged = true;
            break;
        }

        // Centroid of all vertices except the worst.
        let mut centroid = vec![0.0; n];
        for (i, vertex) in simplex.iter().enumerate() {
            if i == worst {
                continue;
            }
            for (c, x) in centroid.iter_mut().zip(vertex.iter()) {
                *c += x;
            }
        }
        for c in &mut centroid {
            *c /= n as f64;
        }

        let reflected = clamp(blend(&centroid, &simplex[worst], -ALPHA), bounds);
        let reflected_value = objective(&reflected);

        if reflected_value < values[second_worst] && reflected_value >= values[best] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        if reflected_value < values[best] {
            let expanded = clamp(blend(&centroid, &reflected, GAMMA), bounds);
            let expanded_value = objective(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        let toward = if reflected_value < values[worst] {
            &reflected
        } else {
            &simplex[worst]
        };
        let contracted = clamp(blend(&centroid, toward, RHO), bounds);
        let contracted_value = objective(&contracted);
        if contracted_value < values[worst].min(reflected_value) {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        // Shrink toward the best vertex.
        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i == best {
                continue;
            }
            for j in 0..n {
                simplex[i][j] = anchor[j] + SIGMA * (simplex[i][j] - anchor[j]);
            }
            simplex[i] = clamp(std::mem::take(&mut simplex[i]), bounds);
            values[i] = objective(&simplex[i]);
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    SimplexOutcome {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    }
}

/// Point on the line through `from` in the direction of `to`;
/// `t = 1` lands on `to`, negative `t` reflects through `from`.
fn blend(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter()
        .zip(to.iter())
        .map(|(f, x)| f + t * (x - f))
        .collect()
}

fn clamp(mut point: Vec<f64>, bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    if let Some(bounds) = bounds {
        for (x, (lo, hi)) in point.iter_mut().zip(bounds.iter()) {
            *x = x.clamp(*lo, *hi);
        }
    }
    point
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_quadratic_bowl() {
        let outcome = simplex_minimize(
            |x| (x[0] - 2.0).powi(2) + (x[1] + 3.0).powi(2),
            &[0.0, 0.0],
            None,
            &SimplexConfig::default(),
        );

        assert!(outcome.converged);
        assert!((outcome.point[0] - 2.0).abs() < 0.01);
        assert!((outcome.point[1] + 3.0).abs() < 0.01);
    }

    #[test]
    fn respects_bounds() {
        let outcome = simplex_minimize(
            |x| (x[0] - 5.0).powi(2),
            &[0.0],
            Some(&[(-1.0, 1.0)]),
            &SimplexConfig::default(),
        );

        assert!(outcome.point[0] <= 1.0 + 1e-12);
        assert!((outcome.point[0] - 1.0).abs() < 0.05);
    }

    #[test]
    fn empty_input_does_not_iterate() {
        let outcome = simplex_minimize(|_| 0.0, &[], None, &SimplexConfig::default());
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 0);
    }
}
