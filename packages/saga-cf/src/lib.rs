//! Implicit-feedback matrix factorization.
//!
//! Trains latent item/user factors from a sparse item×user interaction
//! matrix by alternating least squares with the usual confidence weighting
//! (`c = 1 + r` for an observed interaction of weight `r`). The fit is
//! deterministic for a given seed, which keeps snapshot rebuilds and tests
//! reproducible.

mod matrix;

pub use matrix::ItemUserMatrix;

use std::cmp::Ordering;

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, rngs::StdRng};

#[derive(Clone, Copy, Debug)]
pub struct CfParams {
	pub factors: usize,
	pub iterations: usize,
	pub regularization: f32,
	pub seed: u64,
}

impl Default for CfParams {
	fn default() -> Self {
		Self { factors: 64, iterations: 15, regularization: 0.01, seed: 42 }
	}
}

#[derive(Clone, Debug)]
pub struct CfModel {
	item_factors: Array2<f32>,
	user_factors: Array2<f32>,
}

impl CfModel {
	/// Scores every item for the given user column and returns the `top_k`
	/// best, descending, ties broken by lower item id. With `exclude_known`
	/// the user's own training items are filtered out first.
	pub fn recommend(
		&self,
		user_col: usize,
		matrix: &ItemUserMatrix,
		top_k: usize,
		exclude_known: bool,
	) -> Vec<(usize, f32)> {
		if user_col >= self.user_factors.nrows() {
			return Vec::new();
		}

		let user_vec = self.user_factors.row(user_col);
		let known = matrix.user_items(user_col);
		let mut scored: Vec<(usize, f32)> = (0..self.item_factors.nrows())
			.filter(|item| !exclude_known || !known.iter().any(|(i, _)| i == item))
			.map(|item| (item, self.item_factors.row(item).dot(&user_vec)))
			.collect();

		scored.sort_by(|a, b| {
			b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0))
		});
		scored.truncate(top_k);

		scored
	}
}

/// Alternating least squares over the confidence-weighted implicit matrix.
pub fn fit(matrix: &ItemUserMatrix, params: &CfParams) -> CfModel {
	let factors = params.factors.max(1);
	let mut rng = StdRng::seed_from_u64(params.seed);
	let mut item_factors = init_factors(&mut rng, matrix.n_items(), factors);
	let mut user_factors = init_factors(&mut rng, matrix.n_users(), factors);

	for _ in 0..params.iterations {
		solve_side(
			&mut user_factors,
			&item_factors,
			|col| matrix.user_items(col),
			params.regularization,
		);
		solve_side(
			&mut item_factors,
			&user_factors,
			|row| matrix.item_users(row),
			params.regularization,
		);
	}

	CfModel { item_factors, user_factors }
}

fn init_factors(rng: &mut StdRng, rows: usize, factors: usize) -> Array2<f32> {
	Array2::from_shape_fn((rows, factors), |_| rng.gen_range(-0.01..0.01))
}

/// Solves one half of the alternation: for every row of `target`, a ridge
/// system `(FᵀF + Σ(c−1)f fᵀ + λI) x = Σ c·f` over the fixed side's
/// factors, where the sums run over that row's observed entries.
fn solve_side<'a, F>(
	target: &mut Array2<f32>,
	fixed: &Array2<f32>,
	observed: F,
	regularization: f32,
) where
	F: Fn(usize) -> &'a [(usize, f32)],
{
	let factors = fixed.ncols();
	let gram = fixed.t().dot(fixed);

	for row in 0..target.nrows() {
		let entries = observed(row);

		if entries.is_empty() {
			continue;
		}

		let mut a = gram.clone();
		let mut b = Array1::<f32>::zeros(factors);

		for idx in 0..factors {
			a[(idx, idx)] += regularization;
		}

		for (other, weight) in entries {
			let confidence = 1.0 + weight;
			let vec = fixed.row(*other);

			for i in 0..factors {
				b[i] += confidence * vec[i];

				for j in 0..factors {
					a[(i, j)] += (confidence - 1.0) * vec[i] * vec[j];
				}
			}
		}

		let solution = solve_spd(a, b);

		for (idx, value) in solution.iter().enumerate() {
			target[(row, idx)] = *value;
		}
	}
}

/// Cholesky solve for the symmetric positive definite ridge systems above.
fn solve_spd(mut a: Array2<f32>, mut b: Array1<f32>) -> Array1<f32> {
	let n = b.len();

	for j in 0..n {
		let diag =
			(a[(j, j)] - (0..j).map(|k| a[(j, k)] * a[(j, k)]).sum::<f32>()).max(1e-9).sqrt();

		a[(j, j)] = diag;

		for i in j + 1..n {
			let sum = (0..j).map(|k| a[(i, k)] * a[(j, k)]).sum::<f32>();

			a[(i, j)] = (a[(i, j)] - sum) / diag;
		}
	}

	for i in 0..n {
		let sum = (0..i).map(|k| a[(i, k)] * b[k]).sum::<f32>();

		b[i] = (b[i] - sum) / a[(i, i)];
	}

	for i in (0..n).rev() {
		let sum = (i + 1..n).map(|k| a[(k, i)] * b[k]).sum::<f32>();

		b[i] = (b[i] - sum) / a[(i, i)];
	}

	b
}

#[cfg(test)]
mod tests {
	use super::*;

	fn two_cluster_matrix() -> ItemUserMatrix {
		// Users 0-1 like items 0-2, users 2-3 like items 3-5.
		let triplets = vec![
			(0, 0, 3.0),
			(1, 0, 2.0),
			(0, 1, 2.0),
			(1, 1, 3.0),
			(2, 1, 1.0),
			(3, 2, 3.0),
			(4, 2, 2.0),
			(3, 3, 2.0),
			(4, 3, 3.0),
			(5, 3, 1.0),
		];

		ItemUserMatrix::from_triplets(6, 4, triplets)
	}

	fn test_params() -> CfParams {
		CfParams { factors: 8, iterations: 20, regularization: 0.1, seed: 7 }
	}

	#[test]
	fn recommend_prefers_in_cluster_items() {
		let matrix = two_cluster_matrix();
		let model = fit(&matrix, &test_params());
		// User 0 interacted with items 0 and 1 only; item 2 belongs to the
		// same cluster and must outrank every item from the other cluster.
		let recs = model.recommend(0, &matrix, 4, true);

		assert!(!recs.is_empty());
		assert_eq!(recs[0].0, 2);
	}

	#[test]
	fn recommend_excludes_known_items() {
		let matrix = two_cluster_matrix();
		let model = fit(&matrix, &test_params());
		let recs = model.recommend(0, &matrix, 10, true);

		for (item, _) in &recs {
			assert!(*item != 0 && *item != 1);
		}
	}

	#[test]
	fn recommend_respects_top_k_and_ordering() {
		let matrix = two_cluster_matrix();
		let model = fit(&matrix, &test_params());
		let recs = model.recommend(2, &matrix, 2, false);

		assert_eq!(recs.len(), 2);
		assert!(recs[0].1 >= recs[1].1);
	}

	#[test]
	fn fit_is_deterministic_for_a_seed() {
		let matrix = two_cluster_matrix();
		let first = fit(&matrix, &test_params());
		let second = fit(&matrix, &test_params());

		assert_eq!(first.recommend(1, &matrix, 6, false), second.recommend(1, &matrix, 6, false));
	}

	#[test]
	fn unknown_user_column_yields_nothing() {
		let matrix = two_cluster_matrix();
		let model = fit(&matrix, &test_params());

		assert!(model.recommend(99, &matrix, 5, true).is_empty());
	}
}
