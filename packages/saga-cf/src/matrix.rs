/// Sparse item×user interaction matrix, kept as per-item and per-user
/// adjacency so both halves of the alternation read their own side
/// directly. Duplicate (item, user) pairs keep the larger weight.
#[derive(Clone, Debug)]
pub struct ItemUserMatrix {
	n_items: usize,
	n_users: usize,
	by_item: Vec<Vec<(usize, f32)>>,
	by_user: Vec<Vec<(usize, f32)>>,
	nnz: usize,
}

impl ItemUserMatrix {
	/// Builds from `(item, user, weight)` triplets. Out-of-range ids and
	/// non-positive weights are dropped, matching the training contract:
	/// only positive implicit signal enters the factorization.
	pub fn from_triplets(
		n_items: usize,
		n_users: usize,
		triplets: Vec<(usize, usize, f32)>,
	) -> Self {
		let mut by_item: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n_items];
		let mut by_user: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n_users];
		let mut nnz = 0;

		for (item, user, weight) in triplets {
			if item >= n_items || user >= n_users || weight <= 0.0 {
				continue;
			}

			if let Some(entry) = by_item[item].iter_mut().find(|(u, _)| *u == user) {
				entry.1 = entry.1.max(weight);

				if let Some(mirror) = by_user[user].iter_mut().find(|(i, _)| *i == item) {
					mirror.1 = mirror.1.max(weight);
				}

				continue;
			}

			by_item[item].push((user, weight));
			by_user[user].push((item, weight));
			nnz += 1;
		}

		Self { n_items, n_users, by_item, by_user, nnz }
	}

	pub fn n_items(&self) -> usize {
		self.n_items
	}

	pub fn n_users(&self) -> usize {
		self.n_users
	}

	/// Number of stored (item, user) pairs.
	pub fn nnz(&self) -> usize {
		self.nnz
	}

	pub fn item_users(&self, item: usize) -> &[(usize, f32)] {
		self.by_item.get(item).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn user_items(&self, user: usize) -> &[(usize, f32)] {
		self.by_user.get(user).map(Vec::as_slice).unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drops_out_of_range_and_non_positive_entries() {
		let matrix = ItemUserMatrix::from_triplets(
			2,
			2,
			vec![(0, 0, 1.0), (5, 0, 1.0), (0, 5, 1.0), (1, 1, -1.0), (1, 1, 0.0)],
		);

		assert_eq!(matrix.nnz(), 1);
		assert_eq!(matrix.user_items(0), &[(0, 1.0)]);
		assert!(matrix.user_items(1).is_empty());
	}

	#[test]
	fn duplicate_pairs_keep_the_larger_weight() {
		let matrix =
			ItemUserMatrix::from_triplets(1, 1, vec![(0, 0, 1.0), (0, 0, 3.0), (0, 0, 2.0)]);

		assert_eq!(matrix.nnz(), 1);
		assert_eq!(matrix.item_users(0), &[(0, 3.0)]);
	}
}
