//! Persisted embedding matrix.
//!
//! On-disk layout (little-endian): magic `SGEM`, format version `u16`,
//! `dim: u32`, `count: u32`, then `count × dim` packed `f32` values in
//! row-major order. Row offset equals catalog row id.

use std::{
	fs::File,
	io::{BufReader, BufWriter, Read, Write},
	path::Path,
};

use crate::{Error, Result};

const MATRIX_MAGIC: [u8; 4] = *b"SGEM";
const MATRIX_VERSION: u16 = 1;

#[derive(Clone, Debug)]
pub struct EmbeddingMatrix {
	data: Vec<f32>,
	dim: usize,
	count: usize,
}

impl EmbeddingMatrix {
	/// Packs a batch of equally sized rows, L2-normalizing each one so inner
	/// product equals cosine similarity downstream.
	pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
		let dim = rows.first().map(Vec::len).unwrap_or(0);

		if dim == 0 && !rows.is_empty() {
			return Err(Error::InvalidEmbeddings {
				message: "embedding rows must be non-empty".to_string(),
			});
		}

		let count = rows.len();
		let mut data = Vec::with_capacity(count * dim);

		for (idx, mut row) in rows.into_iter().enumerate() {
			if row.len() != dim {
				return Err(Error::InvalidEmbeddings {
					message: format!("row {idx} has dimension {}, expected {dim}", row.len()),
				});
			}

			l2_normalize(&mut row);
			data.extend_from_slice(&row);
		}

		Ok(Self { data, dim, count })
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn count(&self) -> usize {
		self.count
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	pub fn row(&self, row_id: usize) -> Option<&[f32]> {
		if row_id >= self.count {
			return None;
		}

		Some(&self.data[row_id * self.dim..(row_id + 1) * self.dim])
	}

	pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
		self.data.chunks_exact(self.dim.max(1)).take(self.count)
	}

	pub fn write(&self, path: &Path) -> Result<()> {
		let mut writer = BufWriter::new(File::create(path)?);

		writer.write_all(&MATRIX_MAGIC)?;
		writer.write_all(&MATRIX_VERSION.to_le_bytes())?;
		writer.write_all(&(self.dim as u32).to_le_bytes())?;
		writer.write_all(&(self.count as u32).to_le_bytes())?;

		for value in &self.data {
			writer.write_all(&value.to_le_bytes())?;
		}

		writer.flush()?;

		Ok(())
	}

	pub fn read(path: &Path) -> Result<Self> {
		if !path.exists() {
			return Err(Error::MissingArtifact { path: path.to_path_buf() });
		}

		let corrupt = |message: String| Error::CorruptArtifact { path: path.to_path_buf(), message };
		let mut reader = BufReader::new(File::open(path)?);
		let mut magic = [0_u8; 4];
		let mut version = [0_u8; 2];
		let mut word = [0_u8; 4];

		reader.read_exact(&mut magic)?;

		if magic != MATRIX_MAGIC {
			return Err(corrupt("bad magic".to_string()));
		}

		reader.read_exact(&mut version)?;

		let version = u16::from_le_bytes(version);

		if version != MATRIX_VERSION {
			return Err(corrupt(format!("unsupported format version {version}")));
		}

		reader.read_exact(&mut word)?;

		let dim = u32::from_le_bytes(word) as usize;

		reader.read_exact(&mut word)?;

		let count = u32::from_le_bytes(word) as usize;
		let mut data = vec![0.0_f32; count * dim];
		let mut buf = [0_u8; 4];

		for value in &mut data {
			reader.read_exact(&mut buf).map_err(|_| corrupt("truncated matrix".to_string()))?;

			*value = f32::from_le_bytes(buf);
		}

		Ok(Self { data, dim, count })
	}
}

pub fn l2_normalize(vector: &mut [f32]) {
	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt() + 1e-12;

	for value in vector.iter_mut() {
		*value /= norm;
	}
}
