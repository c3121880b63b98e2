
use crate::{PressError, Result};

const COMPONENT_BYTES: usize = size_of::<f32>();

/// Encode an embedding as little-endian `f32` bytes
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * COMPONENT_BYTES);
    for component in embedding {
        bytes.extend_from_slice(&component.to_le_bytes());
    }
    bytes
}

#[inline]
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    check_blob_len(bytes)?;
    Ok(bytes
        .chunks_exact(COMPONENT_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn check_blob_len(bytes: &[u8]) -> Result<()> {
    if bytes.len() % COMPONENT_BYTES != 0 {
        return Err(PressError::Database(format!(
            "embedding blob of {} bytes is not a whole number of f32 components",
            bytes.len()
        )));
    }
    Ok(())
}

/// Candidate vectors packed row-major into one contiguous buffer
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    dimension: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn rows(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn push(&mut self, row: &[f32]) -> Result<()> {
        self.check_dimension(row.len())?;
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Decode a stored blob straight into the matrix without an intermediate vector
    #[inline]
    pub fn push_encoded(&mut self, bytes: &[u8]) -> Result<()> {
        check_blob_len(bytes)?;
        self.check_dimension(bytes.len() / COMPONENT_BYTES)?;
        self.data.extend(
            bytes
                .chunks_exact(COMPONENT_BYTES)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
        );
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len != self.dimension {
            return Err(PressError::Validation(format!(
                "vector has {} components, expected {}",
                len, self.dimension
            )));
        }
        Ok(())
    }
}

/// Cosine distance (`1 - cosine similarity`) from `query` to every row
///
/// A zero-norm vector on either side has similarity 0, so distance 1.
#[inline]
pub fn cosine_distances(matrix: &EmbeddingMatrix, query: &[f32]) -> Result<Vec<f32>> {
    matrix.check_dimension(query.len())?;
    if matrix.is_empty() {
        return Ok(Vec::new());
    }

    let query_norm = norm(query);
    let distances = matrix
        .data
        .chunks_exact(matrix.dimension)
        .map(|row| {
            let denominator = query_norm * norm(row);
            if denominator == 0.0 {
                return 1.0;
            }
            let similarity = dot(query, row) / denominator;
            (1.0 - similarity.clamp(-1.0, 1.0)) as f32
        })
        .collect();

    Ok(distances)
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}
