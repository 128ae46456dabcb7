//! Text embeddings for schema retrieval
//!
//! The default engine is a hashed bag-of-words: cheap, deterministic and
//! fully local. Anything implementing [`Embedder`] can stand in for it
//! (a sentence-transformer, a remote embedding API) without touching callers.

use std::collections::BTreeMap;

/// Default vector width, matching common sentence-transformer models
pub const DEFAULT_DIMENSION: usize = 384;

/// Number of consecutive slots each token is spread over
const SLOTS_PER_TOKEN: u64 = 5;

/// Turns text into a fixed-length vector
pub trait Embedder: Send + Sync {
    /// Embed a piece of text. Must be deterministic for identical input.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Length of every vector returned by [`Embedder::embed`]
    fn dimension(&self) -> usize;
}

/// Hashed bag-of-words embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder with the default dimension
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    /// Create an embedder producing vectors of `dimension` floats
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        // BTreeMap keeps the accumulation order stable, so repeated calls
        // produce bit-identical floats.
        let mut frequencies: BTreeMap<&str, usize> = BTreeMap::new();
        for token in &tokens {
            *frequencies.entry(token.as_str()).or_default() += 1;
        }

        let total = tokens.len() as f32;
        let dimension = self.dimension as u64;

        for (token, count) in frequencies {
            let hash = token_hash(token);
            let weight = count as f32 / total;
            for k in 0..SLOTS_PER_TOKEN {
                let idx = (hash.wrapping_add(k) % dimension) as usize;
                vector[idx] += weight;
            }
        }

        normalize(&mut vector);
        vector
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Split text into lower-case word tokens.
///
/// Splits on whitespace, then trims surrounding punctuation so that
/// `"orders."` and `"(integer)"` match `orders` and `integer`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'))
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Stable 64-bit hash of a token
fn token_hash(token: &str) -> u64 {
    let digest = blake3::hash(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// Scale a vector to unit length in place. A zero vector is left untouched.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for v in vector.iter_mut() {
        *v /= norm;
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 for vectors of different length, empty vectors, or when
/// either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
