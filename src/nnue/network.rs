//! Network weights and the forward pass.

use std::fmt;

use once_cell::sync::OnceCell;

use crate::board::types::{Color, Score};

use super::simd;
use super::{
    HIDDEN_WIDTH, KING_BUCKETS, NETWORK_QA, NETWORK_QB, NETWORK_SCALE, OUTPUT_BUCKETS,
};

use super::Accumulator;

/// i16 count of the feature-transformer weights:
/// `[king bucket][perspective][piece type][square][hidden]`.
const FEATURE_WEIGHTS_LEN: usize = KING_BUCKETS * 2 * 6 * 64 * HIDDEN_WIDTH;
const OUTPUT_WEIGHTS_LEN: usize = OUTPUT_BUCKETS * HIDDEN_WIDTH;

/// Total byte length of the §6 network buffer.
pub const NETWORK_BYTES: usize =
    2 * (FEATURE_WEIGHTS_LEN + HIDDEN_WIDTH + OUTPUT_WEIGHTS_LEN + OUTPUT_BUCKETS);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    WrongSize { expected: usize, got: usize },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::WrongSize { expected, got } => {
                write!(f, "network buffer is {got} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub struct Network {
    feature_weights: Vec<i16>,
    feature_bias: Vec<i16>,
    output_weights: Vec<i16>,
    output_bias: [i16; OUTPUT_BUCKETS],
}

impl Network {
    /// An all-zero network. Evaluates everything to the output bias (zero);
    /// the engine stays functional without a weights buffer.
    #[must_use]
    pub fn zeroed() -> Network {
        Network {
            feature_weights: vec![0; FEATURE_WEIGHTS_LEN],
            feature_bias: vec![0; HIDDEN_WIDTH],
            output_weights: vec![0; OUTPUT_WEIGHTS_LEN],
            output_bias: [0; OUTPUT_BUCKETS],
        }
    }

    /// Parse the contiguous little-endian i16 buffer laid out as
    /// feature weights, feature biases, output weights, output biases.
    pub fn from_bytes(data: &[u8]) -> Result<Network, NetworkError> {
        if data.len() != NETWORK_BYTES {
            return Err(NetworkError::WrongSize {
                expected: NETWORK_BYTES,
                got: data.len(),
            });
        }

        let mut values = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]));
        let mut take = |n: usize| -> Vec<i16> { values.by_ref().take(n).collect() };

        let feature_weights = take(FEATURE_WEIGHTS_LEN);
        let feature_bias = take(HIDDEN_WIDTH);
        let output_weights = take(OUTPUT_WEIGHTS_LEN);
        let bias_tail = take(OUTPUT_BUCKETS);
        let mut output_bias = [0; OUTPUT_BUCKETS];
        output_bias.copy_from_slice(&bias_tail);

        Ok(Network {
            feature_weights,
            feature_bias,
            output_weights,
            output_bias,
        })
    }

    /// The hidden-width weight column of one feature.
    #[inline]
    #[must_use]
    pub fn feature_weights(&self, feature: usize) -> &[i16] {
        &self.feature_weights[feature * HIDDEN_WIDTH..(feature + 1) * HIDDEN_WIDTH]
    }

    #[inline]
    #[must_use]
    pub fn feature_bias(&self) -> &[i16] {
        &self.feature_bias
    }

    /// Forward pass over an up-to-date accumulator.
    ///
    /// The output bucket is picked from the piece count; within a bucket the
    /// side to move's perspective is read first.
    #[must_use]
    pub fn evaluate(&self, stm: Color, piece_count: u32, acc: &Accumulator) -> Score {
        const DIVISOR: u32 = (32 + OUTPUT_BUCKETS as u32 - 1) / OUTPUT_BUCKETS as u32;
        let bucket = (piece_count.saturating_sub(2) / DIVISOR).min(OUTPUT_BUCKETS as u32 - 1) as usize;

        let half = HIDDEN_WIDTH / 2;
        let mut sum = 0i32;

        for them in 0..2 {
            let side = if them == 0 { stm } else { stm.flip() };
            let hidden = &acc.colors[side.index()];
            let weights =
                &self.output_weights[bucket * HIDDEN_WIDTH + them * half..][..half];
            sum += simd::clipped_pairwise_dot(&hidden[..half], &hidden[half..], weights);
        }

        let unsquared = sum / NETWORK_QA + i32::from(self.output_bias[bucket]);
        unsquared * NETWORK_SCALE / (NETWORK_QA * NETWORK_QB)
    }
}

static NETWORK: OnceCell<Network> = OnceCell::new();

/// The process-wide network. Defaults to the zero network when nothing was
/// installed before first use.
#[must_use]
pub fn network() -> &'static Network {
    NETWORK.get_or_init(Network::zeroed)
}

/// Install a network. Fails (returning it back) once the default has
/// already been observed.
pub fn set_network(net: Network) -> Result<(), Network> {
    NETWORK.set(net)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_size() {
        let err = Network::from_bytes(&[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            NetworkError::WrongSize {
                expected: NETWORK_BYTES,
                got: 16
            }
        );
    }

    #[test]
    fn zero_network_round_trips_through_bytes() {
        let bytes = vec![0u8; NETWORK_BYTES];
        let net = Network::from_bytes(&bytes).unwrap();
        assert!(net.feature_bias().iter().all(|&b| b == 0));
    }
}
