//! ROM accounting: bytes of every constant tensor (weights, biases and
//! literal tensors such as a Reshape target shape). Graph metadata and the
//! flatbuffer framing are not counted.

use crate::ir::Tensor;

/// Saturates at `usize::MAX`; [`crate::estimate::validate::check_sizes`]
/// rejects graphs where that could happen.
pub fn estimate_rom(tensors: &[Tensor]) -> usize {
    tensors
        .iter()
        .filter(|t| t.is_constant)
        .map(Tensor::byte_size)
        .fold(0, usize::saturating_add)
}
