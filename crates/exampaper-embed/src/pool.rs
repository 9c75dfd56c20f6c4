use anyhow::Result;
use candle_core::Tensor;

const NORM_FLOOR: f64 = 1e-12;

/// Mean-pool `hidden` `[B, T, H]` over tokens whose mask is set, then scale
/// each row to unit length. Rows with an all-zero mask come out as zeros.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _tokens, width) = hidden.dims3()?;
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;

    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1f64, f64::MAX)?;
    let mean = summed.broadcast_div(&counts)?;

    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(NORM_FLOOR, f64::MAX)?;
    let pooled = mean.broadcast_div(&norms)?;
    anyhow::ensure!(pooled.dims() == [batch, width], "pooled shape mismatch: {:?}", pooled.dims());
    Ok(pooled)
}
