use burn::tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor};

/// Stack fixed-length rows into a 2D tensor, keeping only the first `width` values of each row
pub fn stack_trimmed<B: Backend>(
    rows: &[&[i64]],
    width: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let mut values = Vec::with_capacity(rows.len() * width);
    for row in rows {
        values.extend_from_slice(&row[..width]);
    }

    int_tensor([rows.len(), width], values, device)
}

/// Build an integer tensor from row-major values
pub fn int_tensor<B: Backend, const D: usize>(
    shape: [usize; D],
    values: Vec<i64>,
    device: &B::Device,
) -> Tensor<B, D, Int> {
    Tensor::from_data(
        Data::new(
            values.into_iter().map(|e| e.elem()).collect(),
            Shape::new(shape),
        ),
        device,
    )
}

/// Build a float tensor from row-major values
pub fn float_tensor<B: Backend, const D: usize>(
    shape: [usize; D],
    values: Vec<f32>,
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(
        Data::new(
            values.into_iter().map(|e| e.elem()).collect(),
            Shape::new(shape),
        ),
        device,
    )
}

/// Copy a float tensor into a flat, row-major vector
pub fn to_f32_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().value
}

/// Copy an integer tensor into a flat, row-major vector
pub fn to_i64_vec<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Vec<i64> {
    tensor.into_data().convert::<i64>().value
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type B = NdArray;

    #[test]
    fn test_stack_trimmed() {
        let device = Default::default();
        let a = [101, 7, 102, 0, 0];
        let b = [101, 102, 0, 0, 0];
        let tensor = stack_trimmed::<B>(&[&a[..], &b[..]], 3, &device);

        assert_eq!(tensor.dims(), [2, 3]);
        assert_eq!(to_i64_vec(tensor), vec![101, 7, 102, 101, 102, 0]);
    }

    #[test]
    fn test_float_round_trip() {
        let device = Default::default();
        let tensor = float_tensor::<B, 2>([2, 2], vec![0.5, 1.0, 1.5, 2.0], &device);

        assert_eq!(to_f32_vec(tensor), vec![0.5, 1.0, 1.5, 2.0]);
    }
}
