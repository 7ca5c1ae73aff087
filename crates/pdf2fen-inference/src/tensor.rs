//! Tensor types exchanged with the inference backends.

use ndarray::ArrayD;

/// Input tensor for inference.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
}

impl InputTensor {
    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
        }
    }
}

/// Output tensor from inference.
///
/// Classifier graphs end either in a softmax (`Float32`) or in an
/// `ArgMax` node (`Int64`/`Int32`).
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
    Int32(ArrayD<i32>),
}

impl OutputTensor {
    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
            OutputTensor::Int32(arr) => arr.shape(),
        }
    }

    /// Try to get the inner Float32 array.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }

    /// Integer class ids, widened to `i64`, if this is an integer tensor.
    pub fn to_class_ids(&self) -> Option<Vec<i64>> {
        match self {
            OutputTensor::Int64(arr) => Some(arr.iter().copied().collect()),
            OutputTensor::Int32(arr) => Some(arr.iter().map(|&v| i64::from(v)).collect()),
            OutputTensor::Float32(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_input_shape() {
        let tensor = InputTensor::Float32(ArrayD::zeros(IxDyn(&[64, 50, 50, 3])));
        assert_eq!(tensor.shape(), &[64, 50, 50, 3]);
    }

    #[test]
    fn test_float_output_has_no_class_ids() {
        let output = OutputTensor::Float32(ArrayD::zeros(IxDyn(&[64, 13])));
        assert_eq!(output.shape(), &[64, 13]);
        assert!(output.to_class_ids().is_none());
    }

    #[test]
    fn test_class_ids_widen_i32() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0i32, 7, 12]).unwrap();
        let output = OutputTensor::Int32(arr);
        assert_eq!(output.to_class_ids(), Some(vec![0, 7, 12]));
        assert!(output.as_f32().is_none());
    }
}
