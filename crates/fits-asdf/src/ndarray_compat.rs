//! Conversions between [`NdArray`] and `ndarray` arrays.

use ndarray::{Array, ArrayBase, ArrayD, Data, Dimension};

use crate::array::{Element, NdArray};
use crate::error::{Error, Result};

impl NdArray {
    /// Copies the elements into an owned `ndarray` array of the same shape.
    pub fn to_ndarray<T: Element>(&self) -> Result<ArrayD<T>> {
        let values: Vec<T> = self.to_vec()?;
        let actual = values.len();
        Array::from_shape_vec(self.shape().to_vec(), values).map_err(|_| Error::ShapeMismatch {
            expected: self.len(),
            actual,
        })
    }

    /// Copies an `ndarray` array, in logical (row-major) order, into a new buffer.
    pub fn from_ndarray<T, S, D>(array: &ArrayBase<S, D>) -> Result<Self>
    where
        T: Element,
        S: Data<Elem = T>,
        D: Dimension,
    {
        let values: Vec<T> = array.iter().copied().collect();
        NdArray::from_vec(array.shape().to_vec(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn to_ndarray_keeps_shape() {
        let a = NdArray::from_vec(vec![2, 3], (0..6).map(|i| i as f32).collect()).unwrap();
        let arr = a.to_ndarray::<f32>().unwrap();
        assert_eq!(arr.shape(), &[2, 3]);
        assert_eq!(arr[[1, 2]], 5.0);
    }

    #[test]
    fn from_transposed_view_uses_logical_order() {
        let m = Array2::from_shape_vec((2, 2), vec![1i32, 2, 3, 4]).unwrap();
        let a = NdArray::from_ndarray(&m.t()).unwrap();
        assert_eq!(a.shape(), &[2, 2]);
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 3, 2, 4]);
    }

    #[test]
    fn wrong_element_type() {
        let a = NdArray::from_slice(&[1u8]);
        assert!(matches!(a.to_ndarray::<i16>(), Err(Error::DTypeMismatch { .. })));
    }
}
