/// Create an [`NdArray`](gradgraph_array::NdArray) from an `ndarray::array!` literal.
#[macro_export]
macro_rules! nd {
    ($($t:tt)*) => {
        $crate::NdArray::from_array($crate::ndarray::array![$($t)*].into_dyn())
    };
}

/// Decide if two arrays are equal.
///
/// Defaultly, the arrays are considered equal if they have the same shape and
/// their summed squared error is less than 1e-6.
///
/// You can also explicitly specify the tolerance by passing a third argument.
#[macro_export]
macro_rules! array_eq {
    ($a:expr, $b:expr) => {
        $crate::array_eq!($a, $b, 1e-6)
    };
    ($a:expr, $b:expr, $c:expr) => {{
        let (a, b): (&$crate::NdArray, &$crate::NdArray) = (&$a, &$b);
        a.shape() == b.shape()
            && a.as_array()
                .iter()
                .zip(b.as_array().iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                < $c
    }};
}

/// Assert that two arrays are equal, see [`array_eq!`].
#[macro_export]
macro_rules! assert_array_eq {
    ($a:expr, $b:expr) => {
        assert!($crate::array_eq!($a, $b), "{:?} != {:?}", $a, $b);
    };
    ($a:expr, $b:expr, $c:expr) => {
        assert!($crate::array_eq!($a, $b, $c), "{:?} != {:?}", $a, $b);
    };
}
