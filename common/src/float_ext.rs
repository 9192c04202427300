pub trait FloatExt {
    fn approximately_eq(self, other: Self) -> bool;

    /// Absolute-difference comparison with an explicit tolerance.
    fn approx_eq_within(self, other: Self, tolerance: Self) -> bool;
}

impl FloatExt for f32 {
    fn approximately_eq(self, other: Self) -> bool {
        self.approx_eq_within(other, crate::EPSILON as f32)
    }

    fn approx_eq_within(self, other: Self, tolerance: Self) -> bool {
        (self - other).abs() < tolerance
    }
}

impl FloatExt for f64 {
    fn approximately_eq(self, other: Self) -> bool {
        self.approx_eq_within(other, crate::EPSILON)
    }

    fn approx_eq_within(self, other: Self, tolerance: Self) -> bool {
        (self - other).abs() < tolerance
    }
}
