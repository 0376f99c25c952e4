/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Self = Time(0.0);

    pub fn seconds(self) -> f64 {
        self.0
    }
}
