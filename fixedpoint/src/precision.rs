use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, ToPrimitive};

use nexus_config::FixedPointConfig;

use crate::Error;

// Constants rounded to the nearest integer at scale 2^16 and 2^32.
const PI_HALF: [u64; 2] = [102_944, 6_746_518_852];
const PI_SIXTH: [u64; 2] = [34_315, 2_248_839_617];
const SQRT_3: [u64; 2] = [113_512, 7_439_101_574];
const TAN_PI_12: [u64; 2] = [17_560, 1_150_833_018];

/// `2 * pi` at scale 2^32 and 2^64, the moduli of the trig angle reduction.
const TWO_PI_32: u64 = 26_986_075_409;
const TWO_PI_64: u128 = 115_904_311_329_233_965_478;

// Largest exponent whose result still fits into `m` limbs, indexed by `m1`
// and `m2`, and the smallest whose result does not round to zero.
const EXP_UPPER: [[i64; 2]; 2] = [[726_816, 47_632_711_548], [1_453_633, 95_265_423_097]];
const EXP_LOWER: [i64; 2] = [-772_243, -98_242_467_570];

/// Number of 16-bit limbs before (`m1`) and after (`m2`) the binary point.
///
/// A fixed-point value `v` is stored as the field element `v * delta`, where
/// `delta = 2^(16 * m2)`. Every gadget is built for a single precision and
/// expects all of its inputs at that scale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Precision {
    m1: u8,
    m2: u8,
}

impl Precision {
    /// Panics if either limb count is not 1 or 2.
    pub fn new(m1: u8, m2: u8) -> Self {
        match Self::try_new(m1, m2) {
            Ok(precision) => precision,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_new(m1: u8, m2: u8) -> Result<Self, Error> {
        if !matches!(m1, 1 | 2) || !matches!(m2, 1 | 2) {
            return Err(Error::InvalidPrecision { m1, m2 });
        }
        Ok(Self { m1, m2 })
    }

    pub const fn m1(&self) -> usize {
        self.m1 as usize
    }

    pub const fn m2(&self) -> usize {
        self.m2 as usize
    }

    /// Total number of limbs.
    pub const fn m(&self) -> usize {
        self.m1() + self.m2()
    }

    pub const fn delta_bits(&self) -> usize {
        16 * self.m2()
    }

    pub fn delta(&self) -> BigInt {
        BigInt::one() << self.delta_bits()
    }

    /// Largest magnitude representable with `m` limbs.
    pub fn max_value(&self) -> BigInt {
        (BigInt::one() << (16 * self.m())) - 1u32
    }

    pub fn pi_half(&self) -> BigInt {
        self.constant(PI_HALF)
    }

    pub fn pi_sixth(&self) -> BigInt {
        self.constant(PI_SIXTH)
    }

    pub fn sqrt3(&self) -> BigInt {
        self.constant(SQRT_3)
    }

    pub fn tan_pi_12(&self) -> BigInt {
        self.constant(TAN_PI_12)
    }

    /// `round(2 pi * 2^(32 m2))`, the modulus trig angles are reduced by when
    /// there are two integer limbs.
    pub fn trig_modulus(&self) -> Option<BigInt> {
        match (self.m1, self.m2) {
            (2, 1) => Some(BigInt::from(TWO_PI_32)),
            (2, 2) => Some(BigInt::from(TWO_PI_64)),
            _ => None,
        }
    }

    /// Domain of the clipped exponential: below it the result rounds to zero,
    /// above it the result overflows `m` limbs.
    pub fn exp_bounds(&self) -> (BigInt, BigInt) {
        (
            BigInt::from(EXP_LOWER[self.m2() - 1]),
            BigInt::from(EXP_UPPER[self.m1() - 1][self.m2() - 1]),
        )
    }

    /// Nearest fixed-point encoding of `value`.
    pub fn encode(&self, value: f64) -> BigInt {
        let scaled = (value * 2f64.powi(self.delta_bits() as i32)).round();
        BigInt::from_f64(scaled).unwrap_or_default()
    }

    pub fn decode(&self, value: &BigInt) -> f64 {
        value.to_f64().unwrap_or(f64::NAN) / 2f64.powi(self.delta_bits() as i32)
    }

    fn constant(&self, table: [u64; 2]) -> BigInt {
        BigInt::from(table[self.m2() - 1])
    }
}

impl TryFrom<&FixedPointConfig> for Precision {
    type Error = Error;

    fn try_from(config: &FixedPointConfig) -> Result<Self, Self::Error> {
        Self::try_new(config.m1, config.m2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_f64() {
        for m2 in [1, 2] {
            let precision = Precision::new(1, m2);
            let scale = 2f64.powi(16 * m2 as i32);
            let cases = [
                (precision.pi_half(), std::f64::consts::FRAC_PI_2),
                (precision.pi_sixth(), std::f64::consts::FRAC_PI_6),
                (precision.sqrt3(), 3f64.sqrt()),
                (precision.tan_pi_12(), 2.0 - 3f64.sqrt()),
            ];
            for (constant, expected) in cases {
                let diff = (constant.to_f64().unwrap() - expected * scale).abs();
                assert!(diff <= 0.5, "{constant} vs {}", expected * scale);
            }
        }
    }

    #[test]
    fn trig_modulus_is_nearest() {
        for m2 in [1, 2] {
            let two_pi = Precision::new(2, m2).trig_modulus().unwrap();
            let expected = std::f64::consts::TAU * 2f64.powi(32 * m2 as i32);
            assert!((two_pi.to_f64().unwrap() / expected - 1.0).abs() < 1e-15);
        }
        // 2 pi * 2^32 = 26986075409.09...
        assert_eq!(
            Precision::new(2, 1).trig_modulus(),
            Some(BigInt::from(26_986_075_409u64))
        );
        assert_eq!(Precision::new(1, 2).trig_modulus(), None);
    }

    #[test]
    fn exp_bounds_fit() {
        for (m1, m2) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            let precision = Precision::new(m1, m2);
            let (lo, hi) = precision.exp_bounds();
            let max = precision.decode(&precision.max_value());
            let top = precision.decode(&hi).exp();
            assert!(top < max && top * 1.0001 > max, "exp({hi}) at ({m1}, {m2})");
            let bottom = precision.decode(&lo).exp() * precision.delta().to_f64().unwrap();
            assert!((bottom - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn limb_counts() {
        let precision = Precision::new(2, 1);
        assert_eq!(precision.m(), 3);
        assert_eq!(precision.delta(), BigInt::from(65536));
        assert_eq!(precision.max_value(), (BigInt::one() << 48u32) - 1u32);
        assert_eq!(precision.encode(1.5), BigInt::from(98304));
        assert_eq!(precision.decode(&BigInt::from(-32768)), -0.5);
    }

    #[test]
    fn rejects_unsupported_limbs() {
        assert_eq!(
            Precision::try_new(3, 1),
            Err(Error::InvalidPrecision { m1: 3, m2: 1 })
        );
        assert!(Precision::try_new(1, 0).is_err());
    }

    #[test]
    #[should_panic]
    fn new_panics_on_invalid_limbs() {
        Precision::new(0, 2);
    }

    #[test]
    fn from_config() {
        let config = FixedPointConfig {
            m1: 2,
            m2: 2,
            columns: 15,
        };
        assert_eq!(Precision::try_from(&config), Ok(Precision::new(2, 2)));

        let config = FixedPointConfig { m2: 4, ..config };
        assert!(Precision::try_from(&config).is_err());
    }
}
