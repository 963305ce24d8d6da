//! Wafer doping density from resistivity.

use pvlife_core::{Doping, DopingType};

use crate::error::{Result, require_positive};

/// Sixth-order polynomial coefficients in `log10(resistivity)` for n-type silicon.
const N_TYPE_COEFFS: [f64; 7] = [
    -6.34661e-4,
    8.20326e-4,
    0.01243,
    0.04571,
    0.07246,
    1.07969,
    15.69691,
];

/// Same fit for p-type silicon.
const P_TYPE_COEFFS: [f64; 7] = [
    -6.543e-4,
    7.54055e-4,
    0.0093332,
    0.03469,
    0.06473,
    1.08286,
    16.17944,
];

/// Dopant density (cm^-3) of a wafer with the given resistivity (ohm cm).
///
/// Empirical fit used by Sinton Instruments. Only the majority dopant is
/// populated; the other density is exactly zero.
pub fn doping_from_resistivity(doping_type: DopingType, resistivity: f64) -> Result<Doping> {
    require_positive("resistivity", resistivity)?;

    let a = match doping_type {
        DopingType::NType => &N_TYPE_COEFFS,
        DopingType::PType => &P_TYPE_COEFFS,
    };
    let l = resistivity.log10();
    let exponent = a[0] * l.powi(6) + a[1] * l.powi(5) + a[2] * l.powi(4) - a[3] * l.powi(3)
        + a[4] * l.powi(2)
        - a[5] * l
        + a[6];
    let density = 10f64.powf(exponent);

    Ok(match doping_type {
        DopingType::NType => Doping::donors(density),
        DopingType::PType => Doping::acceptors(density),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_sign_convention() {
        for resistivity in [0.5, 1.0, 3.0, 10.0, 100.0] {
            let n = doping_from_resistivity(DopingType::NType, resistivity).unwrap();
            assert!(n.n_d > 0.0 && n.n_a == 0.0, "n-type at {} ohm cm: {:?}", resistivity, n);

            let p = doping_from_resistivity(DopingType::PType, resistivity).unwrap();
            assert!(p.n_a > 0.0 && p.n_d == 0.0, "p-type at {} ohm cm: {:?}", resistivity, p);
        }
    }

    #[test]
    fn test_one_ohm_cm() {
        // At 1 ohm cm only the constant term survives.
        let n = doping_from_resistivity(DopingType::NType, 1.0).unwrap();
        assert!((n.n_d / 10f64.powf(15.69691) - 1.0).abs() < 1e-12);

        let p = doping_from_resistivity(DopingType::PType, 1.0).unwrap();
        assert!((p.n_a / 10f64.powf(16.17944) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_higher_resistivity_means_lighter_doping() {
        let low = doping_from_resistivity(DopingType::PType, 1.0).unwrap();
        let high = doping_from_resistivity(DopingType::PType, 10.0).unwrap();
        assert!(high.n_a < low.n_a);
    }

    #[test]
    fn test_rejects_non_positive_resistivity() {
        assert!(matches!(
            doping_from_resistivity(DopingType::NType, 0.0),
            Err(Error::Domain { quantity: "resistivity", .. })
        ));
        assert!(doping_from_resistivity(DopingType::PType, f64::NAN).is_err());
    }
}
