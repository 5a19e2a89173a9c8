//! Launch fields and field diagnostics.
//!
//! Power and overlap integrals use the rectangle rule on the uniform grid,
//! which is the norm the Crank–Nicolson step conserves exactly:
//!
//! $$
//! P = \sum_j |A_j|^2 \Delta x, \qquad
//! \langle a, b \rangle = \sum_j a_j \, b_j^{*} \Delta x
//! $$

use num_complex::Complex64;

use crate::solver::{BpmError, Result};
use crate::types::{Field, Grid};

/// Total power $\sum |A|^2 \Delta x$.
pub fn power(field: &Field, dx: f64) -> f64 {
    field.iter().map(|a| a.norm_sqr()).sum::<f64>() * dx
}

/// Overlap integral $\sum a \, b^{*} \Delta x$.
pub fn overlap(a: &Field, b: &Field, dx: f64) -> Complex64 {
    a.iter().zip(b.iter()).map(|(p, q)| p * q.conj()).sum::<Complex64>() * dx
}

/// Fraction of the power of `field` carried by `mode`:
/// $|\langle A, \phi \rangle|^2 / (P_A P_\phi)$.
pub fn coupling_efficiency(field: &Field, mode: &Field, dx: f64) -> f64 {
    let p_field = power(field, dx);
    let p_mode = power(mode, dx);
    if p_field == 0.0 || p_mode == 0.0 {
        return 0.0;
    }
    overlap(field, mode, dx).norm_sqr() / (p_field * p_mode)
}

/// Rescale `field` in place to unit power.
pub fn normalize(field: &mut Field, dx: f64) -> Result<()> {
    let p = power(field, dx);
    if !p.is_finite() || p == 0.0 {
        return Err(BpmError::Domain(format!("cannot normalise a field with power {p}")));
    }
    let scale = 1.0 / p.sqrt();
    field.mapv_inplace(|a| a * scale);
    Ok(())
}

/// Rotate the global phase so the largest-magnitude sample is real and positive.
pub fn fix_phase(field: &mut Field) {
    let peak = field
        .iter()
        .copied()
        .fold(Complex64::new(0.0, 0.0), |best, a| if a.norm() > best.norm() { a } else { best });
    if peak.norm() > 0.0 {
        let rotation = peak.conj() / peak.norm();
        field.mapv_inplace(|a| a * rotation);
    }
}

/// Unit-power Gaussian beam $\exp(-(x - x_c)^2 / w^2)$ centred at `centre`
/// with 1/e field half-width `width`.
pub fn gaussian(grid: &Grid, centre: f64, width: f64) -> Result<Field> {
    tilted_gaussian(grid, centre, width, 0.0)
}

/// Unit-power Gaussian beam travelling at `angle` radians to the z axis,
/// measured in the reference medium.
pub fn tilted_gaussian(grid: &Grid, centre: f64, width: f64, angle: f64) -> Result<Field> {
    if !width.is_finite() || width <= 0.0 {
        return Err(BpmError::Configuration(format!("beam width must be positive, got {width}")));
    }
    let kx = grid.reference_wavenumber() * angle.sin();
    let mut field = grid.x().mapv(|x| {
        let u = (x - centre) / width;
        Complex64::from_polar((-u * u).exp(), kx * (x - centre))
    });
    normalize(&mut field, grid.dx())?;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid() -> Grid {
        Grid::new(201, 0.1, 0.05, 1.55, 1.45).unwrap()
    }

    #[test]
    fn test_gaussian_has_unit_power_and_peak_at_centre() {
        let g = grid();
        let field = gaussian(&g, 1.0, 2.0).unwrap();
        assert_abs_diff_eq!(power(&field, g.dx()), 1.0, epsilon = 1e-12);
        let peak = field
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(j, _)| j)
            .unwrap();
        assert_abs_diff_eq!(g.x_at(peak), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tilted_gaussian_keeps_intensity() {
        let g = grid();
        let flat = gaussian(&g, 0.0, 1.5).unwrap();
        let tilted = tilted_gaussian(&g, 0.0, 1.5, 0.05).unwrap();
        for (a, b) in flat.iter().zip(tilted.iter()) {
            assert_abs_diff_eq!(a.norm(), b.norm(), epsilon = 1e-12);
        }
        assert!(coupling_efficiency(&tilted, &flat, g.dx()) < 1.0);
    }

    #[test]
    fn test_overlap_is_hermitian() {
        let g = grid();
        let a = gaussian(&g, -0.5, 1.0).unwrap();
        let b = tilted_gaussian(&g, 0.5, 2.0, 0.02).unwrap();
        let ab = overlap(&a, &b, g.dx());
        let ba = overlap(&b, &a, g.dx());
        assert_abs_diff_eq!(ab.re, ba.re, epsilon = 1e-14);
        assert_abs_diff_eq!(ab.im, -ba.im, epsilon = 1e-14);
        assert_abs_diff_eq!(coupling_efficiency(&a, &a, g.dx()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_rejects_zero_field() {
        let mut field = Field::zeros(5);
        assert!(matches!(normalize(&mut field, 0.1), Err(BpmError::Domain(_))));
    }

    #[test]
    fn test_fix_phase_makes_peak_real() {
        let mut field = Field::from(vec![
            Complex64::new(0.0, 0.1),
            Complex64::new(0.0, -2.0),
            Complex64::new(0.5, 0.0),
        ]);
        fix_phase(&mut field);
        assert_abs_diff_eq!(field[1].re, 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(field[1].im, 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(field[2].norm(), 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_gaussian_rejects_bad_width() {
        assert!(gaussian(&grid(), 0.0, 0.0).is_err());
    }
}
