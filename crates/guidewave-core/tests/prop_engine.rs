//! Property-based tests for the propagation engine using proptest.
//!
//! Covers: complex Thomas solver, absorber profile shape, power conservation
//! of the lossless Crank–Nicolson step.

use guidewave_core::fields::{gaussian, power};
use guidewave_core::solver::tridiag::{thomas_solve, tridiag_matvec};
use guidewave_core::{AbsorberConfig, AbsorberProfile, Grid, Propagator, StaticProfile};
use num_complex::Complex64;
use proptest::prelude::*;

// ── Thomas Solver Properties ─────────────────────────────────────────

proptest! {
    /// For any diagonally dominant complex tridiagonal system,
    /// x = thomas_solve(a,b,c,d) satisfies Ax = d.
    #[test]
    fn thomas_solve_ax_eq_d(n in 3usize..40, re in -0.4f64..0.4, im in -0.4f64..0.4) {
        let off = Complex64::new(re, im);
        let a = vec![off; n];
        let b = vec![Complex64::new(2.0, 0.5); n];
        let c = vec![off.conj(); n];
        let d: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new((i as f64 + 1.0).sin(), (i as f64 * 0.3).cos()))
            .collect();

        let x = thomas_solve(&a, &b, &c, &d).unwrap();
        let ax = tridiag_matvec(&a, &b, &c, &x);
        for i in 0..n {
            prop_assert!((ax[i] - d[i]).norm() < 1e-10,
                "Ax[{}] = {}, d[{}] = {}", i, ax[i], i, d[i]);
        }
    }

    /// Identity system returns the right-hand side.
    #[test]
    fn thomas_identity_system(n in 1usize..50) {
        let zero = vec![Complex64::new(0.0, 0.0); n];
        let one = vec![Complex64::new(1.0, 0.0); n];
        let d: Vec<Complex64> = (0..n).map(|i| Complex64::new(i as f64 * 0.7 - 3.0, 1.0)).collect();

        let x = thomas_solve(&zero, &one, &zero, &d).unwrap();
        prop_assert_eq!(x, d);
    }
}

// ── Absorber Properties ──────────────────────────────────────────────

proptest! {
    /// κ is symmetric, bounded by the peak, and never decreases towards the edges.
    #[test]
    fn absorber_monotone_towards_edges(
        fraction in 0.05f64..0.5,
        peak in 0.1f64..5.0,
        order in 1.0f64..4.0,
    ) {
        let grid = Grid::new(121, 0.1, 0.05, 1.55, 1.45).unwrap();
        let config = AbsorberConfig { width_fraction: fraction, peak_strength: peak, order };
        let kappa = AbsorberProfile::new(&grid, &config).unwrap().kappa().to_vec();
        let nx = kappa.len();
        let centre = nx / 2;

        prop_assert_eq!(kappa[centre], 0.0);
        for j in 0..nx {
            prop_assert!(kappa[j] >= 0.0 && kappa[j] <= peak * (1.0 + 1e-12));
            prop_assert!((kappa[j] - kappa[nx - 1 - j]).abs() < 1e-12);
        }
        for j in centre..nx - 1 {
            prop_assert!(kappa[j + 1] >= kappa[j], "kappa fell at {}", j);
        }
    }
}

// ── Crank–Nicolson Properties ────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Without an absorber every step is unitary.
    #[test]
    fn lossless_step_conserves_power(
        delta_n in 0.0f64..0.1,
        slab_width in 0.5f64..4.0,
        offset in -2.0f64..2.0,
        dz in 0.01f64..2.0,
    ) {
        let grid = Grid::new(101, 0.1, dz, 1.55, 1.45).unwrap();
        let profile = StaticProfile::slab(&grid, 0.0, slab_width, 1.45 + delta_n, 1.45);
        let prop = Propagator::new(&grid, &profile, None).unwrap();
        let step = prop.prepare(0.0, dz).unwrap();

        let mut field = gaussian(&grid, offset, 1.0).unwrap();
        for k in 0..20 {
            field = step.apply(&field, k as f64 * dz).unwrap();
        }
        let p = power(&field, grid.dx());
        prop_assert!((p - 1.0).abs() < 1e-10, "power drifted to {}", p);
    }
}
