//! Parametric waveguide structures.
//!
//! Each structure paints a region of the (x, z) plane with its own
//! refractive index. Structures are fully described by their TOML
//! parameters (see the `[[structure]]` tables of a job file) and are
//! rasterised onto the transverse grid by [`discretise`](crate::discretise).
//!
//! All lengths are in micrometres; z is measured from the launch plane.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::LayoutError;

/// A waveguide structure that can be rasterised into an index profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Structure {
    Slab(Slab),
    SBend(SBend),
    Mmi(Mmi),
    Lens(Lens),
}

/// A straight guide parallel to z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slab {
    /// Core centre (µm).
    #[serde(default)]
    pub centre: f64,
    /// Core width (µm).
    pub width: f64,
    /// Core index.
    pub index: f64,
    /// Axial extent `[z_start, z_end]`; the guide is infinite when absent.
    #[serde(default)]
    pub z_range: Option<[f64; 2]>,
}

/// A raised-sine S-bend.
///
/// The core centre follows
/// $x_c(z) = x_0 + \frac{l}{L}(z - z_0) - \frac{l}{2\pi}\sin\frac{2\pi (z - z_0)}{L}$,
/// clamped to the lateral span so the guide continues straight before and
/// after the bend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SBend {
    /// Lateral position of the input guide (µm).
    #[serde(default)]
    pub x_start: f64,
    /// Axial position where the bend begins (µm).
    #[serde(default)]
    pub z_start: f64,
    /// Lateral displacement, may be negative (µm).
    pub offset: f64,
    /// Axial length of the bend (µm).
    pub length: f64,
    /// Core width (µm).
    pub width: f64,
    /// Core index.
    pub index: f64,
}

/// A 1×2 multimode-interference splitter.
///
/// Two access guides at ±`separation`/2 feed a multimode section of width
/// `mmi_width` spanning `[z_start, z_start + length]`; two output guides at
/// the same positions leave it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mmi {
    pub z_start: f64,
    pub length: f64,
    pub mmi_width: f64,
    pub guide_width: f64,
    /// Centre-to-centre distance of the access guides (µm).
    pub separation: f64,
    pub guide_index: f64,
    pub mmi_index: f64,
}

/// A bi-convex (or bi-concave) spherical lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    /// Axial position of the lens centre (µm).
    pub centre_z: f64,
    /// Lateral position of the optical axis (µm).
    #[serde(default)]
    pub x_axis: f64,
    pub diameter: f64,
    /// Centre thickness (µm).
    pub thickness: f64,
    /// Radius of the entry surface (µm).
    pub r1: f64,
    /// Radius of the exit surface (µm).
    pub r2: f64,
    pub index: f64,
}

impl SBend {
    /// Core centre at axial position `z`.
    pub fn centre_at(&self, z: f64) -> f64 {
        let t = z - self.z_start;
        let raw = (self.offset / self.length) * t
            - (self.offset / (2.0 * PI)) * (2.0 * PI * t / self.length).sin();
        let (lo, hi) = if self.offset >= 0.0 { (0.0, self.offset) } else { (self.offset, 0.0) };
        self.x_start + raw.clamp(lo, hi)
    }
}

impl Lens {
    /// Axial interval occupied by the lens at lateral position `x`, or `None`
    /// outside its aperture.
    pub fn span_at(&self, x: f64) -> Option<(f64, f64)> {
        let r = x - self.x_axis;
        if r.abs() > self.diameter / 2.0 {
            return None;
        }
        let z1 = self.centre_z - self.thickness / 2.0;
        let z2 = self.centre_z + self.thickness / 2.0;
        let sag = |radius: f64| radius - (radius * radius - r * r).max(0.0).sqrt();
        Some((z1 + sag(self.r1), z2 - sag(self.r2)))
    }
}

impl Structure {
    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Structure::Slab(_) => "slab",
            Structure::SBend(_) => "s_bend",
            Structure::Mmi(_) => "mmi",
            Structure::Lens(_) => "lens",
        }
    }

    /// Index of this structure at (x, z), or `None` where it is absent.
    pub fn index_at(&self, x: f64, z: f64) -> Option<f64> {
        match self {
            Structure::Slab(s) => {
                let along = s.z_range.map_or(true, |[a, b]| z >= a && z <= b);
                (along && (x - s.centre).abs() <= s.width / 2.0).then_some(s.index)
            }
            Structure::SBend(b) => {
                ((x - b.centre_at(z)).abs() <= b.width / 2.0).then_some(b.index)
            }
            Structure::Mmi(m) => {
                let z_end = m.z_start + m.length;
                if z >= m.z_start && z <= z_end {
                    return (x.abs() <= m.mmi_width / 2.0).then_some(m.mmi_index);
                }
                let half = m.separation / 2.0;
                let in_guide = (x + half).abs() <= m.guide_width / 2.0
                    || (x - half).abs() <= m.guide_width / 2.0;
                in_guide.then_some(m.guide_index)
            }
            Structure::Lens(l) => {
                let (front, back) = l.span_at(x)?;
                (z >= front && z <= back).then_some(l.index)
            }
        }
    }

    /// Whether the structure looks the same at every z.
    pub fn is_z_invariant(&self) -> bool {
        matches!(self, Structure::Slab(Slab { z_range: None, .. }))
    }

    /// Lateral extent `(x_min, x_max)` over all z.
    pub fn x_extent(&self) -> (f64, f64) {
        match self {
            Structure::Slab(s) => (s.centre - s.width / 2.0, s.centre + s.width / 2.0),
            Structure::SBend(b) => {
                let ends = [b.x_start, b.x_start + b.offset];
                let lo = ends[0].min(ends[1]) - b.width / 2.0;
                let hi = ends[0].max(ends[1]) + b.width / 2.0;
                (lo, hi)
            }
            Structure::Mmi(m) => {
                let half = (m.mmi_width / 2.0).max(m.separation / 2.0 + m.guide_width / 2.0);
                (-half, half)
            }
            Structure::Lens(l) => (l.x_axis - l.diameter / 2.0, l.x_axis + l.diameter / 2.0),
        }
    }

    /// Check physical parameters. `position` is the structure's place in the
    /// layout and only labels the error.
    pub fn validate(&self, position: usize) -> Result<(), LayoutError> {
        let fail = |reason: String| LayoutError::InvalidStructure {
            position,
            kind: self.kind(),
            reason,
        };
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(fail(format!("{name} must be positive and finite, got {value}")))
            }
        };
        let finite = |name: &str, value: f64| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(fail(format!("{name} must be finite, got {value}")))
            }
        };

        match self {
            Structure::Slab(s) => {
                finite("centre", s.centre)?;
                positive("width", s.width)?;
                positive("index", s.index)?;
                if let Some([a, b]) = s.z_range {
                    finite("z_range start", a)?;
                    finite("z_range end", b)?;
                    if b < a {
                        return Err(fail(format!("z_range [{a}, {b}] is reversed")));
                    }
                }
            }
            Structure::SBend(b) => {
                finite("x_start", b.x_start)?;
                finite("z_start", b.z_start)?;
                finite("offset", b.offset)?;
                positive("length", b.length)?;
                positive("width", b.width)?;
                positive("index", b.index)?;
            }
            Structure::Mmi(m) => {
                finite("z_start", m.z_start)?;
                positive("length", m.length)?;
                positive("mmi_width", m.mmi_width)?;
                positive("guide_width", m.guide_width)?;
                positive("separation", m.separation)?;
                positive("guide_index", m.guide_index)?;
                positive("mmi_index", m.mmi_index)?;
                if m.separation + m.guide_width > m.mmi_width {
                    return Err(fail(format!(
                        "access guides span {} um, wider than the {} um section",
                        m.separation + m.guide_width,
                        m.mmi_width
                    )));
                }
            }
            Structure::Lens(l) => {
                finite("centre_z", l.centre_z)?;
                finite("x_axis", l.x_axis)?;
                positive("diameter", l.diameter)?;
                positive("thickness", l.thickness)?;
                positive("r1", l.r1)?;
                positive("r2", l.r2)?;
                positive("index", l.index)?;
            }
        }
        Ok(())
    }
}
