use crate::error::{HarmonicError, Result};
use crate::field::HarmonicField;
use crate::grid::CellClass;

pub const DEFAULT_CD_PRECISION: f64 = 0.5;

/// Read-only queries over a solved field. Cell centres sit at integer
/// coordinates, so the continuous span is `[0, W-1] x [0, H-1]`.
#[derive(Clone, Copy, Debug)]
pub struct FieldSampler<'a> {
    field: &'a HarmonicField,
    cd_precision: f64,
}

impl<'a> FieldSampler<'a> {
    pub fn new(field: &'a HarmonicField) -> Self {
        Self {
            field,
            cd_precision: DEFAULT_CD_PRECISION,
        }
    }

    /// Offset used by [`Self::gradient`]. Non-positive or non-finite
    /// values are rejected.
    pub fn with_cd_precision(mut self, h: f64) -> Result<Self> {
        if !h.is_finite() || h <= 0.0 {
            return Err(HarmonicError::InvalidConfig(format!(
                "central difference precision must be positive (h={h})"
            )));
        }
        self.cd_precision = h;
        Ok(self)
    }

    pub fn field(&self) -> &'a HarmonicField {
        self.field
    }

    pub fn cd_precision(&self) -> f64 {
        self.cd_precision
    }

    pub fn contains(&self, fx: f64, fy: f64) -> bool {
        let max_x = (self.field.width() - 1) as f64;
        let max_y = (self.field.height() - 1) as f64;
        (0.0..=max_x).contains(&fx) && (0.0..=max_y).contains(&fy)
    }

    /// Class of the cell nearest to (fx, fy), rounding halves up.
    pub fn nearest_class(&self, fx: f64, fy: f64) -> Result<CellClass> {
        self.check(fx, fy)?;
        let x = (fx + 0.5).floor() as usize;
        let y = (fy + 0.5).floor() as usize;
        Ok(self.field.map().classify(x, y))
    }

    pub fn value_at(&self, x: usize, y: usize) -> Result<f64> {
        self.field.value(x, y).ok_or(HarmonicError::OutOfBounds {
            x: x as f64,
            y: y as f64,
            width: self.field.width(),
            height: self.field.height(),
        })
    }

    /// Bilinear interpolation; exact at integer coordinates.
    pub fn interpolate(&self, fx: f64, fy: f64) -> Result<f64> {
        self.check(fx, fy)?;
        Ok(self.bilinear(fx, fy))
    }

    /// Central-difference estimate of (dφ/dx, dφ/dy).
    ///
    /// Offsets that would leave the span are clamped to it and the
    /// difference is divided by the actual spacing. A one-cell-wide axis
    /// has zero derivative.
    pub fn gradient(&self, fx: f64, fy: f64) -> Result<(f64, f64)> {
        self.check(fx, fy)?;
        let h = self.cd_precision;
        let max_x = (self.field.width() - 1) as f64;
        let max_y = (self.field.height() - 1) as f64;

        let (x0, x1) = ((fx - h).max(0.0), (fx + h).min(max_x));
        let (y0, y1) = ((fy - h).max(0.0), (fy + h).min(max_y));

        let dx = if x1 > x0 {
            (self.bilinear(x1, fy) - self.bilinear(x0, fy)) / (x1 - x0)
        } else {
            0.0
        };
        let dy = if y1 > y0 {
            (self.bilinear(fx, y1) - self.bilinear(fx, y0)) / (y1 - y0)
        } else {
            0.0
        };
        Ok((dx, dy))
    }

    /// Unit vector along the negative gradient, `None` on a flat plateau.
    pub fn descent_direction(&self, fx: f64, fy: f64) -> Result<Option<(f64, f64)>> {
        let (dx, dy) = self.gradient(fx, fy)?;
        let norm = dx.hypot(dy);
        if norm <= f64::EPSILON {
            return Ok(None);
        }
        Ok(Some((-dx / norm, -dy / norm)))
    }

    fn check(&self, fx: f64, fy: f64) -> Result<()> {
        if self.contains(fx, fy) {
            Ok(())
        } else {
            Err(HarmonicError::OutOfBounds {
                x: fx,
                y: fy,
                width: self.field.width(),
                height: self.field.height(),
            })
        }
    }

    // Caller guarantees (fx, fy) is in the span.
    fn bilinear(&self, fx: f64, fy: f64) -> f64 {
        let w = self.field.width();
        let h = self.field.height();
        let values = self.field.values();

        // The last cell pairs with its left/upper neighbour so that
        // x = W-1 lands on alpha = 1 instead of indexing past the edge.
        let x0 = (fx.floor() as usize).min(w.saturating_sub(2));
        let y0 = (fy.floor() as usize).min(h.saturating_sub(2));
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let alpha = fx - x0 as f64;
        let beta = fy - y0 as f64;

        let at = |x: usize, y: usize| values[y * w + x];
        let top = (1.0 - alpha) * at(x0, y0) + alpha * at(x1, y0);
        let bottom = (1.0 - alpha) * at(x0, y1) + alpha * at(x1, y1);
        (1.0 - beta) * top + beta * bottom
    }
}
