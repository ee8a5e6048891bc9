use harmonic_core::{
    BoundaryValues, FieldSampler, GridMap, HarmonicField, PixelThresholds, RgbaPixels, SweepOrder,
    solve,
};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct Planner {
    field: HarmonicField,
}

#[wasm_bindgen]
impl Planner {
    /// Build from an RGBA buffer (e.g. canvas `ImageData.data`).
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, rgba: &[u8]) -> Result<Planner, JsValue> {
        let pixels = RgbaPixels::new(width, height, rgba).map_err(to_js)?;
        let map = GridMap::from_pixels(&pixels, &PixelThresholds::default()).map_err(to_js)?;
        let field = HarmonicField::initialize(map, BoundaryValues::default()).map_err(to_js)?;
        Ok(Planner { field })
    }

    /// `max_iterations == 0` means unbounded.
    pub fn solve(&mut self, epsilon: f64, max_iterations: u32) -> Result<SolveInfo, JsValue> {
        let cap = (max_iterations > 0).then_some(max_iterations);
        let t0 = now_ms();
        let report = solve(&mut self.field, epsilon, cap).map_err(to_js)?;
        let t1 = now_ms();
        Ok(SolveInfo {
            iterations: report.iterations,
            compute_ms: t1 - t0,
            converged: report.converged,
            max_delta: report.final_max_delta.unwrap_or(0.0),
        })
    }

    /// One Gauss-Seidel sweep; returns its max change.
    pub fn sweep(&mut self) -> f64 {
        self.field.sweep(SweepOrder::GaussSeidel)
    }

    pub fn width(&self) -> usize { self.field.width() }
    pub fn height(&self) -> usize { self.field.height() }
    pub fn sweeps(&self) -> u32 { self.field.sweeps() }

    // Copy-based JS access
    pub fn get_field(&self) -> Vec<f64> {
        self.field.values().to_vec()
    }

    pub fn value_at(&self, x: usize, y: usize) -> Result<f64, JsValue> {
        FieldSampler::new(&self.field).value_at(x, y).map_err(to_js)
    }

    pub fn interpolate(&self, fx: f64, fy: f64) -> Result<f64, JsValue> {
        FieldSampler::new(&self.field).interpolate(fx, fy).map_err(to_js)
    }

    /// `[dx, dy]`
    pub fn gradient(&self, fx: f64, fy: f64) -> Result<Vec<f64>, JsValue> {
        let (dx, dy) = FieldSampler::new(&self.field).gradient(fx, fy).map_err(to_js)?;
        Ok(vec![dx, dy])
    }

    pub fn summary(&self) -> String {
        self.field.to_string()
    }
}

#[wasm_bindgen]
pub struct SolveInfo {
    iterations: u32,
    compute_ms: f64,
    converged: bool,
    max_delta: f64,
}

#[wasm_bindgen]
impl SolveInfo {
    pub fn iterations(&self) -> u32 { self.iterations }
    pub fn compute_ms(&self) -> f64 { self.compute_ms }
    pub fn converged(&self) -> bool { self.converged }
    pub fn max_delta(&self) -> f64 { self.max_delta }
}

fn to_js(e: harmonic_core::HarmonicError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}
