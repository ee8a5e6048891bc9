use harmonic_core::{CellClass, GridMap, HarmonicError, Result};
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapKind {
    Scatter,
    Walls,
    Pillars,
}

impl MapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapKind::Scatter => "scatter",
            MapKind::Walls => "walls",
            MapKind::Pillars => "pillars",
        }
    }
}

pub fn sample_map_kind<R: Rng>(rng: &mut R) -> MapKind {
    match rng.gen_range(0..3) {
        0 => MapKind::Scatter,
        1 => MapKind::Walls,
        _ => MapKind::Pillars,
    }
}

/// Random map with an obstacle border and a 2x2 goal blob.
///
/// Obstacles are drawn first and the goal is stamped last, so the goal
/// always survives. Free regions are not guaranteed to connect to it.
pub fn generate_map<R: Rng>(rng: &mut R, w: usize, h: usize, kind: MapKind) -> Result<GridMap> {
    if w < 5 || h < 5 {
        return Err(HarmonicError::InvalidMap(format!(
            "random maps need at least 5x5 cells, got {w}x{h}"
        )));
    }

    let mut cells = vec![CellClass::Free; w * h];
    let mut set = |x: usize, y: usize, c: CellClass| cells[y * w + x] = c;

    for x in 0..w {
        set(x, 0, CellClass::Obstacle);
        set(x, h - 1, CellClass::Obstacle);
    }
    for y in 0..h {
        set(0, y, CellClass::Obstacle);
        set(w - 1, y, CellClass::Obstacle);
    }

    match kind {
        MapKind::Scatter => {
            let rects = rng.gen_range(3..=8);
            for _ in 0..rects {
                let x0 = rng.gen_range(1..w - 1);
                let y0 = rng.gen_range(1..h - 1);
                let rw = rng.gen_range(1..=(w / 5).max(1));
                let rh = rng.gen_range(1..=(h / 5).max(1));

                let x1 = (x0 + rw).min(w - 2);
                let y1 = (y0 + rh).min(h - 2);

                for y in y0..=y1 {
                    for x in x0..=x1 {
                        set(x, y, CellClass::Obstacle);
                    }
                }
            }
        }

        MapKind::Walls => {
            // vertical walls, each with one door
            let walls = rng.gen_range(1..=((w - 2) / 6).clamp(1, 4));
            for _ in 0..walls {
                let wx = rng.gen_range(2..w - 2);
                let door = rng.gen_range(1..h - 1);
                let door_len = rng.gen_range(1..=(h / 4).max(1));
                for y in 1..h - 1 {
                    if y < door || y >= door + door_len {
                        set(wx, y, CellClass::Obstacle);
                    }
                }
            }
        }

        MapKind::Pillars => {
            for y in (2..h - 2).step_by(3) {
                for x in (2..w - 2).step_by(3) {
                    if rng.gen_bool(0.7) {
                        set(x, y, CellClass::Obstacle);
                    }
                }
            }
        }
    }

    let gx = rng.gen_range(1..w - 2);
    let gy = rng.gen_range(1..h - 2);
    for y in gy..gy + 2 {
        for x in gx..gx + 2 {
            set(x, y, CellClass::Goal);
        }
    }

    GridMap::from_cells(w, h, cells)
}
