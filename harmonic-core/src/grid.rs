use crate::error::{HarmonicError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellClass {
    Free = 0,
    Obstacle = 1,
    Goal = 2,
}

impl CellClass {
    /// Fixed cells hold a Dirichlet value and are never relaxed.
    #[inline]
    pub fn is_fixed(self) -> bool {
        !matches!(self, CellClass::Free)
    }

    pub fn as_char(self) -> char {
        match self {
            CellClass::Free => '.',
            CellClass::Obstacle => '#',
            CellClass::Goal => 'G',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(CellClass::Free),
            '#' => Some(CellClass::Obstacle),
            'G' => Some(CellClass::Goal),
            _ => None,
        }
    }
}

/// Narrow view of a decoded image: dimensions plus per-pixel colour.
///
/// File formats never reach the core; loaders implement this trait.
pub trait PixelSource {
    fn dimensions(&self) -> (u32, u32);

    /// RGB colour of pixel (x, y), row 0 at the top
    fn rgb(&self, x: u32, y: u32) -> [u8; 3];
}

/// Borrowed RGBA8 buffer, e.g. canvas `ImageData`.
pub struct RgbaPixels<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> RgbaPixels<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                HarmonicError::InvalidMap(format!("RGBA buffer size overflows for {width}x{height}"))
            })?;
        if data.len() != expected {
            return Err(HarmonicError::InvalidMap(format!(
                "RGBA buffer holds {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }
}

impl PixelSource for RgbaPixels<'_> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Colour thresholds used to classify pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelThresholds {
    /// Pixels with luma at or below this are obstacles (dark = occupied)
    pub obstacle_max_luma: u8,
    pub goal_min_red: u8,
    pub goal_max_green_blue: u8,
}

impl Default for PixelThresholds {
    fn default() -> Self {
        Self {
            obstacle_max_luma: 127,
            goal_min_red: 200,
            goal_max_green_blue: 80,
        }
    }
}

impl PixelThresholds {
    pub fn classify(&self, [r, g, b]: [u8; 3]) -> CellClass {
        if r >= self.goal_min_red && g <= self.goal_max_green_blue && b <= self.goal_max_green_blue
        {
            return CellClass::Goal;
        }
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
        if luma <= self.obstacle_max_luma as u32 {
            CellClass::Obstacle
        } else {
            CellClass::Free
        }
    }
}

/// Immutable W×H classification grid, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct GridMap {
    width: usize,
    height: usize,
    cells: Vec<CellClass>,
}

impl GridMap {
    pub fn from_cells(width: usize, height: usize, cells: Vec<CellClass>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(HarmonicError::InvalidMap(format!(
                "map has zero area ({width}x{height})"
            )));
        }
        let expected = width.checked_mul(height).ok_or_else(|| {
            HarmonicError::InvalidMap(format!("cell count overflows for {width}x{height}"))
        })?;
        if cells.len() != expected {
            return Err(HarmonicError::InvalidMap(format!(
                "expected {} cells for {}x{}, got {}",
                expected,
                width,
                height,
                cells.len()
            )));
        }
        if !cells.contains(&CellClass::Goal) {
            return Err(HarmonicError::InvalidMap("map has no goal cell".into()));
        }

        let map = Self { width, height, cells };
        debug!(
            "GridMap {}x{}: {} free, {} obstacle, {} goal",
            width,
            height,
            map.count(CellClass::Free),
            map.count(CellClass::Obstacle),
            map.count(CellClass::Goal)
        );
        Ok(map)
    }

    /// Classify every pixel once; the result is never re-derived.
    pub fn from_pixels<P: PixelSource + ?Sized>(
        source: &P,
        thresholds: &PixelThresholds,
    ) -> Result<Self> {
        let (w, h) = source.dimensions();
        let count = (w as usize).checked_mul(h as usize).ok_or_else(|| {
            HarmonicError::InvalidMap(format!("cell count overflows for {w}x{h}"))
        })?;
        let mut cells = Vec::new();
        cells.try_reserve_exact(count).map_err(|e| {
            HarmonicError::InvalidMap(format!("cannot allocate {w}x{h} map: {e}"))
        })?;
        for y in 0..h {
            for x in 0..w {
                cells.push(thresholds.classify(source.rgb(x, y)));
            }
        }
        Self::from_cells(w as usize, h as usize, cells)
    }

    /// Parse rows of `.`, `#` and `G`. Blank lines and surrounding
    /// whitespace are ignored; rows must have equal length.
    pub fn from_ascii(text: &str) -> Result<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let width = rows.first().map_or(0, |r| r.chars().count());
        let mut cells = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(HarmonicError::InvalidMap(format!(
                    "row {y} has {} cells, expected {width}",
                    row.chars().count()
                )));
            }
            for c in row.chars() {
                let class = CellClass::from_char(c).ok_or_else(|| {
                    HarmonicError::InvalidMap(format!("unknown cell character {c:?} in row {y}"))
                })?;
                cells.push(class);
            }
        }
        Self::from_cells(width, rows.len(), cells)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Class of cell (x, y). Coordinates outside the grid are obstacles.
    #[inline]
    pub fn classify(&self, x: usize, y: usize) -> CellClass {
        if self.in_bounds(x, y) {
            self.cells[y * self.width + x]
        } else {
            CellClass::Obstacle
        }
    }

    pub fn cells(&self) -> &[CellClass] {
        &self.cells
    }

    pub fn count(&self, class: CellClass) -> usize {
        self.cells.iter().filter(|&&c| c == class).count()
    }

    /// Mask of cells connected to a goal through 4-connected free cells.
    ///
    /// Goal cells are marked; obstacles never are. Free cells left unmarked
    /// form disconnected regions that relax to the obstacle plateau.
    pub fn goal_reachable(&self) -> Vec<bool> {
        let mut reached = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        for (i, &c) in self.cells.iter().enumerate() {
            if c == CellClass::Goal {
                reached[i] = true;
                queue.push_back(i);
            }
        }

        while let Some(i) = queue.pop_front() {
            let (x, y) = (i % self.width, i / self.width);
            let neighbors = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbors {
                if !self.in_bounds(nx, ny) {
                    continue;
                }
                let j = ny * self.width + nx;
                if !reached[j] && self.cells[j] == CellClass::Free {
                    reached[j] = true;
                    queue.push_back(j);
                }
            }
        }
        reached
    }

    /// Number of free cells with no free path to any goal.
    pub fn unreachable_free_count(&self) -> usize {
        let reached = self.goal_reachable();
        self.cells
            .iter()
            .zip(&reached)
            .filter(|&(&c, &r)| c == CellClass::Free && !r)
            .count()
    }
}

impl fmt::Display for GridMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.width) {
            let line: String = row.iter().map(|c| c.as_char()).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
