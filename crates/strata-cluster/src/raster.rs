//! Raster utilities: a dense 2D [`Grid`], integer [`Bounds`], and the 8-neighborhood.

use glam::IVec2;

/// Offsets of the eight neighbors of a texel, clockwise from top-left.
pub const NEIGHBORS_8: [IVec2; 8] = [
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(1, 1),
    IVec2::new(0, 1),
    IVec2::new(-1, 1),
    IVec2::new(-1, 0),
];

/// Returns `true` if both dimensions are non-zero powers of two.
pub fn is_power_of_two_dims(width: u32, height: u32) -> bool {
    width.is_power_of_two() && height.is_power_of_two()
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Inclusive integer bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    /// Minimum corner (inclusive).
    pub min: IVec2,
    /// Maximum corner (inclusive).
    pub max: IVec2,
}

impl Bounds {
    /// A box covering a single point.
    pub fn point(p: IVec2) -> Self {
        Self { min: p, max: p }
    }

    /// Grows the box to include `p`.
    pub fn include(&mut self, p: IVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Width in texels.
    pub fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    /// Height in texels.
    pub fn height(&self) -> i32 {
        self.max.y - self.min.y + 1
    }

    /// Overlap test after expanding both boxes by `expand` on every side.
    pub fn intersects(&self, other: &Bounds, expand: i32) -> bool {
        debug_assert!(self.min.cmple(self.max).all());
        debug_assert!(other.min.cmple(other.max).all());

        other.max.x + expand >= self.min.x - expand
            && other.min.x - expand <= self.max.x + expand
            && other.max.y + expand >= self.min.y - expand
            && other.min.y - expand <= self.max.y + expand
    }

    /// Intersection of both boxes after expanding each by `expand`.
    ///
    /// Returns `None` when the expanded boxes do not overlap.
    pub fn intersection(&self, other: &Bounds, expand: i32) -> Option<Bounds> {
        let e = IVec2::splat(expand);
        let min = (self.min - e).max(other.min - e);
        let max = (self.max + e).min(other.max + e);
        if min.x > max.x || min.y > max.y {
            return None;
        }
        Some(Bounds { min, max })
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Dense row-major 2D array.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

impl<T: Copy> Grid<T> {
    /// Creates a grid with every cell set to `fill`.
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            width,
            height,
            data: vec![fill; width as usize * height as usize],
        }
    }

    /// Grid width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Cell at `(x, y)`. Panics when out of range.
    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[self.index(x, y)]
    }

    /// Cell at a signed position, or `None` outside the grid.
    pub fn get_at(&self, p: IVec2) -> Option<T> {
        self.in_bounds(p)
            .then(|| self.data[p.y as usize * self.width as usize + p.x as usize])
    }

    /// Overwrites the cell at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let i = self.index(x, y);
        self.data[i] = value;
    }

    /// Mutable access to the cell at `(x, y)`.
    pub fn get_mut(&mut self, x: u32, y: u32) -> &mut T {
        let i = self.index(x, y);
        &mut self.data[i]
    }

    /// Returns `true` if the signed position lies inside the grid.
    pub fn in_bounds(&self, p: IVec2) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < self.width && (p.y as u32) < self.height
    }

    /// Row-major cells.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }
}
