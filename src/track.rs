//! Track geometry: occupancy masks, ray casting, and the injected track resource.
//!
//! The track is supplied already loaded and scaled (image decoding is the
//! caller's concern) as a set of binary occupancy masks over one fixed 2D
//! coordinate space. Everything here is read-only after construction and is
//! shared by every car and every episode.

use thiserror::Error;

/// Number of ray-cast directions sampled per observation.
pub const RAY_COUNT: usize = 8;

/// Angular spacing between consecutive rays, in degrees.
pub const RAY_STEP_DEG: f64 = 360.0 / RAY_COUNT as f64;

/// Errors raised while assembling a [`Track`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("border mask must have nonzero dimensions")]
    EmptyField,

    #[error("grass mask is {got_width}x{got_height} but the border mask is {want_width}x{want_height}")]
    GrassSizeMismatch {
        got_width: u32,
        got_height: u32,
        want_width: u32,
        want_height: u32,
    },
}

/// A binary occupancy grid over pixel coordinates.
///
/// Cells outside the grid read as empty, so walks and overlap queries never
/// index out of bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl Mask {
    /// Creates an all-empty mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; (width * height) as usize],
        }
    }

    /// Creates an all-occupied mask.
    pub fn filled(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![true; (width * height) as usize],
        }
    }

    /// Builds a mask by sampling `f` at every cell.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut mask = Self::empty(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.cells[(y * width + x) as usize] = f(x, y);
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns whether the cell at `(x, y)` is occupied; out-of-bounds
    /// coordinates are empty.
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.cells[(y as u32 * self.width + x as u32) as usize]
    }

    /// Sets the cell at `(x, y)`. Intended for drivers building masks from
    /// decoded assets; no-op outside the grid.
    pub fn set(&mut self, x: u32, y: u32, occupied: bool) {
        if x < self.width && y < self.height {
            self.cells[(y * self.width + x) as usize] = occupied;
        }
    }

    /// Clears every cell that is occupied in `other`.
    ///
    /// Used to carve the drivable surface out of an off-track mask so the two
    /// never overlap.
    pub fn clear_where(&mut self, other: &Mask) {
        for y in 0..self.height {
            for x in 0..self.width {
                if other.get(x as i64, y as i64) {
                    self.cells[(y * self.width + x) as usize] = false;
                }
            }
        }
    }

    /// Returns the first overlapping pixel between `self` and `other`, where
    /// `offset` places `other`'s top-left corner in `self`'s coordinates.
    ///
    /// The returned point is in `self`'s coordinate space. The scan is
    /// row-major over `other`, so the result is deterministic. Returns `None`
    /// when the masks are disjoint.
    pub fn overlap(&self, other: &Mask, offset: (i64, i64)) -> Option<(i64, i64)> {
        for y in 0..other.height {
            for x in 0..other.width {
                if !other.cells[(y * other.width + x) as usize] {
                    continue;
                }
                let px = x as i64 + offset.0;
                let py = y as i64 + offset.1;
                if self.get(px, py) {
                    return Some((px, py));
                }
            }
        }
        None
    }

    /// Walks outward from `origin` along `angle_deg` in unit steps until a
    /// cell reports occupancy, returning the distance traveled.
    ///
    /// Saturates at `max_length`: an open direction reports a bounded "far"
    /// distance rather than infinity, so it still discretizes into the
    /// environment's distance bins.
    pub fn ray_cast(&self, origin: (f64, f64), angle_deg: f64, max_length: f64) -> f64 {
        let rad = angle_deg.to_radians();
        let (dy, dx) = rad.sin_cos();
        let mut length = 0.0;
        while length < max_length {
            length += 1.0;
            let tx = (origin.0 + length * dx) as i64;
            let ty = (origin.1 + length * dy) as i64;
            if self.get(tx, ty) {
                return length;
            }
        }
        max_length
    }

    /// Rasterizes a `length` x `width` rectangle rotated by `angle_deg` about
    /// its center, into a mask the size of the rotated bounding box.
    ///
    /// This is the car's collision footprint; it is recomputed whenever the
    /// heading changes.
    pub fn rotated_rect(length: u32, width: u32, angle_deg: f64) -> Mask {
        let rad = angle_deg.to_radians();
        let (mut s, mut c) = rad.sin_cos();
        // Trig noise at cardinal angles would inflate the bounding box by a
        // whole cell once ceiled.
        if s.abs() < 1e-12 {
            s = 0.0;
        }
        if c.abs() < 1e-12 {
            c = 0.0;
        }
        let bb_w = (length as f64 * c.abs() + width as f64 * s.abs()).ceil().max(1.0);
        let bb_h = (length as f64 * s.abs() + width as f64 * c.abs()).ceil().max(1.0);
        let (half_l, half_w) = (length as f64 / 2.0, width as f64 / 2.0);
        Mask::from_fn(bb_w as u32, bb_h as u32, |x, y| {
            let dx = x as f64 + 0.5 - bb_w / 2.0;
            let dy = y as f64 + 0.5 - bb_h / 2.0;
            // Rotate back into the unrotated body frame.
            let u = dx * c + dy * s;
            let v = dy * c - dx * s;
            u.abs() <= half_l && v.abs() <= half_w
        })
    }
}

/// The four cardinal spawn headings, in the game's screen convention
/// (y grows downward, heading 0 degrees points up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnHeading {
    Up,
    Left,
    Down,
    Right,
}

impl SpawnHeading {
    /// The heading angle in degrees.
    pub fn angle_degrees(self) -> f64 {
        match self {
            SpawnHeading::Up => 0.0,
            SpawnHeading::Left => 90.0,
            SpawnHeading::Down => 180.0,
            SpawnHeading::Right => 270.0,
        }
    }

    /// All headings in angle order.
    pub fn all() -> [SpawnHeading; 4] {
        [
            SpawnHeading::Up,
            SpawnHeading::Left,
            SpawnHeading::Down,
            SpawnHeading::Right,
        ]
    }
}

/// Returns whether a car spawned with `spawn_heading` has completed a full
/// lap, given the finish-line reference coordinate and its current position.
///
/// The comparison runs along the axis implied by the spawn heading, in the
/// direction that only becomes true after a full revolution of the circuit.
/// A car that reaches the finish zone going backward, or before completing
/// the loop, approaches from the other side and fails the check. No path
/// history is needed.
pub fn has_completed_lap(
    spawn_heading: SpawnHeading,
    finish_position: (f64, f64),
    position: (f64, f64),
) -> bool {
    match spawn_heading {
        SpawnHeading::Up => position.1 >= finish_position.1,
        SpawnHeading::Left => position.0 >= finish_position.0,
        SpawnHeading::Down => position.1 <= finish_position.1,
        SpawnHeading::Right => position.0 <= finish_position.0,
    }
}

/// The immutable track resource injected into an environment.
///
/// Holds the border mask (field-sized), an optional off-track mask (same
/// dimensions), the finish-line mask with its placement coordinate, and the
/// spawn pose. Loaded once and shared read-only by all cars and episodes;
/// never module-level global state.
#[derive(Debug, Clone)]
pub struct Track {
    border: Mask,
    grass: Option<Mask>,
    finish: Mask,
    finish_position: (f64, f64),
    start_position: (f64, f64),
    spawn_heading: SpawnHeading,
}

impl Track {
    /// Assembles a track, validating mask dimensions.
    pub fn new(
        border: Mask,
        grass: Option<Mask>,
        finish: Mask,
        finish_position: (f64, f64),
        start_position: (f64, f64),
        spawn_heading: SpawnHeading,
    ) -> Result<Self, TrackError> {
        if border.width() == 0 || border.height() == 0 {
            return Err(TrackError::EmptyField);
        }
        if let Some(grass) = &grass {
            if grass.width() != border.width() || grass.height() != border.height() {
                return Err(TrackError::GrassSizeMismatch {
                    got_width: grass.width(),
                    got_height: grass.height(),
                    want_width: border.width(),
                    want_height: border.height(),
                });
            }
        }
        Ok(Self {
            border,
            grass,
            finish,
            finish_position,
            start_position,
            spawn_heading,
        })
    }

    pub fn border(&self) -> &Mask {
        &self.border
    }

    pub fn grass(&self) -> Option<&Mask> {
        self.grass.as_ref()
    }

    pub fn finish(&self) -> &Mask {
        &self.finish
    }

    pub fn finish_position(&self) -> (f64, f64) {
        self.finish_position
    }

    pub fn start_position(&self) -> (f64, f64) {
        self.start_position
    }

    pub fn spawn_heading(&self) -> SpawnHeading {
        self.spawn_heading
    }

    pub fn width(&self) -> u32 {
        self.border.width()
    }

    pub fn height(&self) -> u32 {
        self.border.height()
    }

    /// The larger of the field's dimensions: the ray saturation length and
    /// the upper bound of the distance bins.
    pub fn max_extent(&self) -> f64 {
        self.border.width().max(self.border.height()) as f64
    }
}
