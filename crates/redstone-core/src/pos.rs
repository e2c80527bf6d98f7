use serde::{Deserialize, Serialize};

/// A cell in the world grid. Cheap to copy and compare; used as a map and
/// queue key throughout the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The adjacent position in `dir`.
    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy, dz) = dir.delta();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// All six adjacent positions, in neighbor update order.
    pub fn neighbors(self) -> impl Iterator<Item = (Direction, BlockPos)> {
        Direction::UPDATE_ORDER
            .into_iter()
            .map(move |dir| (dir, self.offset(dir)))
    }

    /// The direction leading from `self` to an adjacent `other`, if any.
    pub fn direction_to(self, other: BlockPos) -> Option<Direction> {
        Direction::ALL.into_iter().find(|&d| self.offset(d) == other)
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    /// All directions in declaration order.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Order in which neighbors are notified. Fixed so that circuits evolve
    /// identically on every run.
    pub const UPDATE_ORDER: [Direction; 6] = [
        Direction::West,
        Direction::East,
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
    ];

    pub const HORIZONTAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    pub fn is_horizontal(self) -> bool {
        !matches!(self, Direction::Down | Direction::Up)
    }

    /// Clockwise rotation seen from above. Vertical directions are unchanged.
    pub fn rotate_cw(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            vertical => vertical,
        }
    }

    /// Counter-clockwise rotation seen from above.
    pub fn rotate_ccw(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
            vertical => vertical,
        }
    }

    /// The two horizontal directions perpendicular to `self`. Empty for
    /// vertical directions.
    pub fn sides(self) -> Vec<Direction> {
        if self.is_horizontal() {
            vec![self.rotate_ccw(), self.rotate_cw()]
        } else {
            Vec::new()
        }
    }
}
