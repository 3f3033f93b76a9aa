// Core value types for the robot control protocol.
//
// `Position` is the integer grid coordinate the robot reports after every
// command. `Direction` is a cardinal facing on that grid, and `Action` is one
// movement command the server can issue. These are shared by the server's
// navigator (`robot_control_server::navigator`) and by test clients that
// simulate a robot.
//
// Grid conventions: x grows to the right, y grows upward. The target of every
// dialogue is the origin `(0, 0)`.

use std::fmt;

/// A cell on the robot's grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Position = Position::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to the origin.
    pub fn distance_to_origin(self) -> u32 {
        self.x.unsigned_abs() + self.y.unsigned_abs()
    }

    pub fn is_origin(self) -> bool {
        self == Self::ORIGIN
    }

    /// The neighbouring cell one step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal facing of the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Unit step `(dx, dy)` taken by a move in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
        }
    }

    /// Facing after a clockwise quarter turn.
    pub fn turned_right(self) -> Self {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    /// Facing after a counter-clockwise quarter turn.
    pub fn turned_left(self) -> Self {
        match self {
            Direction::Up => Direction::Left,
            Direction::Left => Direction::Down,
            Direction::Down => Direction::Right,
            Direction::Right => Direction::Up,
        }
    }

    /// Infer the facing from a single move's displacement. Returns `None` when
    /// the robot did not move. If both axes changed (which a well-behaved
    /// robot never reports), the x axis wins.
    pub fn from_delta(from: Position, to: Position) -> Option<Self> {
        if to.x > from.x {
            Some(Direction::Right)
        } else if to.x < from.x {
            Some(Direction::Left)
        } else if to.y > from.y {
            Some(Direction::Up)
        } else if to.y < from.y {
            Some(Direction::Down)
        } else {
            None
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
        };
        f.write_str(name)
    }
}

/// A single movement command sent to the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Move,
    TurnLeft,
    TurnRight,
}

impl Action {
    /// Facing after this action is executed from `facing`.
    pub fn apply(self, facing: Direction) -> Direction {
        match self {
            Action::Move => facing,
            Action::TurnLeft => facing.turned_left(),
            Action::TurnRight => facing.turned_right(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_right_turns_are_identity() {
        for d in [Direction::Up, Direction::Right, Direction::Down, Direction::Left] {
            assert_eq!(d.turned_right().turned_right().turned_right().turned_right(), d);
            assert_eq!(d.turned_left().turned_right(), d);
        }
    }

    #[test]
    fn from_delta_matches_step() {
        let start = Position::new(3, -2);
        for d in [Direction::Up, Direction::Right, Direction::Down, Direction::Left] {
            assert_eq!(Direction::from_delta(start, start.step(d)), Some(d));
        }
        assert_eq!(Direction::from_delta(start, start), None);
    }

    #[test]
    fn distance_to_origin() {
        assert_eq!(Position::new(-3, 4).distance_to_origin(), 7);
        assert!(Position::new(0, 0).is_origin());
        assert!(!Position::new(0, 1).is_origin());
    }
}
