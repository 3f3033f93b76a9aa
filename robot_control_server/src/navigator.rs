// Navigation toward the origin from indirect feedback.
//
// The robot never says where it is facing or whether a move failed. All the
// navigator sees is the coordinate report that follows each command, so it
// infers everything from consecutive reports:
//
// - **Facing.** After a MOVE that changed the position, the displacement gives
//   the facing. Turns then rotate the known facing; an unknown facing stays
//   unknown until a move succeeds.
// - **Obstruction.** A MOVE followed by an unchanged position means the cell
//   ahead is blocked.
//
// Decision procedure, one action per report:
//
// 1. The first report after login is only a baseline (the login MOVE cannot
//    be judged without a previous position), so a second MOVE follows.
// 2. A blocked MOVE with unknown facing queues `TURN RIGHT, MOVE` to try
//    another direction. Repeats until a move succeeds.
// 3. A blocked MOVE with known facing queues an eight-step detour around the
//    single blocked cell. The detour ends two cells ahead with the original
//    facing. It sidesteps toward the origin when the robot is off the
//    perpendicular axis; otherwise it goes left above the x axis and right
//    below it. The rest of a detour is dropped as soon as a MOVE lands the
//    robot on zero along its facing axis: continuing would overshoot, and the
//    heading logic takes over from a strictly closer position.
// 4. Otherwise keep moving if the current facing reduces the distance, else
//    turn toward the axis with the larger remaining offset (ties go to y) and
//    move.
// 5. A report of `(0, 0)` ends navigation.
//
// Queued actions are drained one per report; a blocked MOVE inside a queue
// discards the rest and starts over as a fresh obstruction.
//
// See also: `session.rs`, which feeds reports in and sends the actions out.

use std::collections::VecDeque;

use robot_control_protocol::{Action, Direction, Position};
use tracing::debug;

const LEFT_DETOUR: [Action; 8] = [
    Action::TurnLeft,
    Action::Move,
    Action::TurnRight,
    Action::Move,
    Action::Move,
    Action::TurnRight,
    Action::Move,
    Action::TurnLeft,
];

const RIGHT_DETOUR: [Action; 8] = [
    Action::TurnRight,
    Action::Move,
    Action::TurnLeft,
    Action::Move,
    Action::Move,
    Action::TurnLeft,
    Action::Move,
    Action::TurnRight,
];

const DISAMBIGUATE: [Action; 2] = [Action::TurnRight, Action::Move];

/// Which way a detour sidesteps, relative to the robot's facing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetourSide {
    Left,
    Right,
}

/// The scripted maneuver around a blocked cell.
pub fn detour(side: DetourSide) -> &'static [Action] {
    match side {
        DetourSide::Left => &LEFT_DETOUR,
        DetourSide::Right => &RIGHT_DETOUR,
    }
}

/// Pick the detour side for a robot at `at` blocked while facing `facing`.
pub fn detour_side(facing: Direction, at: Position) -> DetourSide {
    let toward_origin = if facing.is_horizontal() {
        vertical_toward_origin(at)
    } else {
        horizontal_toward_origin(at)
    };
    match toward_origin {
        Some(dir) if dir == facing.turned_left() => DetourSide::Left,
        Some(_) => DetourSide::Right,
        None if at.y < 0 => DetourSide::Right,
        None => DetourSide::Left,
    }
}

/// Actions that point a robot at `at`, facing `facing`, toward the origin and
/// advance one cell. Empty at the origin.
pub fn heading(facing: Direction, at: Position) -> Vec<Action> {
    let Some(target) = preferred_direction(facing, at) else {
        return Vec::new();
    };
    let mut actions = if target == facing {
        Vec::new()
    } else if target == facing.turned_right() {
        vec![Action::TurnRight]
    } else if target == facing.turned_left() {
        vec![Action::TurnLeft]
    } else {
        vec![Action::TurnRight, Action::TurnRight]
    };
    actions.push(Action::Move);
    actions
}

fn horizontal_toward_origin(at: Position) -> Option<Direction> {
    match at.x.signum() {
        1 => Some(Direction::Left),
        -1 => Some(Direction::Right),
        _ => None,
    }
}

fn vertical_toward_origin(at: Position) -> Option<Direction> {
    match at.y.signum() {
        1 => Some(Direction::Down),
        -1 => Some(Direction::Up),
        _ => None,
    }
}

fn preferred_direction(facing: Direction, at: Position) -> Option<Direction> {
    let horizontal = horizontal_toward_origin(at);
    let vertical = vertical_toward_origin(at);
    if horizontal == Some(facing) || vertical == Some(facing) {
        return Some(facing);
    }
    match (horizontal, vertical) {
        (Some(h), Some(_)) if at.x.unsigned_abs() > at.y.unsigned_abs() => Some(h),
        (h, v) => v.or(h),
    }
}

/// Result of feeding one coordinate report to the navigator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavStep {
    /// Send this action and wait for the next report.
    Act(Action),
    /// The robot is at the origin.
    Arrived,
}

/// Per-connection navigation state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Navigator {
    facing: Option<Direction>,
    last_action: Option<Action>,
    previous: Option<Position>,
    current: Option<Position>,
    pending: VecDeque<Action>,
    detouring: bool,
    reached_origin: bool,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The MOVE issued together with the login `200 OK`.
    pub fn start(&mut self) -> Action {
        self.dispatch(Action::Move)
    }

    /// Consume a coordinate report and decide the next action.
    pub fn observe(&mut self, position: Position) -> NavStep {
        self.previous = self.current.replace(position);

        if position.is_origin() {
            self.reached_origin = true;
            self.pending.clear();
            self.detouring = false;
            return NavStep::Arrived;
        }

        if let (Some(Action::Move), Some(previous)) = (self.last_action, self.previous) {
            match Direction::from_delta(previous, position) {
                Some(direction) => self.moved(direction, position),
                None => self.blocked(position),
            }
        }

        if self.pending.is_empty() {
            self.replan(position);
        }
        // `replan` always queues at least one MOVE away from the origin.
        let action = self.pending.pop_front().unwrap_or(Action::Move);
        NavStep::Act(self.dispatch(action))
    }

    pub fn facing(&self) -> Option<Direction> {
        self.facing
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    pub fn position(&self) -> Option<Position> {
        self.current
    }

    pub fn previous_position(&self) -> Option<Position> {
        self.previous
    }

    pub fn pending(&self) -> impl Iterator<Item = Action> + '_ {
        self.pending.iter().copied()
    }

    pub fn is_detouring(&self) -> bool {
        self.detouring
    }

    pub fn reached_origin(&self) -> bool {
        self.reached_origin
    }

    fn moved(&mut self, direction: Direction, position: Position) {
        self.facing = Some(direction);
        if !self.detouring {
            return;
        }
        let on_axis = if direction.is_horizontal() {
            position.x == 0
        } else {
            position.y == 0
        };
        if on_axis {
            debug!(%position, "detour cut short on axis");
            self.pending.clear();
            self.detouring = false;
        }
    }

    fn blocked(&mut self, position: Position) {
        self.pending.clear();
        match self.facing {
            None => {
                debug!(%position, "blocked with unknown facing");
                self.pending.extend(DISAMBIGUATE);
                self.detouring = false;
            }
            Some(facing) => {
                let side = detour_side(facing, position);
                debug!(%position, %facing, ?side, "blocked, detouring");
                self.pending.extend(detour(side).iter().copied());
                self.detouring = true;
            }
        }
    }

    fn replan(&mut self, position: Position) {
        self.detouring = false;
        match self.facing {
            None => self.pending.push_back(Action::Move),
            Some(facing) => self.pending.extend(heading(facing, position)),
        }
    }

    fn dispatch(&mut self, action: Action) -> Action {
        self.last_action = Some(action);
        self.facing = self.facing.map(|facing| action.apply(facing));
        action
    }
}
