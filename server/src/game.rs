//! Pong field simulation: paddle movement, ball motion, bounces and scoring.
//!
//! This module holds no connection state. [`Field::step`] advances one tick given
//! the pending directions of both paddles and reports which side scored, if any.

use shared::{
    BallView, Direction, PaddleView, GOAL_X, MAX_PADDLE_Y, PADDLE_REACH, PADDLE_STEP, PADDLE_X,
    SERVE_SPEED_X, SERVE_SPEED_Y, WALL_Y,
};

/// One of the two seats in a session. Seat one defends `x = -GOAL_X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeatIndex {
    One,
    Two,
}

impl SeatIndex {
    pub const ALL: [SeatIndex; 2] = [SeatIndex::One, SeatIndex::Two];

    /// Player number as it appears on the wire.
    pub fn number(self) -> u8 {
        match self {
            SeatIndex::One => 1,
            SeatIndex::Two => 2,
        }
    }

    pub fn opponent(self) -> SeatIndex {
        match self {
            SeatIndex::One => SeatIndex::Two,
            SeatIndex::Two => SeatIndex::One,
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            SeatIndex::One => 0,
            SeatIndex::Two => 1,
        }
    }
}

/// Tunable field geometry and speeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub paddle_step: f32,
    pub max_paddle_y: f32,
    pub paddle_x: f32,
    pub paddle_reach: f32,
    pub wall_y: f32,
    pub goal_x: f32,
    pub serve_vx: f32,
    pub serve_vy: f32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            paddle_step: PADDLE_STEP,
            max_paddle_y: MAX_PADDLE_Y,
            paddle_x: PADDLE_X,
            paddle_reach: PADDLE_REACH,
            wall_y: WALL_Y,
            goal_x: GOAL_X,
            serve_vx: SERVE_SPEED_X,
            serve_vy: SERVE_SPEED_Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Ball {
    /// Ball at the centre, heading towards `towards`.
    pub fn serve(rules: &Rules, towards: SeatIndex) -> Self {
        let vx = match towards {
            SeatIndex::One => -rules.serve_vx,
            SeatIndex::Two => rules.serve_vx,
        };
        Self {
            x: 0.0,
            y: 0.0,
            vx,
            vy: rules.serve_vy,
        }
    }

    pub fn view(&self) -> BallView {
        BallView {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Paddle {
    pub y: f32,
    pub score: u32,
}

impl Paddle {
    /// Moves one step in `direction`, clamped to `[-max_paddle_y, max_paddle_y]`.
    ///
    /// A negative bound counts as its magnitude and a NaN bound leaves the
    /// paddle unclamped, so odd rules never panic the session task.
    pub fn nudge(&mut self, direction: Direction, rules: &Rules) {
        let bound = rules.max_paddle_y.abs();
        self.y = (self.y + direction.sign() * rules.paddle_step)
            .max(-bound)
            .min(bound);
    }

    pub fn view(&self) -> PaddleView {
        PaddleView {
            y: self.y,
            score: self.score,
        }
    }
}

/// Ball and both paddles of one match.
#[derive(Debug, Clone)]
pub struct Field {
    pub ball: Ball,
    pub paddles: [Paddle; 2],
    pub rules: Rules,
}

impl Field {
    pub fn new(rules: Rules) -> Self {
        Self {
            // The first serve heads towards seat two, like every serve after seat two scores.
            ball: Ball::serve(&rules, SeatIndex::Two),
            paddles: [Paddle::default(); 2],
            rules,
        }
    }

    /// Puts paddles, scores and ball back to the start of a match.
    pub fn reset(&mut self) {
        *self = Field::new(self.rules.clone());
    }

    pub fn paddle(&self, seat: SeatIndex) -> &Paddle {
        &self.paddles[seat.slot()]
    }

    pub fn paddle_mut(&mut self, seat: SeatIndex) -> &mut Paddle {
        &mut self.paddles[seat.slot()]
    }

    /// Advances the field by one tick and returns the seat that scored, if any.
    pub fn step(&mut self, directions: [Option<Direction>; 2]) -> Option<SeatIndex> {
        for seat in SeatIndex::ALL {
            if let Some(direction) = directions[seat.slot()] {
                self.paddles[seat.slot()].nudge(direction, &self.rules);
            }
        }

        let rules = &self.rules;
        let ball = &mut self.ball;
        ball.x += ball.vx;
        ball.y += ball.vy;

        // Only reflect while heading into the wall, otherwise a ball that overshoots
        // the wall line would flip back and forth on consecutive ticks.
        if (ball.y > rules.wall_y && ball.vy > 0.0) || (ball.y < -rules.wall_y && ball.vy < 0.0) {
            ball.vy = -ball.vy;
        }

        let [left, right] = self.paddles;
        let hits_left =
            ball.x < -rules.paddle_x && ball.vx < 0.0 && (ball.y - left.y).abs() < rules.paddle_reach;
        let hits_right =
            ball.x > rules.paddle_x && ball.vx > 0.0 && (ball.y - right.y).abs() < rules.paddle_reach;
        if hits_left || hits_right {
            ball.vx = -ball.vx;
        }

        let conceded = if ball.x < -rules.goal_x {
            Some(SeatIndex::One)
        } else if ball.x > rules.goal_x {
            Some(SeatIndex::Two)
        } else {
            None
        };
        let scorer = conceded.map(SeatIndex::opponent);

        // The serve heads towards the seat that just scored.
        if let Some(seat) = scorer {
            self.paddle_mut(seat).score += 1;
            self.ball = Ball::serve(&self.rules, seat);
        }

        scorer
    }
}
