//! Process teams and 2D process grids.
//!
//! A [`Team`] is an ordered list of world ranks that share a front. A [`Grid`]
//! arranges a team column-major into `height × width` processes: team rank `r`
//! sits at grid row `r % height`, grid column `r / height`.

use crate::front_error::FrontError;
use serde::{Deserialize, Serialize};

/// Ordered subset of world ranks together with this process' position in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    members: Vec<usize>,
    rank: usize,
}

impl Team {
    /// Build a team from world ranks; `me` must be a member.
    pub fn new(members: Vec<usize>, me: usize) -> Result<Self, FrontError> {
        let rank = members
            .iter()
            .position(|&m| m == me)
            .ok_or(FrontError::NotInTeam { rank: me })?;
        Ok(Self { members, rank })
    }

    /// All `size` ranks of the world, seen from `me`.
    pub fn world(size: usize, me: usize) -> Self {
        Self {
            members: (0..size).collect(),
            rank: me,
        }
    }

    /// The single-process team `{me}`.
    pub fn solo(me: usize) -> Self {
        Self {
            members: vec![me],
            rank: 0,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Position of this process in the team.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// World rank of team member `q`.
    #[inline]
    pub fn world_rank(&self, q: usize) -> usize {
        self.members[q]
    }

    /// Split into `(left, right)` halves of sizes `left_size` and `size - left_size`,
    /// returning the half this process belongs to and whether it is the left one.
    pub fn split(&self, left_size: usize) -> (Team, bool) {
        let on_left = self.rank < left_size;
        let (lo, hi) = if on_left {
            (0, left_size)
        } else {
            (left_size, self.size())
        };
        let team = Team {
            members: self.members[lo..hi].to_vec(),
            rank: self.rank - lo,
        };
        (team, on_left)
    }
}

/// A team arranged as a column-major `height × width` process grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    team: Team,
    height: usize,
    width: usize,
}

impl Grid {
    /// Arrange `team` with the default, as-square-as-possible shape.
    pub fn new(team: Team) -> Self {
        let (height, width) = Self::default_shape(team.size());
        Self {
            team,
            height,
            width,
        }
    }

    /// Arrange `team` as `height × width`; the product must match the team size.
    pub fn with_shape(team: Team, height: usize, width: usize) -> Result<Self, FrontError> {
        if height * width != team.size() {
            return Err(FrontError::GridMismatch {
                side: "requested",
                expected: team.size(),
                got: height * width,
            });
        }
        Ok(Self {
            team,
            height,
            width,
        })
    }

    /// The 1×1 grid of a single process.
    pub fn solo(me: usize) -> Self {
        Self::new(Team::solo(me))
    }

    /// Largest divisor of `p` not exceeding `sqrt(p)` as the height, the
    /// cofactor as the width.
    pub fn default_shape(p: usize) -> (usize, usize) {
        if p == 0 {
            return (1, 0);
        }
        let mut height = (p as f64).sqrt() as usize;
        while height > 1 && p % height != 0 {
            height -= 1;
        }
        let height = height.max(1);
        (height, p / height)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
    #[inline]
    pub fn size(&self) -> usize {
        self.team.size()
    }
    #[inline]
    pub fn team(&self) -> &Team {
        &self.team
    }
    /// Grid row of this process.
    #[inline]
    pub fn row(&self) -> usize {
        self.team.rank() % self.height
    }
    /// Grid column of this process.
    #[inline]
    pub fn col(&self) -> usize {
        self.team.rank() / self.height
    }
    /// Team rank of the process at `(row, col)`.
    #[inline]
    pub fn rank_of(&self, row: usize, col: usize) -> usize {
        row + col * self.height
    }
}
