use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use crate::common::{Agent, MAX_TIMESTEP};

/// Number of rotation phases between the two axis-aligned headings.
/// A full turn costs `ROTATION_PHASES - 1` timesteps.
pub const ROTATION_PHASES: usize = 5;

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    passable: Vec<bool>,
    neighbors: Vec<Vec<usize>>,
    /// Backward-Dijkstra distance to each agent's goal, indexed
    /// [agent id][2-D location]. Unreachable cells hold MAX_TIMESTEP.
    pub heuristic: Vec<Vec<usize>>,
}

impl Map {
    pub fn from_file(path: &str, agents: &[Agent]) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), agents)
    }

    pub fn from_reader<R: BufRead>(reader: R, agents: &[Agent]) -> io::Result<Self> {
        let mut lines = reader.lines();

        let _type = lines.next().unwrap()?;
        let height = lines
            .next()
            .unwrap()?
            .split_whitespace()
            .last()
            .unwrap()
            .parse::<usize>()
            .unwrap();
        let width = lines
            .next()
            .unwrap()?
            .split_whitespace()
            .last()
            .unwrap()
            .parse::<usize>()
            .unwrap();
        let _map = lines.next().unwrap()?;

        let mut passable = Vec::with_capacity(height * width);
        for line in lines.take(height) {
            let row = line?;
            passable.extend(row.chars().take(width).map(|ch| ch == '.'));
        }

        let mut map = Map {
            height,
            width,
            passable,
            neighbors: Vec::new(),
            heuristic: Vec::new(),
        };
        map.initialize_neighbors();
        map.compute_heuristics(agents);

        Ok(map)
    }

    fn initialize_neighbors(&mut self) {
        self.neighbors = (0..self.base_size())
            .map(|loc| {
                if self.passable[loc] {
                    self.candidate_neighbors(loc)
                } else {
                    Vec::new()
                }
            })
            .collect();
    }

    fn candidate_neighbors(&self, loc: usize) -> Vec<usize> {
        let (row, col) = self.coordinate(loc);
        let mut neighbors = Vec::new();
        if row > 0 && self.passable[loc - self.width] {
            neighbors.push(loc - self.width);
        }
        if row + 1 < self.height && self.passable[loc + self.width] {
            neighbors.push(loc + self.width);
        }
        if col > 0 && self.passable[loc - 1] {
            neighbors.push(loc - 1);
        }
        if col + 1 < self.width && self.passable[loc + 1] {
            neighbors.push(loc + 1);
        }
        neighbors
    }

    /// Backward Dijkstra from each agent's goal over the 2-D grid.
    fn compute_heuristics(&mut self, agents: &[Agent]) {
        self.heuristic = agents
            .iter()
            .map(|agent| {
                let goal = self.locate(agent.goal.0, agent.goal.1);
                let mut distance = vec![MAX_TIMESTEP; self.base_size()];
                distance[goal] = 0;

                let mut heap = BinaryHeap::new();
                heap.push(Reverse((0, goal)));
                while let Some(Reverse((value, loc))) = heap.pop() {
                    if value > distance[loc] {
                        continue;
                    }
                    for &next in &self.neighbors[loc] {
                        if distance[next] > value + 1 {
                            distance[next] = value + 1;
                            heap.push(Reverse((value + 1, next)));
                        }
                    }
                }
                distance
            })
            .collect();
    }

    pub fn base_size(&self) -> usize {
        self.height * self.width
    }

    pub fn locate(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    pub fn coordinate(&self, loc: usize) -> (usize, usize) {
        (loc / self.width, loc % self.width)
    }

    pub fn is_passable(&self, row: usize, col: usize) -> bool {
        self.passable[self.locate(row, col)]
    }

    pub fn is_obstacle(&self, loc: usize) -> bool {
        !self.passable[loc]
    }

    /// Traversable 4-neighbors of a 2-D location, excluding the cell itself.
    pub fn neighbors_2d(&self, loc: usize) -> &[usize] {
        &self.neighbors[loc]
    }

    pub fn encode_3d(&self, row: usize, col: usize, phase: usize) -> usize {
        debug_assert!(phase < ROTATION_PHASES);
        phase * self.base_size() + self.locate(row, col)
    }

    /// Strips the rotation layer from a 3-D location.
    pub fn project(&self, loc3: usize) -> usize {
        loc3 % self.base_size()
    }

    pub fn decode_3d(&self, loc3: usize) -> (usize, usize, usize) {
        let phase = loc3 / self.base_size();
        let (row, col) = self.coordinate(self.project(loc3));
        (row, col, phase)
    }

    /// 3-D neighbors under the rotation rule: the phase moves one step at a
    /// time, vertical translation is only open at phase 0 and horizontal
    /// translation only at the last phase. Waiting is not included here.
    pub fn neighbors_3d(&self, loc3: usize) -> Vec<usize> {
        let base = self.base_size();
        let loc = self.project(loc3);
        let phase = loc3 / base;
        debug_assert!(!self.is_obstacle(loc));
        let (row, col) = self.coordinate(loc);

        let mut neighbors = Vec::with_capacity(4);
        if phase > 0 {
            neighbors.push(loc3 - base);
        }
        if phase + 1 < ROTATION_PHASES {
            neighbors.push(loc3 + base);
        }
        if phase == 0 {
            if row > 0 && self.passable[loc - self.width] {
                neighbors.push(loc3 - self.width);
            }
            if row + 1 < self.height && self.passable[loc + self.width] {
                neighbors.push(loc3 + self.width);
            }
        }
        if phase == ROTATION_PHASES - 1 {
            if col > 0 && self.passable[loc - 1] {
                neighbors.push(loc3 - 1);
            }
            if col + 1 < self.width && self.passable[loc + 1] {
                neighbors.push(loc3 + 1);
            }
        }
        neighbors
    }

    pub fn manhattan(&self, loc1: usize, loc2: usize) -> usize {
        let (row1, col1) = self.coordinate(loc1);
        let (row2, col2) = self.coordinate(loc2);
        row1.abs_diff(row2) + col1.abs_diff(col2)
    }

    pub fn degree(&self, loc: usize) -> usize {
        debug_assert!(!self.is_obstacle(loc));
        self.neighbors[loc].len()
    }
}
