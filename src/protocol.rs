use std::fmt;

use strum::{EnumIter, IntoStaticStr};

pub mod buffer;
pub mod codec;
pub mod legacy;
pub mod packet;
pub mod registry;
pub mod version;

pub use version::ProtocolVersion;

pub const STATUS_ID: i32 = 1;
pub const LOGIN_ID: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum Direction {
    Serverbound,
    Clientbound,
}

impl Direction {
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Serverbound => Direction::Clientbound,
            Direction::Clientbound => Direction::Serverbound,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum State {
    Handshake,
    Status,
    Login,
    Play,
}

impl State {
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into())
    }
}
