use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use bytes::Bytes;
use log::debug;

use crate::error::{ProtocolError, RegistryError};

use super::{
    packet::{PacketKind, PacketType},
    Direction, ProtocolVersion, State,
};

mod tables;

pub const MAX_PACKET_ID: usize = 128;

/// Packet id valid from `from` until the next mapping's `from`, or through
/// `last_valid` (the newest version when absent) for the final mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketMapping {
    pub id: u8,
    pub from: ProtocolVersion,
    pub last_valid: Option<ProtocolVersion>,
    pub encode_only: bool,
}

pub const fn map(id: u8, from: ProtocolVersion, encode_only: bool) -> PacketMapping {
    PacketMapping { id, from, last_valid: None, encode_only }
}

pub const fn map_until(id: u8, from: ProtocolVersion, last_valid: ProtocolVersion, encode_only: bool) -> PacketMapping {
    PacketMapping { id, from, last_valid: Some(last_valid), encode_only }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    kind: PacketKind,
    decodable: bool,
}

/// Id table of one direction of one phase at one protocol version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolRegistry {
    direction: Direction,
    ids: [Option<Entry>; MAX_PACKET_ID],
    kind_to_id: HashMap<PacketKind, u8>,
}

impl ProtocolRegistry {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            ids: [None; MAX_PACKET_ID],
            kind_to_id: HashMap::new(),
        }
    }

    fn register(&mut self, kind: PacketKind, id: u8, decodable: bool, version: ProtocolVersion) -> Result<(), RegistryError> {
        let slot = self.ids.get_mut(id as usize).ok_or(RegistryError::IdOutOfRange { kind, id })?;

        if let Some(existing) = slot {
            return Err(RegistryError::IdConflict { kind, existing: existing.kind, id, version });
        }
        if self.kind_to_id.contains_key(&kind) {
            return Err(RegistryError::DuplicateType { kind, version });
        }

        *slot = Some(Entry { kind, decodable });
        self.kind_to_id.insert(kind, id);
        Ok(())
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Kind decoded for `id`, `None` for unknown and encode-only ids.
    pub fn kind_of(&self, id: i32) -> Option<PacketKind> {
        usize::try_from(id)
            .ok()
            .and_then(|id| self.ids.get(id).copied().flatten())
            .filter(|entry| entry.decodable)
            .map(|entry| entry.kind)
    }

    /// Decodes a frame body. `Ok(None)` means the id has no decoder and the
    /// frame should be passed on as a raw packet.
    pub fn decode(&self, id: i32, buf: &mut Bytes, version: ProtocolVersion) -> Result<Option<PacketType>, ProtocolError> {
        match self.kind_of(id) {
            Some(kind) => kind.decode(buf, self.direction, version).map(Some),
            None => Ok(None),
        }
    }

    pub fn id_of(&self, kind: PacketKind) -> Result<u8, RegistryError> {
        self.kind_to_id
            .get(&kind)
            .copied()
            .ok_or(RegistryError::UnknownPacketType { kind, direction: self.direction })
    }

    pub fn packet_id(&self, packet: &PacketType) -> Result<u8, RegistryError> {
        self.id_of(packet.kind())
    }

    pub fn len(&self) -> usize {
        self.kind_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kind_to_id.is_empty()
    }
}

/// One direction of one phase across every supported version.
#[derive(Debug, Clone)]
pub struct PacketRegistry {
    direction: Direction,
    fallback: bool,
    versions: Vec<Arc<ProtocolRegistry>>,
}

impl PacketRegistry {
    pub fn new(direction: Direction) -> Self {
        Self::with_fallback(direction, true)
    }

    pub fn without_fallback(direction: Direction) -> Self {
        Self::with_fallback(direction, false)
    }

    fn with_fallback(direction: Direction, fallback: bool) -> Self {
        Self {
            direction,
            fallback,
            versions: ProtocolVersion::supported()
                .map(|_| Arc::new(ProtocolRegistry::new(direction)))
                .collect(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn register(&mut self, kind: PacketKind, mappings: &[PacketMapping]) -> Result<(), RegistryError> {
        if mappings.is_empty() {
            return Err(RegistryError::NoMappings(kind));
        }

        for (i, current) in mappings.iter().enumerate() {
            if !current.from.is_valid() {
                return Err(RegistryError::UnregisteredVersion { kind, version: current.from });
            }
            if current.id as usize >= MAX_PACKET_ID {
                return Err(RegistryError::IdOutOfRange { kind, id: current.id });
            }

            let next = mappings.get(i + 1);
            let to = match (next, current.last_valid) {
                (Some(_), Some(_)) => return Err(RegistryError::MappingAfterLastValid(kind)),
                (Some(next), None) => next.from,
                (None, Some(last)) if last < current.from => {
                    return Err(RegistryError::LastValidBeforeFrom { kind, from: current.from, last })
                }
                (None, Some(last)) => last,
                (None, None) => ProtocolVersion::MAXIMUM,
            };

            if next.is_some() && current.from >= to {
                return Err(RegistryError::OutOfOrder { kind, from: current.from, to });
            }

            let in_range = |version: ProtocolVersion| match next {
                Some(_) => version >= current.from && version < to,
                None => version >= current.from && version <= to,
            };

            for (index, version) in ProtocolVersion::supported().enumerate().filter(|(_, v)| in_range(*v)) {
                Arc::make_mut(&mut self.versions[index]).register(kind, current.id, !current.encode_only, version)?;
            }
        }

        Ok(())
    }

    /// Snapshot for `version`. Sentinel versions resolve to the minimum
    /// version when fallback is enabled.
    pub fn get(&self, version: ProtocolVersion) -> Result<&Arc<ProtocolRegistry>, RegistryError> {
        let index = match version.index() {
            Some(index) => index,
            None if self.fallback => 0,
            None => return Err(RegistryError::UnsupportedVersion(version)),
        };
        self.versions.get(index).ok_or(RegistryError::UnsupportedVersion(version))
    }

    /// Shares one snapshot between adjacent versions with identical tables.
    pub fn compact(&mut self) {
        for i in 1..self.versions.len() {
            if self.versions[i] == self.versions[i - 1] {
                self.versions[i] = Arc::clone(&self.versions[i - 1]);
            }
        }
    }

    /// Snapshot of the oldest supported version.
    pub fn first(&self) -> &ProtocolRegistry {
        &self.versions[0]
    }

    pub fn distinct_snapshots(&self) -> usize {
        self.versions.windows(2).filter(|pair| !Arc::ptr_eq(&pair[0], &pair[1])).count() + 1
    }
}

pub struct PacketEntry {
    pub kind: PacketKind,
    pub mappings: &'static [PacketMapping],
}

pub struct StateTable {
    pub fallback: bool,
    pub serverbound: &'static [PacketEntry],
    pub clientbound: &'static [PacketEntry],
}

#[derive(Debug)]
pub struct StateRegistry {
    pub state: State,
    pub serverbound: PacketRegistry,
    pub clientbound: PacketRegistry,
}

impl StateRegistry {
    pub fn build(state: State, table: &StateTable) -> Result<Self, RegistryError> {
        let build = |direction, entries: &[PacketEntry]| {
            let mut registry = match table.fallback {
                true => PacketRegistry::new(direction),
                false => PacketRegistry::without_fallback(direction),
            };
            for entry in entries {
                registry.register(entry.kind, entry.mappings)?;
            }
            registry.compact();
            Ok::<_, RegistryError>(registry)
        };

        let registry = Self {
            state,
            serverbound: build(Direction::Serverbound, table.serverbound)?,
            clientbound: build(Direction::Clientbound, table.clientbound)?,
        };
        debug!(
            "Built {} registry with {}/{} distinct snapshots",
            state,
            registry.serverbound.distinct_snapshots(),
            registry.clientbound.distinct_snapshots()
        );
        Ok(registry)
    }

    pub fn directional(&self, direction: Direction) -> &PacketRegistry {
        match direction {
            Direction::Serverbound => &self.serverbound,
            Direction::Clientbound => &self.clientbound,
        }
    }
}

fn build(state: State) -> StateRegistry {
    StateRegistry::build(state, tables::table(state)).unwrap_or_else(|err| panic!("invalid {state} packet table: {err}"))
}

static REGISTRIES: LazyLock<[StateRegistry; 4]> = LazyLock::new(|| {
    [
        build(State::Handshake),
        build(State::Status),
        build(State::Login),
        build(State::Play),
    ]
});

pub fn registry(state: State) -> &'static StateRegistry {
    &REGISTRIES[state.index()]
}

/// Forces table construction so a broken table aborts startup.
pub fn init() {
    LazyLock::force(&REGISTRIES);
}
