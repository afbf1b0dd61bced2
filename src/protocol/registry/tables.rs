use crate::protocol::{packet::PacketKind::*, ProtocolVersion::*, State};

use super::{map, map_until, PacketEntry, StateTable};

macro_rules! entry {
    ($kind:ident: $($mapping:expr),+ $(,)?) => {
        PacketEntry { kind: $kind, mappings: &[$($mapping),+] }
    };
}

pub(super) fn table(state: State) -> &'static StateTable {
    match state {
        State::Handshake => &HANDSHAKE,
        State::Status => &STATUS,
        State::Login => &LOGIN,
        State::Play => &PLAY,
    }
}

static HANDSHAKE: StateTable = StateTable {
    fallback: true,
    serverbound: &[entry!(Handshake: map(0x00, V1_7_2, false))],
    clientbound: &[],
};

static STATUS: StateTable = StateTable {
    fallback: true,
    serverbound: &[
        entry!(StatusRequest: map(0x00, V1_7_2, false)),
        entry!(StatusPing: map(0x01, V1_7_2, false)),
    ],
    clientbound: &[
        entry!(StatusResponse: map(0x00, V1_7_2, false)),
        entry!(StatusPing: map(0x01, V1_7_2, false)),
    ],
};

static LOGIN: StateTable = StateTable {
    fallback: true,
    serverbound: &[
        entry!(ServerLogin: map(0x00, V1_7_2, false)),
        entry!(EncryptionResponse: map(0x01, V1_7_2, false)),
        entry!(LoginPluginResponse: map(0x02, V1_13, false)),
    ],
    clientbound: &[
        entry!(Disconnect: map(0x00, V1_7_2, false)),
        entry!(EncryptionRequest: map(0x01, V1_7_2, false)),
        entry!(ServerLoginSuccess: map(0x02, V1_7_2, false)),
        entry!(SetCompression: map(0x03, V1_8, false)),
        entry!(LoginPluginMessage: map(0x04, V1_13, false)),
    ],
};

static PLAY: StateTable = StateTable {
    fallback: false,
    serverbound: &[
        entry!(TabCompleteRequest:
            map(0x14, V1_7_2, false),
            map(0x01, V1_9, false),
            map(0x02, V1_12, false),
            map(0x01, V1_12_1, false),
            map(0x05, V1_13, false),
            map(0x06, V1_14, false),
        ),
        entry!(Chat:
            map(0x01, V1_7_2, false),
            map(0x02, V1_9, false),
            map(0x03, V1_12, false),
            map(0x02, V1_12_1, false),
            map(0x03, V1_14, false),
        ),
        entry!(ClientSettings:
            map(0x15, V1_7_2, false),
            map(0x04, V1_9, false),
            map(0x05, V1_12, false),
            map(0x04, V1_12_1, false),
            map(0x05, V1_14, false),
        ),
        entry!(PluginMessage:
            map(0x17, V1_7_2, false),
            map(0x09, V1_9, false),
            map(0x0A, V1_12, false),
            map(0x09, V1_12_1, false),
            map(0x0A, V1_13, false),
            map(0x0B, V1_14, false),
            map(0x0A, V1_17, false),
        ),
        entry!(KeepAlive:
            map(0x00, V1_7_2, false),
            map(0x0B, V1_9, false),
            map(0x0C, V1_12, false),
            map(0x0B, V1_12_1, false),
            map(0x0E, V1_13, false),
            map(0x0F, V1_14, false),
            map(0x10, V1_16, false),
            map(0x0F, V1_17, false),
        ),
        entry!(ResourcePackResponse:
            map(0x19, V1_8, false),
            map(0x16, V1_9, false),
            map(0x18, V1_12, false),
            map(0x1D, V1_13, false),
            map(0x1F, V1_14, false),
            map(0x20, V1_16, false),
            map(0x21, V1_16_2, false),
        ),
    ],
    clientbound: &[
        entry!(BossBar:
            map(0x0C, V1_9, false),
            map(0x0D, V1_15, false),
            map(0x0C, V1_16, false),
            map(0x0D, V1_17, false),
        ),
        entry!(Chat:
            map(0x02, V1_7_2, true),
            map(0x0F, V1_9, true),
            map(0x0E, V1_13, true),
            map(0x0F, V1_15, true),
            map(0x0E, V1_16, true),
            map(0x0F, V1_17, true),
        ),
        entry!(TabCompleteResponse:
            map(0x3A, V1_7_2, false),
            map(0x0E, V1_9, false),
            map(0x10, V1_13, false),
            map(0x11, V1_15, false),
            map(0x10, V1_16, false),
            map(0x0F, V1_16_2, false),
            map(0x11, V1_17, false),
        ),
        entry!(AvailableCommands:
            map(0x11, V1_13, false),
            map(0x12, V1_15, false),
            map(0x11, V1_16, false),
            map(0x10, V1_16_2, false),
            map(0x12, V1_17, false),
        ),
        entry!(PluginMessage:
            map(0x3F, V1_7_2, false),
            map(0x18, V1_9, false),
            map(0x19, V1_13, false),
            map(0x18, V1_14, false),
            map(0x19, V1_15, false),
            map(0x18, V1_16, false),
            map(0x17, V1_16_2, false),
            map(0x18, V1_17, false),
        ),
        entry!(Disconnect:
            map(0x40, V1_7_2, false),
            map(0x1A, V1_9, false),
            map(0x1B, V1_13, false),
            map(0x1A, V1_14, false),
            map(0x1B, V1_15, false),
            map(0x1A, V1_16, false),
            map(0x19, V1_16_2, false),
            map(0x1A, V1_17, false),
        ),
        entry!(KeepAlive:
            map(0x00, V1_7_2, false),
            map(0x1F, V1_9, false),
            map(0x21, V1_13, false),
            map(0x20, V1_14, false),
            map(0x21, V1_15, false),
            map(0x20, V1_16, false),
            map(0x1F, V1_16_2, false),
            map(0x21, V1_17, false),
        ),
        entry!(JoinGame:
            map(0x01, V1_7_2, false),
            map(0x23, V1_9, false),
            map(0x25, V1_13, false),
            map(0x25, V1_14, false),
            map(0x26, V1_15, false),
            map(0x25, V1_16, false),
            map(0x24, V1_16_2, false),
            map(0x26, V1_17, false),
        ),
        entry!(Respawn:
            map(0x07, V1_7_2, true),
            map(0x33, V1_9, true),
            map(0x34, V1_12, true),
            map(0x35, V1_12_1, true),
            map(0x38, V1_13, true),
            map(0x3A, V1_14, true),
            map(0x3B, V1_15, true),
            map(0x3A, V1_16, true),
            map(0x39, V1_16_2, true),
            map(0x3D, V1_17, true),
        ),
        entry!(ResourcePackRequest:
            map(0x48, V1_8, false),
            map(0x32, V1_9, false),
            map(0x33, V1_12, false),
            map(0x34, V1_12_1, false),
            map(0x37, V1_13, false),
            map(0x39, V1_14, false),
            map(0x3A, V1_15, false),
            map(0x39, V1_16, false),
            map(0x38, V1_16_2, false),
            map(0x3C, V1_17, false),
        ),
        entry!(HeaderAndFooter:
            map(0x47, V1_8, true),
            map(0x48, V1_9, true),
            map(0x47, V1_9_4, true),
            map(0x49, V1_12, true),
            map(0x4A, V1_12_1, true),
            map(0x4E, V1_13, true),
            map(0x53, V1_14, true),
            map(0x54, V1_15, true),
            map(0x53, V1_16, true),
            map(0x5E, V1_17, true),
        ),
        entry!(LegacyTitle:
            map(0x45, V1_8, true),
            map(0x45, V1_9, true),
            map(0x47, V1_12, true),
            map(0x48, V1_12_1, true),
            map(0x4B, V1_13, true),
            map(0x4F, V1_14, true),
            map(0x50, V1_15, true),
            map_until(0x4F, V1_16, V1_16_4, true),
        ),
        entry!(TitleSubtitle: map(0x57, V1_17, true)),
        entry!(TitleText: map(0x59, V1_17, true)),
        entry!(TitleActionbar: map(0x41, V1_17, true)),
        entry!(TitleTimes: map(0x5A, V1_17, true)),
        entry!(TitleClear: map(0x10, V1_17, true)),
        entry!(PlayerListItem:
            map(0x38, V1_7_2, false),
            map(0x2D, V1_9, false),
            map(0x2E, V1_12_1, false),
            map(0x30, V1_13, false),
            map(0x33, V1_14, false),
            map(0x34, V1_15, false),
            map(0x33, V1_16, false),
            map(0x32, V1_16_2, false),
            map(0x36, V1_17, false),
        ),
    ],
};
