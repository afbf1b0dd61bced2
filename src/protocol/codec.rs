pub mod cipher;
pub mod compression;
pub mod haproxy;
pub mod minecraft_codec;
pub mod pipeline;
pub mod varint;
