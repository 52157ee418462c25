//! Binary protocol message codec
//!
//! Every message kind declares its field layout once in a static catalog.
//! A single schema-driven codec validates, encodes and decodes all of them.
//!
//! # Architecture
//!
//! - [`schema`]: the closed field-type grammar
//! - [`catalog`]: enumerations, shared structs and the per-kind layouts
//! - [`codec`]: validation plus encode/decode over [`dbdump_core::ByteCursor`]
//! - [`message`]: validated messages and tag/length framing
//! - [`registry`]: per-direction tag lookup with ambiguity detection
//! - [`frame`]: whole-frame reads and writes over streams
//! - [`dump`]: typed views of the dump/restore subset

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod codec;
pub mod dump;
pub mod error;
pub mod frame;
pub mod message;
pub mod registry;
pub mod schema;
pub mod value;

pub use dump::{
    attr, find_attribute, Annotations, Attributes, CommandCompleteMessage, DumpBlockMessage,
    DumpHeaderMessage, DumpObjectDesc, DumpRequest, DumpTypeInfo, ErrorResponseMessage,
    ReadyForCommandMessage, RestoreBlockMessage, RestoreEofMessage, RestoreReadyMessage,
    RestoreRequest, TypedMessage,
};
pub use error::{WireError, WireResult};
pub use frame::{FrameReader, FrameWriter};
pub use message::{split_frame, Direction, Message, MessageBuilder, MessageKind};
pub use registry::MessageRegistry;
pub use schema::{EnumKind, EnumSpec, Field, FieldType, IntWidth, StructSchema};
pub use value::Value;
